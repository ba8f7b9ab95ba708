use clap::{ArgAction, Parser, ValueEnum};

/// What to do with the rest of a job list when one pipeline fails to launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LaunchFailure {
	/// Report the failure and run the next pipeline.
	Continue,
	/// Report the failure and stop the interpreter.
	Abort,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "jobsh", version, about = "A small interactive shell with job control")]
pub struct Config {
	/// Run one command line and exit with its status
	#[arg(short = 'c', long = "command", value_name = "LINE")]
	pub command: Option<String>,

	/// Policy when a pipeline cannot be launched
	#[arg(long, value_enum, default_value_t = LaunchFailure::Continue)]
	pub on_launch_failure: LaunchFailure,

	/// Never take or hand over the controlling terminal
	#[arg(long = "no-job-control", action = ArgAction::SetFalse)]
	pub job_control: bool,

	/// Print every parsed job list before running it
	#[arg(long)]
	pub print_jobs: bool,

	/// Prompt shown when reading from a terminal
	#[arg(long, default_value = "jobsh> ")]
	pub prompt: String,

	/// Increase log verbosity (-v info, -vv debug, -vvv trace)
	#[arg(short, long, action = ArgAction::Count)]
	pub verbose: u8,
}

impl Default for Config {
	fn default() -> Config {
		Config {
			command: None,
			on_launch_failure: LaunchFailure::Continue,
			job_control: true,
			print_jobs: false,
			prompt: "jobsh> ".to_string(),
			verbose: 0,
		}
	}
}
