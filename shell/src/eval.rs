use nix::unistd::Pid;
use tracing::{debug, error, warn};

use crate::builtin;
use crate::config::LaunchFailure;
use crate::error::{ExecError, JobError, ShellError};
use crate::foreground::{self, Outcome, Terminal};
use crate::launch;
use crate::shell::Shell;
use crate::signal::ChildSignalMask;
use crate::types::{JobList, Pipeline};

/// `$?` after a pipeline that could not be launched.
pub const LAUNCH_FAILED: i32 = 1;

impl Shell {
	/// Runs every pipeline of `job_list` in order and returns the last status.
	///
	/// A pipeline that fails to launch is reported; what happens next depends
	/// on the configured [`LaunchFailure`] policy.
	pub fn run_pipelines(&mut self, job_list: &JobList) -> Result<i32, ShellError> {
		for pipeline in &job_list.pipelines {
			match self.run_pipeline(pipeline) {
				Ok(outcome) => self.status = outcome.status(),
				Err(e) => {
					error!("launching `{}` failed: {}", pipeline, e);
					eprintln!("jobsh: {}", e);
					self.status = LAUNCH_FAILED;
					if self.config.on_launch_failure == LaunchFailure::Abort {
						return Err(ShellError::Aborted(e));
					}
				},
			}
			if self.exit.is_some() {
				break;
			}
		}
		Ok(self.status)
	}

	/// Runs one pipeline: a builtin in-process, otherwise a new process group
	/// that is either tracked as a background job or waited for in the
	/// foreground.
	pub fn run_pipeline(&mut self, pipeline: &Pipeline) -> Result<Outcome, ExecError> {
		let commands = &pipeline.commands;
		if commands.is_empty() {
			return Err(ExecError::EmptyPipeline);
		}
		if commands.len() == 1 && !commands[0].has_redirects() && !pipeline.is_background() {
			if let Some(func) = builtin::match_builtin(commands[0].name) {
				return Ok(Outcome::Exited(func(self, &commands[0].arguments)));
			}
		}

		// Until the group is recorded or waited for, the handler must not see it.
		let _mask = ChildSignalMask::block()?;
		let mut processes = Vec::with_capacity(commands.len());
		let launched = launch::launch(pipeline, self.terminal.as_ref().map(Terminal::fd), &mut processes);
		let pgid = match launched {
			Ok(pgid) => pgid,
			Err(e) => {
				if let Some(first) = processes.first() {
					let pgid = first.pid;
					warn!("leaving {} process(es) of partial group {} to the job table", processes.len(), pgid);
					self.jobs.record_background(pgid)?;
					self.track(pgid, pipeline.to_string(), processes);
				}
				return Err(e);
			},
		};
		let last = processes.last().map(|p| p.pid);

		if pipeline.is_background() {
			self.jobs.record_background(pgid)?;
			if self.is_interactive() {
				eprintln!("[{}] {}", pgid, pipeline);
			}
			self.track(pgid, pipeline.to_string(), processes);
			return Ok(Outcome::Background(pgid));
		}

		let outcome = foreground::run(self.terminal.as_ref(), &self.jobs, pgid, last, false)?;
		if let Outcome::Stopped(pgid, _) = outcome {
			eprintln!("\n[{}] Stopped  {}", pgid, pipeline);
			self.track(pgid, pipeline.to_string(), processes);
		}
		Ok(outcome)
	}

	/// Continues the most recently stopped job in the background.
	pub fn resume_background(&mut self) -> Result<Pid, JobError> {
		let pgid = self.jobs.resume_most_recent()?;
		debug!("resumed group {} in the background", pgid);
		Ok(pgid)
	}

	/// Brings the most recently stopped job (else the newest background job)
	/// back to the foreground and waits for it.
	pub fn resume_foreground(&mut self) -> Result<Outcome, ExecError> {
		let _mask = ChildSignalMask::block()?;
		let record = self.jobs.take_for_foreground()?;
		let pgid = record.pgid;
		let last = self.tracked.get(&pgid.as_raw()).and_then(|t| t.processes.last()).map(|p| p.pid);
		if let Some(tracked) = self.tracked.get(&pgid.as_raw()) {
			eprintln!("{}", tracked.text);
		}
		let outcome = foreground::run(self.terminal.as_ref(), &self.jobs, pgid, last, true);
		match outcome {
			Ok(Outcome::Stopped(..)) => {
				let text = self.tracked.get(&pgid.as_raw()).map(|t| t.text.as_str()).unwrap_or("");
				eprintln!("\n[{}] Stopped  {}", pgid, text);
			},
			_ => {
				self.tracked.remove(&pgid.as_raw());
			},
		}
		outcome
	}
}
