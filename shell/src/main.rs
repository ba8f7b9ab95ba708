use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::Level;

use jobsh::{parser, Config, Shell, ShellError};

const SYNTAX_ERROR: i32 = 2;

fn init_tracing(verbose: u8) {
	let level = match verbose {
		0 => Level::WARN,
		1 => Level::INFO,
		2 => Level::DEBUG,
		_ => Level::TRACE,
	};
	tracing_subscriber::fmt()
		.with_writer(io::stderr)
		.with_max_level(level)
		.with_target(false)
		.init();
}

fn run_line(shell: &mut Shell, line: &[u8]) -> Result<(), ShellError> {
	let job_list = match parser::parse(line) {
		Ok(job_list) => job_list,
		Err(e) => {
			eprintln!("jobsh: syntax error: {}", e);
			shell.set_status(SYNTAX_ERROR);
			return Ok(());
		},
	};
	if shell.config().print_jobs {
		print!("{}", job_list);
		let _ = io::stdout().flush();
	}
	shell.run_pipelines(&job_list).map(|_| ())
}

/// Forgets finished jobs, announcing them only when `announce` is set.
fn report_finished(shell: &mut Shell, announce: bool) {
	match shell.finished_jobs() {
		Ok(jobs) => if announce {
			for job in jobs {
				eprintln!("[{}] Done  {}", job.pgid, job.text);
			}
		},
		Err(e) => tracing::warn!("cannot sweep the job table: {}", e),
	}
}

fn interact(shell: &mut Shell) -> Result<(), ShellError> {
	let stdin = io::stdin();
	let prompting = stdin.is_terminal();
	let mut stdin_locked = stdin.lock();
	let mut stdout = io::stdout();
	loop {
		let announce = shell.is_interactive();
		report_finished(shell, announce);
		if prompting {
			let _ = stdout.write_all(shell.config().prompt.as_bytes());
			let _ = stdout.flush();
		}
		let mut line: Vec<u8> = vec![];
		match stdin_locked.read_until(b'\n', &mut line) {
			Ok(0) => {
				if prompting {
					let _ = stdout.write_all(b"\n");
				}
				break;
			},
			Ok(_) => {},
			Err(e) => {
				eprintln!("jobsh: cannot read input: {}", e);
				break;
			},
		}
		run_line(shell, &line)?;
		if shell.exit_requested().is_some() {
			break;
		}
	}
	Ok(())
}

fn main() -> Result<()> {
	let config = Config::parse();
	init_tracing(config.verbose);

	let mut shell = Shell::init(config.clone()).context("failed to set up job control")?;
	let result = match config.command {
		Some(ref line) => run_line(&mut shell, line.as_bytes()),
		None => interact(&mut shell),
	};
	let status = shell.exit_requested().unwrap_or(shell.status());
	shell.shutdown();
	result?;
	std::process::exit(status)
}
