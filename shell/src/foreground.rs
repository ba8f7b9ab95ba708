use std::os::fd::{AsFd, BorrowedFd, OwnedFd};

use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{self, Pid};
use tracing::{debug, warn};

use crate::error::{ExecError, ShellError};
use crate::job::{JobTable, WaitStatusExt};

/// The controlling terminal, held while the interpreter does job control.
#[derive(Debug)]
pub struct Terminal {
	tty: OwnedFd,
	shell_pgid: Pid,
}

impl Terminal {
	/// Waits until the interpreter runs in the foreground, then puts it in
	/// its own process group and takes the terminal for that group.
	///
	/// SIGTTOU must already be ignored.
	pub fn claim(stdin: BorrowedFd) -> Result<Terminal, ShellError> {
		let tty = stdin.try_clone_to_owned().map_err(ShellError::TerminalFd)?;
		loop {
			let own = unistd::getpgrp();
			if unistd::tcgetpgrp(tty.as_fd()).map_err(ShellError::Terminal)? == own {
				break;
			}
			killpg(own, Signal::SIGTTIN).map_err(ShellError::Terminal)?;
		}
		let pid = unistd::getpid();
		if unistd::getpgrp() != pid {
			unistd::setpgid(pid, pid).map_err(ShellError::Terminal)?;
		}
		unistd::tcsetpgrp(tty.as_fd(), pid).map_err(ShellError::Terminal)?;
		debug!("took the terminal for process group {}", pid);
		Ok(Terminal { tty: tty, shell_pgid: pid })
	}

	pub fn fd(&self) -> BorrowedFd<'_> {
		self.tty.as_fd()
	}

	pub fn hand_to(&self, pgid: Pid) -> Result<(), ExecError> {
		unistd::tcsetpgrp(self.tty.as_fd(), pgid).map_err(|e| ExecError::Terminal { pgid: pgid, source: e })
	}

	pub fn reclaim(&self) -> nix::Result<()> {
		unistd::tcsetpgrp(self.tty.as_fd(), self.shell_pgid)
	}
}

/// How a foreground pipeline ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
	/// Every process exited; the status of the last command.
	Exited(i32),
	/// The group stopped on the given signal and is now a resumable job.
	Stopped(Pid, Signal),
	/// The pipeline was started in the background.
	Background(Pid),
}

impl Outcome {
	/// Shell-style `$?` for this outcome.
	pub fn status(self) -> i32 {
		match self {
			Outcome::Exited(code) => code,
			Outcome::Stopped(_, sig) => 128 + sig as i32,
			Outcome::Background(_) => 0,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
	Finished(i32),
	Stopped(Signal),
}

/// Blocks until every process of `pgid` is gone or one of them stops.
///
/// The status reported is that of `last` when given, else of whichever
/// process was reaped last. ECHILD means nothing is left to wait for.
pub fn wait_group(pgid: Pid, last: Option<Pid>) -> Wait {
	let group = Pid::from_raw(-pgid.as_raw());
	let mut status = 0;
	loop {
		match waitpid(group, Some(WaitPidFlag::WUNTRACED)) {
			Ok(WaitStatus::Stopped(pid, sig)) => {
				debug!("pid {} of group {} stopped by {}", pid, pgid, sig);
				return Wait::Stopped(sig);
			},
			Ok(ws) => {
				if let Some(code) = ws.code() {
					if last.map_or(true, |l| ws.pid() == Some(l)) {
						status = code;
					}
				}
			},
			Err(Errno::EINTR) => {},
			Err(Errno::ECHILD) => return Wait::Finished(status),
			Err(e) => {
				warn!("waiting for group {} failed: {}", pgid, e);
				return Wait::Finished(status);
			},
		}
	}
}

/// Runs `pgid` in the foreground: hands it the terminal, optionally
/// continues it, waits, and takes the terminal back.
///
/// A group that stops is recorded in `jobs`. If the terminal cannot be
/// handed over the group is killed, since it could never be waited for
/// and resumed consistently.
pub fn run(terminal: Option<&Terminal>, jobs: &JobTable, pgid: Pid, last: Option<Pid>, resume: bool) -> Result<Outcome, ExecError> {
	if let Some(terminal) = terminal {
		if let Err(e) = terminal.hand_to(pgid) {
			let _ = killpg(pgid, Signal::SIGKILL);
			wait_group(pgid, None);
			return Err(e);
		}
	}
	if resume {
		if let Err(e) = killpg(pgid, Signal::SIGCONT) {
			warn!("cannot continue group {}: {}", pgid, e);
		}
	}

	let wait = wait_group(pgid, last);

	if let Some(terminal) = terminal {
		if let Err(e) = terminal.reclaim() {
			warn!("cannot take the terminal back from group {}: {}", pgid, e);
			eprintln!("jobsh: cannot take the terminal back: {}", e);
		}
	}

	match wait {
		Wait::Finished(code) => {
			debug!("group {} finished with status {}", pgid, code);
			Ok(Outcome::Exited(code))
		},
		Wait::Stopped(sig) => {
			jobs.record_stopped(pgid)?;
			Ok(Outcome::Stopped(pgid, sig))
		},
	}
}
