use std::{ffi, io};

use nix::unistd::Pid;
use thiserror::Error;

/// Failures while launching or waiting for a pipeline.
#[derive(Debug, Error)]
pub enum ExecError {
	#[error("{0}")]
	Nix(#[from] nix::Error),
	#[error("{path}: {source}")]
	Redirect {
		path: String,
		#[source]
		source: io::Error,
	},
	#[error("nul byte in argument: {0}")]
	Nul(#[from] ffi::NulError),
	#[error("cannot give the terminal to process group {pgid}: {source}")]
	Terminal {
		pgid: Pid,
		#[source]
		source: nix::Error,
	},
	#[error("empty pipeline")]
	EmptyPipeline,
	#[error(transparent)]
	Job(#[from] JobError),
}

/// Failures of the job table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
	#[error("no suspended process")]
	NothingToResume,
	#[error("job table is full")]
	TableFull,
	#[error("cannot mask SIGCHLD: {0}")]
	Mask(nix::Error),
	#[error("cannot signal process group {pgid}: {source}")]
	Signal {
		pgid: Pid,
		#[source]
		source: nix::Error,
	},
}

/// Failures of the interpreter lifecycle.
#[derive(Debug, Error)]
pub enum ShellError {
	#[error("job control is already initialized")]
	AlreadyInitialized,
	#[error("cannot install signal dispositions: {0}")]
	Signal(#[source] nix::Error),
	#[error("cannot take control of the terminal: {0}")]
	Terminal(#[source] nix::Error),
	#[error("cannot duplicate the terminal descriptor: {0}")]
	TerminalFd(#[source] io::Error),
	#[error("aborting after launch failure: {0}")]
	Aborted(#[source] ExecError),
}
