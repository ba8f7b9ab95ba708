use std::ffi::OsStr;
use std::fs::OpenOptions;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;

use libc::{STDIN_FILENO, STDOUT_FILENO};
use nix::fcntl::OFlag;
use nix::unistd;

use crate::error::ExecError;
use crate::types::{Pipeline, WriteMode};

/// Mode for files created by output redirection, before the umask.
const CREATE_MODE: u32 = 0o666;

/// Descriptors one pipeline stage reads from and writes to. `None` means the
/// stage inherits the interpreter's own stdin or stdout.
#[derive(Debug, Default)]
pub struct Stage {
	pub input: Option<OwnedFd>,
	pub output: Option<OwnedFd>,
}

impl Stage {
	pub fn input_fd(&self) -> RawFd {
		self.input.as_ref().map_or(STDIN_FILENO, |fd| fd.as_raw_fd())
	}

	pub fn output_fd(&self) -> RawFd {
		self.output.as_ref().map_or(STDOUT_FILENO, |fd| fd.as_raw_fd())
	}
}

fn open_redirect(path: &[u8], options: &OpenOptions) -> Result<OwnedFd, ExecError> {
	options.open(OsStr::from_bytes(path))
		.map(OwnedFd::from)
		.map_err(|e| ExecError::Redirect { path: String::from_utf8_lossy(path).into_owned(), source: e })
}

/// Wires up a pipeline: one pipe per adjacent pair of commands, with explicit
/// redirections taking precedence over the pipe ends they replace.
///
/// All descriptors are close-on-exec; a stage's own ends survive exec only
/// because the child dup2s them onto 0 and 1. A pipe end displaced by a
/// redirection is closed here, so its peer sees EOF (or EPIPE) right away.
pub fn build(pipeline: &Pipeline) -> Result<Vec<Stage>, ExecError> {
	let count = pipeline.commands.len();
	if count == 0 {
		return Err(ExecError::EmptyPipeline);
	}
	let mut stages = Vec::with_capacity(count);
	let mut pipe_read: Option<OwnedFd> = None;

	for (i, command) in pipeline.commands.iter().enumerate() {
		let mut stage = Stage { input: pipe_read.take(), output: None };
		if i + 1 < count {
			let (read, write) = unistd::pipe2(OFlag::O_CLOEXEC)?;
			stage.output = Some(write);
			pipe_read = Some(read);
		}

		if let Some(path) = command.input {
			stage.input = Some(open_redirect(path, OpenOptions::new().read(true))?);
		}
		if let Some(ref output) = command.output {
			let mut options = OpenOptions::new();
			options.write(true).create(true).mode(CREATE_MODE);
			match output.mode {
				WriteMode::Truncate => options.truncate(true),
				WriteMode::Append => options.append(true),
			};
			stage.output = Some(open_redirect(output.path, &options)?);
		}
		stages.push(stage);
	}
	Ok(stages)
}
