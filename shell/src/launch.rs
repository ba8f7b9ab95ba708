use std::env;
use std::ffi::{self, CString, OsString};
use std::os::fd::BorrowedFd;
use std::os::unix::ffi::OsStringExt;
use std::ptr;

use libc::{c_char, STDIN_FILENO, STDOUT_FILENO};
use nix::errno::Errno;
use nix::unistd::{self, ForkResult, Pid};
use tracing::{debug, warn};

use crate::error::ExecError;
use crate::search;
use crate::signal;
use crate::topology::{self, Stage};
use crate::types::{Command, Pipeline};

/// Exit status of a child whose program could not be found.
pub const NOT_FOUND: i32 = 127;
/// Exit status of a child that could not exec its program.
pub const CANNOT_EXEC: i32 = 126;

/// What the parent remembers about one launched command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessRecord {
	pub pid: Pid,
	/// Descriptor the child read from at launch (0 if inherited).
	pub input: i32,
	/// Descriptor the child wrote to at launch (1 if inherited).
	pub output: i32,
}

/// Everything a child needs, prepared before fork so the child never
/// allocates.
struct ChildPlan {
	name: Vec<u8>,
	program: Option<CString>,
	_argv: Vec<CString>,
	argv_ptrs: Vec<*const c_char>,
}

impl ChildPlan {
	fn new(command: &Command) -> Result<ChildPlan, ExecError> {
		let argv: Result<Vec<CString>, ffi::NulError> = command.arguments.iter().map(|&s| CString::new(s)).collect();
		let argv = argv?;
		let argv_ptrs = null_terminated(&argv);
		Ok(ChildPlan {
			name: command.name.to_owned(),
			program: search::lookup(command.name),
			_argv: argv,
			argv_ptrs: argv_ptrs,
		})
	}
}

fn null_terminated(strings: &[CString]) -> Vec<*const c_char> {
	strings.iter().map(|s| s.as_ptr()).chain(Some(ptr::null())).collect()
}

fn environment() -> Result<Vec<CString>, ffi::NulError> {
	env::vars_os().map(|(mut k, v)| CString::new({ k.push(OsString::from("=")); k.push(v); k.into_vec() })).collect()
}

fn write_stderr(parts: &[&[u8]]) {
	for part in parts {
		let _ = unsafe { libc::write(libc::STDERR_FILENO, part.as_ptr() as *const libc::c_void, part.len()) };
	}
}

fn die(parts: &[&[u8]], status: i32) -> ! {
	write_stderr(parts);
	unsafe { libc::_exit(status) }
}

/// The child side of fork. Never returns into the parent's code path.
fn exec_child(plan: &ChildPlan, envp: &[*const c_char], stage: &Stage, pgid: Option<Pid>, tty: Option<BorrowedFd>) -> ! {
	let pid = unistd::getpid();
	let group = pgid.unwrap_or(pid);
	let _ = unistd::setpgid(pid, group);
	if let Some(tty) = tty {
		// SIGTTOU is still ignored here, so this cannot stop us.
		let _ = unistd::tcsetpgrp(tty, group);
	}
	signal::reset_for_child();

	let (input, output) = (stage.input_fd(), stage.output_fd());
	if input != STDIN_FILENO && unsafe { libc::dup2(input, STDIN_FILENO) } < 0 {
		die(&[&plan.name, b": cannot redirect standard input\n"], CANNOT_EXEC);
	}
	if output != STDOUT_FILENO && unsafe { libc::dup2(output, STDOUT_FILENO) } < 0 {
		die(&[&plan.name, b": cannot redirect standard output\n"], CANNOT_EXEC);
	}

	let program = match plan.program {
		Some(ref program) => program,
		None => die(&[&plan.name, b": command not found\n"], NOT_FOUND),
	};
	unsafe { libc::execve(program.as_ptr(), plan.argv_ptrs.as_ptr(), envp.as_ptr()) };
	die(&[&plan.name, b": ", Errno::last().desc().as_bytes(), b"\n"], CANNOT_EXEC)
}

fn join_group(child: Pid, pgid: Pid) {
	match unistd::setpgid(child, pgid) {
		// EACCES: the child already exec'd after joining on its own.
		Ok(()) | Err(Errno::EACCES) => {},
		Err(e) => warn!("setpgid({}, {}) failed: {}", child, pgid, e),
	}
}

/// Forks one child per command, left to right, all in one process group
/// whose id is the first child's pid. Returns that group id.
///
/// Every launched child is pushed onto `processes` as soon as it exists, so
/// after an error the caller still knows which partial group to look after.
/// When `tty` is given and the pipeline runs in the foreground, each child
/// also takes the terminal for the group before exec.
pub fn launch(pipeline: &Pipeline, tty: Option<BorrowedFd>, processes: &mut Vec<ProcessRecord>) -> Result<Pid, ExecError> {
	let stages = topology::build(pipeline)?;
	let plans = pipeline.commands.iter().map(ChildPlan::new).collect::<Result<Vec<_>, _>>()?;
	let env = environment()?;
	let envp = null_terminated(&env);
	let tty = if pipeline.is_background() { None } else { tty };

	let mut pgid: Option<Pid> = None;
	for (stage, plan) in stages.into_iter().zip(plans.iter()) {
		match unsafe { unistd::fork() }? {
			ForkResult::Child => exec_child(plan, &envp, &stage, pgid, tty),
			ForkResult::Parent { child } => {
				let group = *pgid.get_or_insert(child);
				join_group(child, group);
				processes.push(ProcessRecord { pid: child, input: stage.input_fd(), output: stage.output_fd() });
				debug!("launched {} as pid {} in group {} (in {}, out {})",
					String::from_utf8_lossy(&plan.name), child, group, stage.input_fd(), stage.output_fd());
				// The parent's copies of this stage's ends close here.
				drop(stage);
			},
		}
	}
	pgid.ok_or(ExecError::EmptyPipeline)
}
