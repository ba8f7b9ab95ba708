use std::env;
use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::OsStrExt;

use crate::error::{ExecError, JobError};
use crate::job::Status;
use crate::shell::Shell;

pub type Builtin = fn(&mut Shell, &[&[u8]]) -> i32;

pub fn builtin_exit(shell: &mut Shell, args: &[&[u8]]) -> i32 {
	let status = match args.get(1) {
		None => shell.status(),
		Some(arg) => match std::str::from_utf8(arg).ok().and_then(|s| s.parse::<i32>().ok()) {
			Some(n) => n & 0xff,
			None => {
				eprintln!("jobsh: exit: {}: numeric argument required", String::from_utf8_lossy(arg));
				2
			},
		},
	};
	shell.request_exit(status);
	status
}

pub fn builtin_cd(_: &mut Shell, args: &[&[u8]]) -> i32 {
	let target: OsString = match args.get(1) {
		Some(dir) => OsStr::from_bytes(dir).to_owned(),
		None => match env::var_os("HOME") {
			Some(home) => home,
			None => {
				eprintln!("jobsh: cd: HOME not set");
				return 1;
			},
		},
	};
	match env::set_current_dir(&target) {
		Ok(()) => 0,
		Err(e) => {
			eprintln!("jobsh: cd: {}: {}", target.to_string_lossy(), e);
			1
		},
	}
}

pub fn builtin_bg(shell: &mut Shell, _: &[&[u8]]) -> i32 {
	match shell.resume_background() {
		Ok(pgid) => {
			println!("[{}] continued", pgid);
			0
		},
		Err(e) => {
			eprintln!("jobsh: bg: {}", e);
			1
		},
	}
}

pub fn builtin_fg(shell: &mut Shell, _: &[&[u8]]) -> i32 {
	match shell.resume_foreground() {
		Ok(outcome) => outcome.status(),
		Err(ExecError::Job(JobError::NothingToResume)) => {
			eprintln!("jobsh: fg: no current job");
			1
		},
		Err(e) => {
			eprintln!("jobsh: fg: {}", e);
			1
		},
	}
}

pub fn builtin_jobs(shell: &mut Shell, _: &[&[u8]]) -> i32 {
	if let Err(e) = shell.jobs().reap_all() {
		eprintln!("jobsh: jobs: {}", e);
		return 1;
	}
	match shell.job_lines() {
		Ok(lines) => {
			for line in lines {
				let status = match line.status {
					Status::Running => "Running",
					Status::Stopped => "Stopped",
				};
				println!("[{}] {:<8} {}", line.pgid, status, line.text);
			}
			0
		},
		Err(e) => {
			eprintln!("jobsh: jobs: {}", e);
			1
		},
	}
}

pub fn match_builtin(name: &[u8]) -> Option<Builtin> {
	match name {
		b"exit" => Some(builtin_exit),
		b"cd" => Some(builtin_cd),
		b"bg" => Some(builtin_bg),
		b"fg" => Some(builtin_fg),
		b"jobs" => Some(builtin_jobs),
		_ => None,
	}
}
