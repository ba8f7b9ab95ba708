//! Runs the binary as a session leader on a pseudo-terminal, so the
//! interpreter really owns a controlling terminal and hands it to jobs.
#![cfg(target_os = "linux")]

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use nix::pty::{openpty, Winsize};
use nix::sys::termios::{self, LocalFlags, SetArg, Termios};
use nix::unistd;

const PROMPT: &str = "PROMPT> ";

fn cloexec(fd: &OwnedFd) {
	fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC)).unwrap();
}

/// Feeds `input` to an interactive jobsh and returns everything written to
/// the terminal until the last process holding it is gone.
fn jobsh_on_pty(input: &str) -> String {
	let pty = openpty(None::<&Winsize>, None::<&Termios>).unwrap();
	cloexec(&pty.master);
	cloexec(&pty.slave);
	let mut attrs = termios::tcgetattr(&pty.slave).unwrap();
	attrs.local_flags.remove(LocalFlags::ECHO);
	termios::tcsetattr(&pty.slave, SetArg::TCSANOW, &attrs).unwrap();

	let mut child = {
		let mut command = Command::new(env!("CARGO_BIN_EXE_jobsh"));
		command.args(["--prompt", PROMPT])
			.stdin(Stdio::from(pty.slave.try_clone().unwrap()))
			.stdout(Stdio::from(pty.slave.try_clone().unwrap()))
			.stderr(Stdio::from(pty.slave));
		unsafe {
			command.pre_exec(|| {
				unistd::setsid()?;
				if libc::ioctl(0, libc::TIOCSCTTY, 0) < 0 {
					return Err(io::Error::last_os_error());
				}
				Ok(())
			});
		}
		command.spawn().unwrap()
	};

	let mut writer = File::from(pty.master.try_clone().unwrap());
	let mut reader = File::from(pty.master);
	let (tx, rx) = mpsc::channel();
	thread::spawn(move || {
		let mut output = Vec::new();
		let mut buf = [0u8; 4096];
		// EIO once no slave descriptor is left open.
		while let Ok(n) = reader.read(&mut buf) {
			if n == 0 {
				break;
			}
			output.extend_from_slice(&buf[.. n]);
		}
		let _ = tx.send(output);
	});

	writer.write_all(input.as_bytes()).unwrap();
	match rx.recv_timeout(Duration::from_secs(30)) {
		Ok(output) => {
			child.wait().unwrap();
			String::from_utf8_lossy(&output).into_owned()
		},
		Err(_) => {
			let _ = child.kill();
			panic!("jobsh did not finish on the terminal");
		},
	}
}

#[test]
fn prompt_returns_after_foreground_pipeline() {
	let output = jobsh_on_pty("printf X | cat\nexit\n");
	assert!(output.starts_with(PROMPT), "{:?}", output);
	assert!(output.contains(&format!("X{}", PROMPT)), "{:?}", output);
}

#[test]
fn stopped_job_moves_between_foreground_and_background() {
	let dir = tempfile::tempdir().unwrap();
	let script = dir.path().join("stop.sh");
	fs::write(&script, "kill -STOP $$\necho back\n").unwrap();
	let job = format!("sh {}", script.display());

	let input = format!("{job}\njobs\nfg\n{job}\nbg\nexit\n", job = job);
	let output = jobsh_on_pty(&input);

	// Two stop notices and one `jobs` line.
	assert_eq!(output.matches(&format!("] Stopped  {}", job)).count(), 3, "{:?}", output);
	let resumed = output.find("back").expect("fg did not continue the job");
	assert!(resumed > output.find("] Stopped").unwrap(), "{:?}", output);
	assert!(output.contains("] continued"), "{:?}", output);
	assert!(output.matches(PROMPT).count() >= 6, "{:?}", output);
}
