use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

fn jobsh_in(dir: Option<&Path>, args: &[&str], input: &str) -> Output {
	let mut command = Command::new(env!("CARGO_BIN_EXE_jobsh"));
	command.args(args)
		.stdin(Stdio::piped())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped());
	if let Some(dir) = dir {
		command.current_dir(dir);
	}
	let mut child = command.spawn().unwrap();
	child.stdin.take().unwrap().write_all(input.as_bytes()).unwrap();
	child.wait_with_output().unwrap()
}

fn jobsh(args: &[&str]) -> Output {
	jobsh_in(None, args, "")
}

fn stdout(output: &Output) -> String {
	String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
	String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn pipeline_output() {
	let output = jobsh(&["-c", "printf X | cat"]);
	assert_eq!(output.status.code(), Some(0));
	assert_eq!(stdout(&output), "X");
}

#[test]
fn command_not_found() {
	let output = jobsh(&["-c", "no-such-command-for-jobsh; printf ok"]);
	assert_eq!(output.status.code(), Some(0));
	assert_eq!(stdout(&output), "ok");
	assert!(stderr(&output).contains("no-such-command-for-jobsh: command not found"));
}

#[test]
fn nothing_to_resume() {
	let output = jobsh(&["-c", "bg"]);
	assert_eq!(output.status.code(), Some(1));
	assert!(stderr(&output).contains("no suspended process"));
}

#[test]
fn launch_failure_policies() {
	let line = "cat < /nonexistent/jobsh-input; printf after";

	let output = jobsh(&["-c", line]);
	assert_eq!(output.status.code(), Some(0));
	assert_eq!(stdout(&output), "after");
	assert!(stderr(&output).contains("/nonexistent/jobsh-input"));

	let output = jobsh(&["--on-launch-failure", "abort", "-c", line]);
	assert_eq!(output.status.code(), Some(1));
	assert_eq!(stdout(&output), "");
}

#[test]
fn script_on_stdin() {
	let dir = tempfile::tempdir().unwrap();
	let output = jobsh_in(Some(dir.path()), &[], "printf a > f\nprintf b >> f\n\nexit 3\nprintf never\n");
	assert_eq!(output.status.code(), Some(3));
	assert_eq!(fs::read(dir.path().join("f")).unwrap(), b"ab");
	assert_eq!(stdout(&output), "");
}

#[test]
fn print_jobs() {
	let output = jobsh(&["--print-jobs", "-c", "true | true"]);
	assert!(stdout(&output).starts_with("id 0 [ foreground ]\n* program = true\n  - arg[ 0 ] = true\n"));
}

#[test]
fn syntax_error() {
	let output = jobsh(&["-c", "ls |"]);
	assert_eq!(output.status.code(), Some(2));
	assert!(stderr(&output).contains("syntax error: empty command"));
}
