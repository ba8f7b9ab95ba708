use std::collections::BTreeMap;
use std::io::{self, IsTerminal};
use std::os::fd::AsFd;
use std::sync::Arc;

use nix::unistd::Pid;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{JobError, ShellError};
use crate::foreground::Terminal;
use crate::job::{JobTable, Status};
use crate::launch::ProcessRecord;
use crate::signal::Dispositions;

/// A background or stopped pipeline as the interactive loop knows it.
#[derive(Debug, Clone)]
pub(crate) struct Tracked {
	pub(crate) text: String,
	pub(crate) processes: Vec<ProcessRecord>,
}

/// A tracked job that has finished since it was last reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedJob {
	pub pgid: Pid,
	pub text: String,
}

/// One line of `jobs` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLine {
	pub pgid: Pid,
	pub status: Status,
	pub text: String,
}

/// The interpreter's top-level lifecycle object. It owns the job table, the
/// signal dispositions that feed it, and the terminal.
pub struct Shell {
	pub(crate) config: Config,
	pub(crate) jobs: Arc<JobTable>,
	dispositions: Option<Dispositions>,
	pub(crate) terminal: Option<Terminal>,
	pub(crate) tracked: BTreeMap<i32, Tracked>,
	pub(crate) status: i32,
	pub(crate) exit: Option<i32>,
}

impl Shell {
	/// Installs the job-control signal dispositions and, when stdin is a
	/// terminal and job control is enabled, takes the terminal.
	///
	/// Only one `Shell` may be initialized at a time.
	pub fn init(config: Config) -> Result<Shell, ShellError> {
		let jobs = Arc::new(JobTable::new());
		let dispositions = Dispositions::install(Arc::clone(&jobs))?;
		let stdin = io::stdin();
		let terminal = if config.job_control && stdin.is_terminal() {
			Some(Terminal::claim(stdin.as_fd())?)
		} else {
			None
		};
		info!("shell initialized (job control: {})", terminal.is_some());
		Ok(Shell {
			config: config,
			jobs: jobs,
			dispositions: Some(dispositions),
			terminal: terminal,
			tracked: BTreeMap::new(),
			status: 0,
			exit: None,
		})
	}

	/// Restores the signal dispositions and releases the job table.
	pub fn shutdown(mut self) {
		self.release();
	}

	fn release(&mut self) {
		if let Some(dispositions) = self.dispositions.take() {
			drop(dispositions);
			debug!("shell shut down with {} tracked job(s)", self.jobs.len());
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn jobs(&self) -> &JobTable {
		&self.jobs
	}

	pub fn is_interactive(&self) -> bool {
		self.terminal.is_some()
	}

	/// Status of the last pipeline or builtin.
	pub fn status(&self) -> i32 {
		self.status
	}

	pub fn set_status(&mut self, status: i32) {
		self.status = status;
	}

	/// Exit status requested by the `exit` builtin, if any.
	pub fn exit_requested(&self) -> Option<i32> {
		self.exit
	}

	pub(crate) fn request_exit(&mut self, status: i32) {
		self.exit = Some(status);
	}

	pub(crate) fn track(&mut self, pgid: Pid, text: String, processes: Vec<ProcessRecord>) {
		self.tracked.insert(pgid.as_raw(), Tracked { text: text, processes: processes });
	}

	/// Sweeps the job table and returns the tracked jobs it no longer holds.
	pub fn finished_jobs(&mut self) -> Result<Vec<FinishedJob>, JobError> {
		self.jobs.reap_all()?;
		let live: Vec<i32> = self.jobs.snapshot()?.iter().map(|r| r.pgid.as_raw()).collect();
		let gone: Vec<i32> = self.tracked.keys().copied().filter(|pgid| !live.contains(pgid)).collect();
		Ok(gone.into_iter().filter_map(|pgid| {
			self.tracked.remove(&pgid).map(|t| FinishedJob { pgid: Pid::from_raw(pgid), text: t.text })
		}).collect())
	}

	/// The job table joined with what the interactive loop remembers.
	pub fn job_lines(&self) -> Result<Vec<JobLine>, JobError> {
		Ok(self.jobs.snapshot()?.into_iter().map(|r| JobLine {
			pgid: r.pgid,
			status: r.status,
			text: self.tracked.get(&r.pgid.as_raw()).map(|t| t.text.clone()).unwrap_or_default(),
		}).collect())
	}
}

impl Drop for Shell {
	fn drop(&mut self) {
		self.release();
	}
}
