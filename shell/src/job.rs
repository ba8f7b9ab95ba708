use std::sync::atomic::{AtomicI32, AtomicU64, AtomicU8, Ordering};

use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use tracing::debug;

use crate::error::JobError;
use crate::signal::ChildSignalMask;

/// Number of jobs the table can track at once.
pub const CAPACITY: usize = 64;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum State { Active, Stopped, Terminated }

pub trait WaitStatusExt {
	fn pid(self) -> Option<Pid>;
	fn state(self) -> State;
	/// Shell-style exit status: the exit code, or 128 + signal number.
	fn code(self) -> Option<i32>;
}

impl WaitStatusExt for WaitStatus {
	fn pid(self) -> Option<Pid> {
		match self {
			WaitStatus::Exited(pid, ..) => Some(pid),
			WaitStatus::Signaled(pid, ..) => Some(pid),
			WaitStatus::Stopped(pid, ..) => Some(pid),
			#[cfg(any(target_os = "linux", target_os = "android"))]
			WaitStatus::PtraceEvent(pid, ..) => Some(pid),
			#[cfg(any(target_os = "linux", target_os = "android"))]
			WaitStatus::PtraceSyscall(pid) => Some(pid),
			WaitStatus::Continued(pid) => Some(pid),
			WaitStatus::StillAlive => None,
		}
	}
	fn state(self) -> State {
		match self {
			WaitStatus::Exited(..) => State::Terminated,
			WaitStatus::Signaled(..) => State::Terminated,
			WaitStatus::Stopped(..) => State::Stopped,
			#[cfg(any(target_os = "linux", target_os = "android"))]
			WaitStatus::PtraceEvent(..) => State::Stopped,
			#[cfg(any(target_os = "linux", target_os = "android"))]
			WaitStatus::PtraceSyscall(..) => State::Stopped,
			WaitStatus::Continued(..) => State::Active,
			WaitStatus::StillAlive => State::Active,
		}
	}
	fn code(self) -> Option<i32> {
		match self {
			WaitStatus::Exited(_, code) => Some(code),
			WaitStatus::Signaled(_, sig, _) => Some(128 + sig as i32),
			_ => None,
		}
	}
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Status { Running, Stopped }

impl Status {
	fn from_raw(raw: u8) -> Status {
		if raw == STOPPED { Status::Stopped } else { Status::Running }
	}
}

const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

/// A copy of one table entry.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct JobRecord {
	pub pgid: Pid,
	pub status: Status,
	/// Logical time of insertion.
	pub since: u64,
	/// Logical time of the latest stop, 0 if never stopped.
	pub stopped_at: u64,
}

struct Slot {
	/// 0 while the slot is free.
	pgid: AtomicI32,
	status: AtomicU8,
	since: AtomicU64,
	stopped_at: AtomicU64,
}

const FREE: Slot = Slot {
	pgid: AtomicI32::new(0),
	status: AtomicU8::new(RUNNING),
	since: AtomicU64::new(0),
	stopped_at: AtomicU64::new(0),
};

impl Slot {
	fn record(&self) -> Option<JobRecord> {
		let pgid = self.pgid.load(Ordering::Acquire);
		if pgid == 0 {
			return None;
		}
		Some(JobRecord {
			pgid: Pid::from_raw(pgid),
			status: Status::from_raw(self.status.load(Ordering::Acquire)),
			since: self.since.load(Ordering::Relaxed),
			stopped_at: self.stopped_at.load(Ordering::Relaxed),
		})
	}

	fn release(&self, pgid: i32) -> bool {
		self.pgid.compare_exchange(pgid, 0, Ordering::AcqRel, Ordering::Acquire).is_ok()
	}
}

/// Process groups that can still be resumed or are running in the background.
///
/// Entries are fixed-size atomics so the SIGCHLD handler can update the table
/// without allocating or locking. Every main-flow operation runs with SIGCHLD
/// masked through [`ChildSignalMask`]; the handler runs with SIGCHLD already
/// blocked by the kernel, so the two never interleave on one thread.
pub struct JobTable {
	slots: [Slot; CAPACITY],
	clock: AtomicU64,
}

impl Default for JobTable {
	fn default() -> JobTable {
		JobTable::new()
	}
}

impl JobTable {
	pub fn new() -> JobTable {
		JobTable { slots: [FREE; CAPACITY], clock: AtomicU64::new(0) }
	}

	fn tick(&self) -> u64 {
		self.clock.fetch_add(1, Ordering::AcqRel) + 1
	}

	fn find(&self, pgid: Pid) -> Option<&Slot> {
		self.slots.iter().find(|s| s.pgid.load(Ordering::Acquire) == pgid.as_raw())
	}

	fn insert(&self, pgid: Pid, status: u8) -> Option<&Slot> {
		let now = self.tick();
		for slot in self.slots.iter() {
			if slot.pgid.load(Ordering::Acquire) != 0 {
				continue;
			}
			// Fill the fields before publishing the pgid.
			slot.status.store(status, Ordering::Release);
			slot.since.store(now, Ordering::Relaxed);
			slot.stopped_at.store(if status == STOPPED { now } else { 0 }, Ordering::Relaxed);
			if slot.pgid.compare_exchange(0, pgid.as_raw(), Ordering::AcqRel, Ordering::Acquire).is_ok() {
				return Some(slot);
			}
		}
		None
	}

	fn mark_stopped(&self, slot: &Slot) {
		slot.stopped_at.store(self.tick(), Ordering::Relaxed);
		slot.status.store(STOPPED, Ordering::Release);
	}

	/// Inserts `pgid` as stopped, or marks its record stopped.
	///
	/// Allocation and lock free, so it is also what the SIGCHLD handler calls.
	pub(crate) fn note_stopped(&self, pgid: Pid) -> bool {
		match self.find(pgid) {
			Some(slot) => {
				self.mark_stopped(slot);
				true
			},
			None => self.insert(pgid, STOPPED).is_some(),
		}
	}

	/// Tracks a freshly launched background group as running.
	pub fn record_background(&self, pgid: Pid) -> Result<(), JobError> {
		let _mask = ChildSignalMask::block()?;
		match self.find(pgid) {
			Some(slot) => slot.status.store(RUNNING, Ordering::Release),
			None => {
				self.insert(pgid, RUNNING).ok_or(JobError::TableFull)?;
			},
		}
		debug!("tracking background group {}", pgid);
		Ok(())
	}

	/// Tracks `pgid` as stopped. A group is never recorded twice.
	pub fn record_stopped(&self, pgid: Pid) -> Result<(), JobError> {
		let _mask = ChildSignalMask::block()?;
		if !self.note_stopped(pgid) {
			return Err(JobError::TableFull);
		}
		debug!("tracking stopped group {}", pgid);
		Ok(())
	}

	fn most_recent_stopped(&self) -> Option<(&Slot, JobRecord)> {
		self.slots.iter()
			.filter_map(|s| s.record().map(|r| (s, r)))
			.filter(|&(_, r)| r.status == Status::Stopped)
			.max_by_key(|&(_, r)| r.stopped_at)
	}

	/// Continues the most recently stopped group in the background.
	pub fn resume_most_recent(&self) -> Result<Pid, JobError> {
		let _mask = ChildSignalMask::block()?;
		let (slot, record) = self.most_recent_stopped().ok_or(JobError::NothingToResume)?;
		killpg(record.pgid, Signal::SIGCONT)
			.map_err(|e| JobError::Signal { pgid: record.pgid, source: e })?;
		slot.status.store(RUNNING, Ordering::Release);
		debug!("continued group {} in the background", record.pgid);
		Ok(record.pgid)
	}

	/// Removes and returns the group to bring to the foreground: the most
	/// recently stopped one, else the most recently started one.
	pub fn take_for_foreground(&self) -> Result<JobRecord, JobError> {
		let _mask = ChildSignalMask::block()?;
		let (slot, record) = match self.most_recent_stopped() {
			Some(found) => found,
			None => self.slots.iter()
				.filter_map(|s| s.record().map(|r| (s, r)))
				.max_by_key(|&(_, r)| r.since)
				.ok_or(JobError::NothingToResume)?,
		};
		slot.release(record.pgid.as_raw());
		Ok(record)
	}

	/// Collects pending status changes of one tracked group and forgets the
	/// group once `waitpid` reports it has no processes left.
	fn drain(&self, slot: &Slot, pgid: i32) -> bool {
		let flags = WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;
		loop {
			match waitpid(Pid::from_raw(-pgid), Some(flags)) {
				Ok(WaitStatus::StillAlive) => return false,
				Ok(status) => match status.state() {
					State::Stopped => self.mark_stopped(slot),
					State::Active => slot.status.store(RUNNING, Ordering::Release),
					State::Terminated => {},
				},
				Err(Errno::EINTR) => {},
				Err(Errno::ECHILD) => return slot.release(pgid),
				Err(_) => return false,
			}
		}
	}

	/// Body of the SIGCHLD handler: drains every tracked group.
	pub(crate) fn collect(&self) {
		for slot in self.slots.iter() {
			let pgid = slot.pgid.load(Ordering::Acquire);
			if pgid != 0 {
				self.drain(slot, pgid);
			}
		}
	}

	/// Forgets `pgid` if none of its processes remain. Returns whether the
	/// record was removed.
	pub fn reap(&self, pgid: Pid) -> Result<bool, JobError> {
		let _mask = ChildSignalMask::block()?;
		Ok(match self.find(pgid) {
			Some(slot) => self.drain(slot, pgid.as_raw()),
			None => false,
		})
	}

	/// Same sweep the handler does, from the main flow.
	pub fn reap_all(&self) -> Result<(), JobError> {
		let _mask = ChildSignalMask::block()?;
		self.collect();
		Ok(())
	}

	pub fn get(&self, pgid: Pid) -> Result<Option<JobRecord>, JobError> {
		let _mask = ChildSignalMask::block()?;
		Ok(self.find(pgid).and_then(Slot::record))
	}

	/// Current records in insertion order.
	pub fn snapshot(&self) -> Result<Vec<JobRecord>, JobError> {
		let _mask = ChildSignalMask::block()?;
		let mut records: Vec<JobRecord> = self.slots.iter().filter_map(Slot::record).collect();
		records.sort_by_key(|r| r.since);
		Ok(records)
	}

	pub fn len(&self) -> usize {
		self.slots.iter().filter(|s| s.pgid.load(Ordering::Acquire) != 0).count()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	// Group ids that belong to no child of the test process.
	fn pgid(n: i32) -> Pid {
		Pid::from_raw(0x3fff_0000 + n)
	}

	#[test]
	fn background_record_is_running() {
		let table = JobTable::new();
		table.record_background(pgid(1)).unwrap();
		let record = table.get(pgid(1)).unwrap().unwrap();
		assert_eq!(record.status, Status::Running);
		assert_eq!(record.stopped_at, 0);
	}

	#[test]
	fn repeated_stops_keep_one_record() {
		let table = JobTable::new();
		table.record_stopped(pgid(1)).unwrap();
		table.record_stopped(pgid(1)).unwrap();
		table.record_background(pgid(2)).unwrap();
		table.record_stopped(pgid(2)).unwrap();
		table.record_stopped(pgid(1)).unwrap();
		assert_eq!(table.len(), 2);
		let stopped: Vec<Pid> = table.snapshot().unwrap().iter().map(|r| r.pgid).collect();
		assert_eq!(stopped, vec![pgid(1), pgid(2)]);
	}

	#[test]
	fn resume_without_stopped_job_changes_nothing() {
		let table = JobTable::new();
		assert_eq!(table.resume_most_recent(), Err(JobError::NothingToResume));
		table.record_background(pgid(1)).unwrap();
		let before = table.snapshot().unwrap();
		assert_eq!(table.resume_most_recent(), Err(JobError::NothingToResume));
		assert_eq!(table.snapshot().unwrap(), before);
	}

	#[test]
	fn last_stopped_is_picked() {
		let table = JobTable::new();
		table.record_stopped(pgid(1)).unwrap();
		table.record_stopped(pgid(2)).unwrap();
		table.record_stopped(pgid(1)).unwrap();
		let (_, record) = table.most_recent_stopped().unwrap();
		assert_eq!(record.pgid, pgid(1));
	}

	#[test]
	fn foreground_prefers_stopped_then_newest() {
		let table = JobTable::new();
		table.record_background(pgid(1)).unwrap();
		table.record_stopped(pgid(2)).unwrap();
		table.record_background(pgid(3)).unwrap();
		assert_eq!(table.take_for_foreground().unwrap().pgid, pgid(2));
		assert_eq!(table.take_for_foreground().unwrap().pgid, pgid(3));
		assert_eq!(table.take_for_foreground().unwrap().pgid, pgid(1));
		assert_eq!(table.take_for_foreground(), Err(JobError::NothingToResume));
	}

	#[test]
	fn full_table() {
		let table = JobTable::new();
		for n in 0 .. CAPACITY as i32 {
			table.record_background(pgid(n)).unwrap();
		}
		assert_eq!(table.record_background(pgid(-1)), Err(JobError::TableFull));
		assert_eq!(table.record_stopped(pgid(-1)), Err(JobError::TableFull));
		assert_eq!(table.take_for_foreground().unwrap().pgid, pgid(CAPACITY as i32 - 1));
		table.record_stopped(pgid(-1)).unwrap();
		assert_eq!(table.len(), CAPACITY);
	}

	#[test]
	fn reap_forgets_groups_without_processes() {
		let table = JobTable::new();
		table.record_background(pgid(1)).unwrap();
		assert!(table.reap(pgid(1)).unwrap());
		assert!(table.is_empty());
		assert!(!table.reap(pgid(1)).unwrap());
	}
}
