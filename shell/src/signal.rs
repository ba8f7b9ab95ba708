//! Process-wide signal dispositions for job control, and the critical section
//! that keeps the main flow and the SIGCHLD handler off the job table at the
//! same time.

use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};
use std::sync::Arc;

use libc::c_int;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal};
use tracing::debug;

use crate::error::{JobError, ShellError};
use crate::job::JobTable;

/// Table the SIGCHLD handler works on. Holds one strong count of the `Arc`
/// while dispositions are installed.
static TABLE: AtomicPtr<JobTable> = AtomicPtr::new(ptr::null_mut());
static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Signals whose disposition the interpreter changes.
const MANAGED: [Signal; 4] = [Signal::SIGTTOU, Signal::SIGINT, Signal::SIGTSTP, Signal::SIGCHLD];

/// Dispositions restored in a child before exec.
const CHILD_DEFAULTS: [Signal; 6] = [
	Signal::SIGINT, Signal::SIGQUIT, Signal::SIGTSTP,
	Signal::SIGTTIN, Signal::SIGTTOU, Signal::SIGCHLD,
];

/// Blocks SIGCHLD for the calling thread until dropped.
///
/// Guards nest: each one restores exactly the mask it found.
#[must_use]
pub struct ChildSignalMask {
	previous: SigSet,
}

impl ChildSignalMask {
	pub fn block() -> Result<ChildSignalMask, JobError> {
		let mut set = SigSet::empty();
		set.add(Signal::SIGCHLD);
		let mut previous = SigSet::empty();
		signal::pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&set), Some(&mut previous))
			.map_err(JobError::Mask)?;
		Ok(ChildSignalMask { previous: previous })
	}
}

impl Drop for ChildSignalMask {
	fn drop(&mut self) {
		let _ = signal::pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&self.previous), None);
	}
}

extern "C" fn on_interactive_signal(_: c_int) {}

extern "C" fn on_child_status(_: c_int) {
	let saved = errno::get();
	let table = TABLE.load(Ordering::Acquire);
	if !table.is_null() {
		// The pointer stays valid until `Dispositions` is dropped, which
		// happens with SIGCHLD blocked and after the handler is unbound.
		unsafe { &*table }.collect();
	}
	errno::set(saved);
}

/// The installed job-control dispositions. Dropping it restores the ones
/// found at install time and releases the handler's reference to the table.
pub struct Dispositions {
	previous: Vec<(Signal, SigAction)>,
}

impl Dispositions {
	/// Installs the dispositions. May be called once per process at a time.
	pub fn install(table: Arc<JobTable>) -> Result<Dispositions, ShellError> {
		if INSTALLED.swap(true, Ordering::AcqRel) {
			return Err(ShellError::AlreadyInitialized);
		}
		TABLE.store(Arc::into_raw(table) as *mut JobTable, Ordering::Release);

		let mut this = Dispositions { previous: Vec::with_capacity(MANAGED.len()) };
		for &sig in MANAGED.iter() {
			let action = match sig {
				// Never be stopped for touching the terminal from the background.
				Signal::SIGTTOU => SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty()),
				// A no-op handler rather than SIG_IGN: ignored dispositions
				// survive exec and would make children uninterruptible.
				Signal::SIGINT | Signal::SIGTSTP =>
					SigAction::new(SigHandler::Handler(on_interactive_signal), SaFlags::empty(), SigSet::empty()),
				_ => SigAction::new(SigHandler::Handler(on_child_status), SaFlags::SA_RESTART, SigSet::empty()),
			};
			// Dropping `this` on error rolls back what was installed so far.
			let previous = unsafe { signal::sigaction(sig, &action) }.map_err(ShellError::Signal)?;
			this.previous.push((sig, previous));
		}
		debug!("job control signal dispositions installed");
		Ok(this)
	}
}

impl Drop for Dispositions {
	fn drop(&mut self) {
		let mask = ChildSignalMask::block();
		for (sig, action) in self.previous.drain(..).rev() {
			let _ = unsafe { signal::sigaction(sig, &action) };
		}
		let table = TABLE.swap(ptr::null_mut(), Ordering::AcqRel);
		if !table.is_null() {
			drop(unsafe { Arc::from_raw(table as *const JobTable) });
		}
		drop(mask);
		INSTALLED.store(false, Ordering::Release);
		debug!("job control signal dispositions restored");
	}
}

/// Puts a freshly forked child back to default job-control signal handling.
///
/// Runs between fork and exec, so it only makes raw syscalls.
pub fn reset_for_child() {
	let default = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
	for &sig in CHILD_DEFAULTS.iter() {
		let _ = unsafe { signal::sigaction(sig, &default) };
	}
	let _ = signal::pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&SigSet::empty()), None);
}

mod errno {
	use libc::c_int;

	#[cfg(any(target_os = "linux", target_os = "android"))]
	unsafe fn location() -> *mut c_int {
		libc::__errno_location()
	}

	#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd", target_os = "dragonfly"))]
	unsafe fn location() -> *mut c_int {
		libc::__error()
	}

	#[cfg(any(target_os = "openbsd", target_os = "netbsd"))]
	unsafe fn location() -> *mut c_int {
		libc::__errno()
	}

	pub fn get() -> c_int {
		unsafe { *location() }
	}

	pub fn set(value: c_int) {
		unsafe { *location() = value }
	}
}
