//! Job control for a line-oriented command interpreter.
//!
//! A parsed [`JobList`] is run pipeline by pipeline: each pipeline becomes one
//! process group wired together with pipes and redirections, and is either
//! waited for in the foreground or tracked as a background job. Stopped and
//! background groups live in a [`JobTable`] that the SIGCHLD handler keeps up
//! to date.

pub mod builtin;
pub mod config;
pub mod error;
pub mod eval;
pub mod foreground;
pub mod job;
pub mod launch;
pub mod parser;
pub mod print;
pub mod search;
pub mod shell;
pub mod signal;
pub mod topology;
pub mod types;

pub use config::{Config, LaunchFailure};
pub use error::{ExecError, JobError, ShellError};
pub use foreground::Outcome;
pub use job::{JobRecord, JobTable, Status};
pub use shell::{FinishedJob, JobLine, Shell};
pub use types::{Command, JobList, Mode, OutputRedirect, Pipeline, WriteMode};
