// src/exec/mod.rs

//! OS-facing process plumbing.
//!
//! - [`command`] describes a launch and spawns it with stdout and stderr
//!   merged into one pipe.
//! - [`reader`] runs the blocking line reader that feeds a
//!   [`LogPublisher`](crate::relay::LogPublisher).
//! - [`termination`] holds the graceful/forceful termination strategies for
//!   POSIX and Windows.
//! - [`side_file`] writes a worker's JSON settings before launch.

pub mod command;
pub mod reader;
pub mod side_file;
pub mod termination;

pub use command::LaunchCommand;
pub use side_file::write_side_file;
pub use termination::{default_strategy, ProcessTarget, TerminationStrategy, WindowsTermination};

#[cfg(unix)]
pub use termination::PosixTermination;
