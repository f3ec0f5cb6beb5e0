// src/supervisor/mod.rs

//! Process supervision core.
//!
//! - [`handle`]: one launched process (state, output relay, stop sequence).
//! - [`process`]: [`ProcessSupervisor`], which owns the current handle of a
//!   single worker and refuses to start a second one while it is alive.
//! - [`registry`]: [`SupervisorRegistry`], one supervisor per named slot.

use std::time::Duration;

pub mod handle;
pub mod process;
pub mod registry;

pub use handle::ProcessHandle;
pub use process::ProcessSupervisor;
pub use registry::SupervisorRegistry;

/// Timing and scope of the stop sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Wait after the graceful request before escalating.
    pub grace_period: Duration,
    /// Wait after the forceful kill before declaring the kill failed.
    pub kill_timeout: Duration,
    /// Wait for the output pipe to reach EOF after the process exited.
    pub drain_timeout: Duration,
    /// Terminate the whole process tree, not just the direct child.
    pub kill_tree: bool,
}

pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);
pub const DEFAULT_KILL_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            kill_timeout: DEFAULT_KILL_TIMEOUT,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            kill_tree: true,
        }
    }
}
