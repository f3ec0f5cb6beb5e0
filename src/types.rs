use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque identifier of one launched process handle.
///
/// Ids are unique for the lifetime of the library; a new `start()` always
/// yields a fresh id even when the OS recycles the pid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

impl HandleId {
    pub(crate) fn next() -> Self {
        HandleId(NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a process handle reached its terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The process exited with this OS exit code.
    Exited(i32),
    /// The process was ended by a signal that the supervisor did not
    /// escalate to (e.g. the default action of the graceful SIGTERM).
    Signalled(i32),
    /// The supervisor escalated to a forceful kill.
    Killed,
    /// Launch failed, or the forceful kill failed.
    Error(String),
}

impl Termination {
    /// Exit code, if the process exited on its own terms.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Termination::Exited(code) => Some(*code),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Termination::Exited(0))
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Exited(code) => write!(f, "exited with code {code}"),
            Termination::Signalled(sig) => write!(f, "terminated by signal {sig}"),
            Termination::Killed => write!(f, "killed"),
            Termination::Error(reason) => write!(f, "error: {reason}"),
        }
    }
}

/// Lifecycle state of a supervised process.
///
/// ```text
/// Idle -> Starting -> Running -> Stopping -> Terminated(..)
///            |           |                      ^
///            |           +---- (exits) ---------+
///            +---- (launch fails) -> Terminated(Error)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessState {
    Idle,
    Starting,
    Running,
    Stopping,
    Terminated(Termination),
}

impl ProcessState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessState::Terminated(_))
    }

    /// `Starting`, `Running` or `Stopping`: something owns an OS process.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ProcessState::Starting | ProcessState::Running | ProcessState::Stopping
        )
    }

    pub fn termination(&self) -> Option<&Termination> {
        match self {
            ProcessState::Terminated(t) => Some(t),
            _ => None,
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessState::Idle => write!(f, "idle"),
            ProcessState::Starting => write!(f, "starting"),
            ProcessState::Running => write!(f, "running"),
            ProcessState::Stopping => write!(f, "stopping"),
            ProcessState::Terminated(t) => write!(f, "terminated ({t})"),
        }
    }
}

/// Result of a `stop()` request that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// Nothing was running; informational, not an error.
    NothingToStop,
    /// The process ended; carries its final termination.
    Stopped(Termination),
}
