use std::io;
use std::sync::{Arc, Mutex};

use slotrun::exec::{ProcessTarget, TerminationStrategy};

/// Which phase a strategy call belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Graceful,
    Force,
}

/// A termination strategy that:
/// - records every call
/// - forwards to the host strategy, unless told to fail a phase
#[derive(Debug, Clone)]
pub struct FakeTermination {
    calls: Arc<Mutex<Vec<(Phase, ProcessTarget)>>>,
    fail_graceful: bool,
    fail_force: bool,
    inner: Arc<dyn TerminationStrategy>,
}

impl FakeTermination {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_graceful: false,
            fail_force: false,
            inner: slotrun::exec::default_strategy(),
        }
    }

    /// Report an error for the forceful kill without touching the process.
    pub fn failing_force_kill(mut self) -> Self {
        self.fail_force = true;
        self
    }

    /// Report an error for the graceful request without touching the process.
    pub fn failing_graceful(mut self) -> Self {
        self.fail_graceful = true;
        self
    }

    pub fn calls(&self) -> Vec<(Phase, ProcessTarget)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn phases(&self) -> Vec<Phase> {
        self.calls().into_iter().map(|(p, _)| p).collect()
    }
}

impl Default for FakeTermination {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminationStrategy for FakeTermination {
    fn request_graceful(&self, target: ProcessTarget) -> io::Result<()> {
        self.calls.lock().unwrap().push((Phase::Graceful, target));
        if self.fail_graceful {
            return Err(io::Error::other("graceful request refused (fake)"));
        }
        self.inner.request_graceful(target)
    }

    fn force_kill(&self, target: ProcessTarget) -> io::Result<()> {
        self.calls.lock().unwrap().push((Phase::Force, target));
        if self.fail_force {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "kill refused (fake)"));
        }
        self.inner.force_kill(target)
    }
}
