// src/exec/termination.rs

//! Platform termination strategies.
//!
//! The supervisor only knows a two-phase contract: ask politely, then force.
//! How each phase maps onto the OS lives behind [`TerminationStrategy`] so
//! tests (and unusual platforms) can swap it out.

use std::fmt::Debug;
use std::io;
use std::process::{Command, Stdio};
use std::sync::Arc;

/// The process (and optionally its tree) a strategy acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessTarget {
    pub pid: u32,
    /// Signal every descendant too. On POSIX this targets the process group
    /// led by `pid`, which the supervisor creates at spawn time.
    pub tree: bool,
}

/// Two-phase termination capability.
///
/// Both methods are called from a blocking worker and may block briefly.
/// A target that has already vanished should be reported as success.
pub trait TerminationStrategy: Send + Sync + Debug {
    /// Ask the process to shut down on its own.
    fn request_graceful(&self, target: ProcessTarget) -> io::Result<()>;

    /// Kill the process without giving it a choice.
    fn force_kill(&self, target: ProcessTarget) -> io::Result<()>;
}

/// Strategy for the host platform, selected at compile time.
pub fn default_strategy() -> Arc<dyn TerminationStrategy> {
    #[cfg(unix)]
    {
        Arc::new(PosixTermination)
    }
    #[cfg(not(unix))]
    {
        Arc::new(WindowsTermination)
    }
}

/// SIGTERM, then SIGKILL.
#[cfg(unix)]
#[derive(Debug, Clone, Copy, Default)]
pub struct PosixTermination;

#[cfg(unix)]
impl TerminationStrategy for PosixTermination {
    fn request_graceful(&self, target: ProcessTarget) -> io::Result<()> {
        send_signal(target, libc::SIGTERM)
    }

    fn force_kill(&self, target: ProcessTarget) -> io::Result<()> {
        send_signal(target, libc::SIGKILL)
    }
}

#[cfg(unix)]
fn send_signal(target: ProcessTarget, signal: libc::c_int) -> io::Result<()> {
    let pid = libc::pid_t::try_from(target.pid)
        .ok()
        .filter(|pid| *pid > 0)
        .ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("refusing to signal pid {}", target.pid))
        })?;
    let dest = if target.tree { -pid } else { pid };

    // SAFETY: kill(2) has no memory-safety preconditions; `dest` is never 0
    // or -1, so it cannot address our own group or every process.
    let rc = unsafe { libc::kill(dest, signal) };
    if rc == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(())
    } else {
        Err(err)
    }
}

/// `taskkill /T`, then `taskkill /F /T`.
///
/// Console programs frequently refuse the non-forced request; the
/// supervisor then simply waits out the grace period and escalates.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsTermination;

impl TerminationStrategy for WindowsTermination {
    fn request_graceful(&self, target: ProcessTarget) -> io::Result<()> {
        taskkill(target, false)
    }

    fn force_kill(&self, target: ProcessTarget) -> io::Result<()> {
        taskkill(target, true)
    }
}

fn taskkill(target: ProcessTarget, force: bool) -> io::Result<()> {
    let mut cmd = Command::new("taskkill");
    if force {
        cmd.arg("/F");
    }
    if target.tree {
        cmd.arg("/T");
    }
    cmd.arg("/PID")
        .arg(target.pid.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    let output = cmd.output()?;
    taskkill_result(output.status.code(), &output.stderr)
}

/// taskkill exits with 128 when the pid no longer exists.
const TASKKILL_NOT_FOUND: i32 = 128;

fn taskkill_result(code: Option<i32>, stderr: &[u8]) -> io::Result<()> {
    match code {
        Some(0) | Some(TASKKILL_NOT_FOUND) => Ok(()),
        _ => Err(io::Error::other(format!(
            "taskkill exited with {}: {}",
            code.map_or_else(|| "no code".to_string(), |c| c.to_string()),
            String::from_utf8_lossy(stderr).trim()
        ))),
    }
}
