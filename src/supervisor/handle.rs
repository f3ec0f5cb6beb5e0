// src/supervisor/handle.rs

//! One launched process: its state, its output relay and its stop sequence.

use std::io;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Child;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::errors::{Result, SlotrunError};
use crate::exec::command::{spawn_merged, LaunchCommand};
use crate::exec::reader::spawn_output_reader;
use crate::exec::termination::{ProcessTarget, TerminationStrategy};
use crate::relay::{log_relay, LogLine, LogRelay};
use crate::types::{HandleId, ProcessState, StopOutcome, Termination};

use super::SupervisorConfig;

/// Shared view of one launched process.
///
/// Clones refer to the same process. Once the handle is terminal it never
/// changes again; a new `start()` always produces a new handle.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    id: HandleId,
    pid: Option<u32>,
    command: LaunchCommand,
    config: SupervisorConfig,
    strategy: Arc<dyn TerminationStrategy>,
    state: watch::Sender<ProcessState>,
    /// Set by the exit watcher once the child is reaped and its output is
    /// drained. Read by the stop sequence.
    exit: watch::Sender<Option<Termination>>,
    relay: LogRelay,
}

/// A launch that failed. The handle is already `Terminated(Error)`.
#[derive(Debug)]
pub(crate) struct FailedLaunch {
    pub handle: ProcessHandle,
    pub error: SlotrunError,
}

impl ProcessHandle {
    /// Spawn `command` and attach the output reader and exit watcher.
    ///
    /// Must be called from within a Tokio runtime. Does not block on the
    /// process.
    pub(crate) fn launch(
        command: LaunchCommand,
        config: SupervisorConfig,
        strategy: Arc<dyn TerminationStrategy>,
    ) -> std::result::Result<ProcessHandle, FailedLaunch> {
        let id = HandleId::next();
        let state = watch::Sender::new(ProcessState::Starting);
        let (publisher, relay) = log_relay();

        debug!(handle = %id, cmd = %command, "starting process");

        let spawned = match spawn_merged(&command, config.kill_tree) {
            Ok(spawned) => spawned,
            Err(source) => {
                warn!(handle = %id, cmd = %command, error = %source, "failed to launch process");
                state.send_replace(ProcessState::Terminated(Termination::Error(source.to_string())));
                drop(publisher);

                let error = SlotrunError::Launch {
                    command: command.to_string(),
                    source,
                };
                let handle = ProcessHandle {
                    shared: Arc::new(Shared {
                        id,
                        pid: None,
                        command,
                        config,
                        strategy,
                        state,
                        exit: watch::Sender::new(None),
                        relay,
                    }),
                };
                return Err(FailedLaunch { handle, error });
            }
        };

        let pid = spawned.pid;
        state.send_replace(ProcessState::Running);
        info!(handle = %id, pid, cmd = %command, "process started");

        let shared = Arc::new(Shared {
            id,
            pid: Some(pid),
            command,
            config,
            strategy,
            state,
            exit: watch::Sender::new(None),
            relay,
        });

        let reader = spawn_output_reader(spawned.output, publisher, id);
        tokio::spawn(watch_exit(Arc::clone(&shared), spawned.child, reader));

        Ok(ProcessHandle { shared })
    }

    pub fn id(&self) -> HandleId {
        self.shared.id
    }

    /// OS process id; `None` when the launch failed.
    pub fn pid(&self) -> Option<u32> {
        self.shared.pid
    }

    pub fn command(&self) -> &LaunchCommand {
        &self.shared.command
    }

    pub fn state(&self) -> ProcessState {
        (*self.shared.state.borrow()).clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<ProcessState> {
        self.shared.state.subscribe()
    }

    /// Lines produced since the last drain, in order. Never blocks.
    pub fn drain(&self) -> Vec<LogLine> {
        self.shared.relay.drain()
    }

    /// True once the process output is closed and fully drained.
    pub fn output_finished(&self) -> bool {
        self.shared.relay.is_finished()
    }

    /// Wait until the handle reaches a terminal state.
    pub async fn wait(&self) -> Termination {
        let mut rx = self.shared.state.subscribe();
        let result = match rx.wait_for(ProcessState::is_terminal).await {
            Ok(state) => state.termination().cloned(),
            Err(_) => None,
        };
        // The sender lives in `self.shared`, so the channel cannot close
        // while we hold `self`.
        result.unwrap_or_else(|| Termination::Error("state channel closed".to_string()))
    }

    /// Two-phase stop: graceful request, `grace_period`, forceful kill.
    ///
    /// Returns [`StopOutcome::NothingToStop`] unless the handle is `Running`.
    /// The escalation runs on its own task, so dropping the returned future
    /// does not leave the handle stuck in `Stopping`.
    pub async fn stop(&self) -> Result<StopOutcome> {
        let Some(pid) = self.shared.pid else {
            return Ok(StopOutcome::NothingToStop);
        };

        let began = self.shared.state.send_if_modified(|state| {
            if *state == ProcessState::Running {
                *state = ProcessState::Stopping;
                true
            } else {
                false
            }
        });
        if !began {
            debug!(handle = %self.shared.id, state = %self.state(), "stop requested but process is not running");
            return Ok(StopOutcome::NothingToStop);
        }

        let shared = Arc::clone(&self.shared);
        match tokio::spawn(escalate(shared, pid)).await {
            Ok(result) => result,
            Err(join_err) => Err(SlotrunError::Other(join_err.into())),
        }
    }
}

/// Await the child's exit and the end of its output, then publish the
/// terminal state. Output is always fully relayed before `Terminated` is
/// observable.
async fn watch_exit(shared: Arc<Shared>, mut child: Child, reader: JoinHandle<u64>) {
    let id = shared.id;
    let termination = match child.wait().await {
        Ok(status) => termination_from_status(status),
        Err(e) => Termination::Error(format!("waiting for process failed: {e}")),
    };

    match timeout(shared.config.drain_timeout, reader).await {
        Ok(Ok(lines)) => debug!(handle = %id, lines, "process output drained"),
        Ok(Err(e)) => warn!(handle = %id, error = %e, "output reader task failed"),
        Err(_) => warn!(
            handle = %id,
            drain_timeout = ?shared.config.drain_timeout,
            "process exited but its output is still open (orphaned child?); not waiting any longer"
        ),
    }

    shared.exit.send_replace(Some(termination.clone()));

    let published = shared.state.send_if_modified(|state| {
        if *state == ProcessState::Running {
            *state = ProcessState::Terminated(termination.clone());
            true
        } else {
            false
        }
    });

    if published {
        info!(handle = %id, pid = ?shared.pid, outcome = %termination, "process exited");
    } else {
        debug!(handle = %id, outcome = %termination, "process exited during stop sequence");
    }
}

async fn escalate(shared: Arc<Shared>, pid: u32) -> Result<StopOutcome> {
    let id = shared.id;
    let target = ProcessTarget {
        pid,
        tree: shared.config.kill_tree,
    };
    let grace = shared.config.grace_period;

    info!(handle = %id, pid, grace_period = ?grace, "stopping process");

    // Skip signalling a pid that has already been reaped.
    if current_exit(&shared).is_none() {
        if let Err(e) = signal(&shared, target, false).await {
            warn!(handle = %id, pid, error = %e, "graceful termination request failed; waiting out grace period");
        }
    }

    if let Some(termination) = wait_exit(&shared, grace).await {
        info!(handle = %id, pid, outcome = %termination, "process stopped gracefully");
        return Ok(finish(&shared, termination));
    }

    warn!(handle = %id, pid, grace_period = ?grace, "grace period elapsed; escalating to forceful kill");

    if let Err(e) = signal(&shared, target, true).await {
        // The process may have exited on its own between the grace period
        // and the kill; its exit is published once the output is drained.
        if let Some(termination) = wait_exit(&shared, shared.config.kill_timeout).await {
            info!(handle = %id, pid, outcome = %termination, error = %e, "kill failed but process had already exited");
            return Ok(finish(&shared, termination));
        }
        let reason = format!("forceful kill failed: {e}");
        error!(handle = %id, pid, reason = %reason, "process could not be killed");
        finish(&shared, Termination::Error(reason.clone()));
        return Err(SlotrunError::KillEscalation { pid, reason });
    }

    match wait_exit(&shared, shared.config.kill_timeout).await {
        Some(_) => {
            info!(handle = %id, pid, "process killed");
            Ok(finish(&shared, Termination::Killed))
        }
        None => {
            let reason = format!(
                "process still alive {:?} after forceful kill",
                shared.config.kill_timeout
            );
            error!(handle = %id, pid, reason = %reason, "process could not be killed");
            finish(&shared, Termination::Error(reason.clone()));
            Err(SlotrunError::KillEscalation { pid, reason })
        }
    }
}

fn finish(shared: &Shared, termination: Termination) -> StopOutcome {
    shared
        .state
        .send_replace(ProcessState::Terminated(termination.clone()));
    StopOutcome::Stopped(termination)
}

fn current_exit(shared: &Shared) -> Option<Termination> {
    (*shared.exit.borrow()).clone()
}

async fn wait_exit(shared: &Shared, limit: Duration) -> Option<Termination> {
    let mut rx = shared.exit.subscribe();
    match timeout(limit, rx.wait_for(Option::is_some)).await {
        Ok(Ok(exit)) => (*exit).clone(),
        _ => None,
    }
}

async fn signal(shared: &Shared, target: ProcessTarget, force: bool) -> io::Result<()> {
    let strategy = Arc::clone(&shared.strategy);
    tokio::task::spawn_blocking(move || {
        if force {
            strategy.force_kill(target)
        } else {
            strategy.request_graceful(target)
        }
    })
    .await
    .unwrap_or_else(|e| Err(io::Error::other(e)))
}

fn termination_from_status(status: ExitStatus) -> Termination {
    if let Some(code) = status.code() {
        return Termination::Exited(code);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return Termination::Signalled(sig);
        }
    }

    Termination::Error(format!("unrecognised exit status: {status}"))
}
