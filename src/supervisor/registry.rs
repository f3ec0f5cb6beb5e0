// src/supervisor/registry.rs

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::errors::{Result, SlotrunError};
use crate::exec::termination::{default_strategy, TerminationStrategy};
use crate::exec::LaunchCommand;
use crate::relay::LogLine;
use crate::types::{ProcessState, StopOutcome};

use super::{ProcessHandle, ProcessSupervisor, SupervisorConfig};

/// Process-wide table of slots, each with at most one live process.
///
/// Slots are created on first use. The check-and-start in
/// [`start_in_slot`](Self::start_in_slot) happens under one lock, so two
/// concurrent starts for the same slot cannot both succeed.
#[derive(Debug)]
pub struct SupervisorRegistry {
    config: SupervisorConfig,
    strategy: Arc<dyn TerminationStrategy>,
    slots: Mutex<BTreeMap<String, ProcessSupervisor>>,
}

impl SupervisorRegistry {
    /// Create the registry at application start.
    pub fn init(config: SupervisorConfig) -> Self {
        Self::with_strategy(config, default_strategy())
    }

    pub fn with_strategy(config: SupervisorConfig, strategy: Arc<dyn TerminationStrategy>) -> Self {
        Self {
            config,
            strategy,
            slots: Mutex::new(BTreeMap::new()),
        }
    }

    /// Start `command` in `slot`.
    ///
    /// Fails with [`SlotrunError::SlotBusy`] if the slot still holds a live
    /// process; launch failures are returned as [`SlotrunError::Launch`].
    pub fn start_in_slot(&self, slot: &str, command: LaunchCommand) -> Result<ProcessHandle> {
        let mut slots = self.lock();
        let supervisor = slots
            .entry(slot.to_string())
            .or_insert_with(|| ProcessSupervisor::with_strategy(self.config, Arc::clone(&self.strategy)));

        match supervisor.start(command) {
            Ok(handle) => {
                info!(slot, handle = %handle.id(), pid = ?handle.pid(), "slot started");
                Ok(handle)
            }
            Err(SlotrunError::AlreadyRunning { id }) => {
                debug!(slot, handle = %id, "slot busy; rejecting start");
                Err(SlotrunError::SlotBusy {
                    slot: slot.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Stop whatever runs in `slot`. Unknown, empty and terminated slots
    /// report "nothing to stop".
    ///
    /// The registry lock is not held while waiting for the process.
    pub async fn stop_in_slot(&self, slot: &str) -> Result<StopOutcome> {
        match self.handle(slot) {
            Some(handle) => handle.stop().await,
            None => Ok(StopOutcome::NothingToStop),
        }
    }

    pub fn state_of(&self, slot: &str) -> ProcessState {
        self.lock()
            .get(slot)
            .map_or(ProcessState::Idle, ProcessSupervisor::state)
    }

    /// Current handle of `slot`, live or terminated.
    pub fn handle(&self, slot: &str) -> Option<ProcessHandle> {
        self.lock().get(slot).and_then(|s| s.handle().cloned())
    }

    pub fn drain(&self, slot: &str) -> Vec<LogLine> {
        self.handle(slot).map(|h| h.drain()).unwrap_or_default()
    }

    /// Names of every slot that has been used, in sorted order.
    pub fn slot_names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Stop every live slot concurrently (application exit).
    ///
    /// Returns the outcome per slot that had a handle, in slot order.
    pub async fn teardown(&self) -> Vec<(String, Result<StopOutcome>)> {
        let handles: Vec<(String, ProcessHandle)> = self
            .lock()
            .iter()
            .filter_map(|(name, sup)| sup.handle().map(|h| (name.clone(), h.clone())))
            .collect();

        let live = handles.iter().filter(|(_, h)| h.state().is_active()).count();
        info!(slots = handles.len(), live, "tearing down supervisor registry");

        let mut tasks = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            tasks.push((name, tokio::spawn(async move { handle.stop().await })));
        }

        let mut results = Vec::with_capacity(tasks.len());
        for (name, task) in tasks {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => Err(SlotrunError::Other(e.into())),
            };
            if let Err(e) = &outcome {
                warn!(slot = %name, error = %e, "failed to stop slot during teardown");
            }
            results.push((name, outcome));
        }
        results
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, ProcessSupervisor>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}
