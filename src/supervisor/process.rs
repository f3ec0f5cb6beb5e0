// src/supervisor/process.rs

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::errors::{Result, SlotrunError};
use crate::exec::termination::{default_strategy, TerminationStrategy};
use crate::exec::LaunchCommand;
use crate::relay::LogLine;
use crate::types::{ProcessState, StopOutcome};

use super::handle::{FailedLaunch, ProcessHandle};
use super::SupervisorConfig;

/// Owns the lifecycle of one external worker.
///
/// At most one handle is live at a time. Starting again after the previous
/// handle terminated discards it and creates a fresh one.
#[derive(Debug)]
pub struct ProcessSupervisor {
    config: SupervisorConfig,
    strategy: Arc<dyn TerminationStrategy>,
    current: Option<ProcessHandle>,
}

impl ProcessSupervisor {
    /// Supervisor using the host platform's termination strategy.
    pub fn new(config: SupervisorConfig) -> Self {
        Self::with_strategy(config, default_strategy())
    }

    pub fn with_strategy(config: SupervisorConfig, strategy: Arc<dyn TerminationStrategy>) -> Self {
        Self {
            config,
            strategy,
            current: None,
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// `Idle` until the first start, then the current handle's state.
    pub fn state(&self) -> ProcessState {
        self.current
            .as_ref()
            .map_or(ProcessState::Idle, ProcessHandle::state)
    }

    pub fn handle(&self) -> Option<&ProcessHandle> {
        self.current.as_ref()
    }

    /// State change notifications for the current handle, if any.
    pub fn subscribe(&self) -> Option<watch::Receiver<ProcessState>> {
        self.current.as_ref().map(ProcessHandle::subscribe)
    }

    /// Launch `command` as a new handle.
    ///
    /// Rejected with [`SlotrunError::AlreadyRunning`] while the current
    /// handle is starting, running or stopping; the live handle is left
    /// untouched. A spawn failure returns [`SlotrunError::Launch`] and
    /// leaves the new handle in `Terminated(Error)`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&mut self, command: LaunchCommand) -> Result<ProcessHandle> {
        if let Some(current) = &self.current {
            if current.state().is_active() {
                return Err(SlotrunError::AlreadyRunning { id: current.id() });
            }
            debug!(previous = %current.id(), "discarding terminated handle");
        }

        match ProcessHandle::launch(command, self.config, Arc::clone(&self.strategy)) {
            Ok(handle) => {
                self.current = Some(handle.clone());
                Ok(handle)
            }
            Err(FailedLaunch { handle, error }) => {
                self.current = Some(handle);
                Err(error)
            }
        }
    }

    /// Stop the current handle. "Nothing to stop" when there is no running
    /// process.
    pub async fn stop(&self) -> Result<StopOutcome> {
        match &self.current {
            Some(handle) => handle.stop().await,
            None => Ok(StopOutcome::NothingToStop),
        }
    }

    /// Output lines of the current handle since the last drain.
    pub fn drain(&self) -> Vec<LogLine> {
        self.current
            .as_ref()
            .map(ProcessHandle::drain)
            .unwrap_or_default()
    }
}
