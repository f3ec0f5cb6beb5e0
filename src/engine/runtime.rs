// src/engine/runtime.rs

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::{ConfigFile, SlotConfig};
use crate::errors::{Result, SlotrunError};
use crate::exec::write_side_file;
use crate::fs::{FileSystem, RealFileSystem};
use crate::supervisor::SupervisorRegistry;
use crate::types::{ProcessState, StopOutcome, Termination};

/// Final outcome of every slot the runtime was asked to run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub outcomes: BTreeMap<String, Termination>,
}

impl RunSummary {
    /// True when every slot exited with code 0.
    pub fn success(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.values().all(Termination::is_success)
    }
}

/// Observer loop around a [`SupervisorRegistry`].
///
/// Starts the selected slots, then every `poll_interval`:
/// - drains each slot's relay and writes `[slot] line` to `out`
/// - stops once every slot is terminal and its output is fully drained
///
/// When `shutdown` resolves first, every live slot is torn down.
pub struct Runtime<W: Write> {
    registry: Arc<SupervisorRegistry>,
    slots: Vec<SlotConfig>,
    poll_interval: Duration,
    fs: Arc<dyn FileSystem>,
    out: W,
}

impl<W: Write> fmt::Debug for Runtime<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("slots", &self.slots.iter().map(|s| &s.name).collect::<Vec<_>>())
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl<W: Write> Runtime<W> {
    /// Build a runtime for `selected` slots (all configured slots when
    /// empty). Unknown slot names are a configuration error.
    pub fn new(config: &ConfigFile, selected: &[String], out: W) -> Result<Self> {
        let slots = select_slots(config, selected)?;
        Ok(Self {
            registry: Arc::new(SupervisorRegistry::init(config.supervisor)),
            slots,
            poll_interval: config.poll_interval,
            fs: Arc::new(RealFileSystem),
            out,
        })
    }

    /// Use `registry` instead of a fresh one (tests inject strategies here).
    pub fn with_registry(mut self, registry: Arc<SupervisorRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_fs(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn registry(&self) -> Arc<SupervisorRegistry> {
        Arc::clone(&self.registry)
    }

    /// Run until every slot is terminal or `shutdown` resolves.
    ///
    /// Returns [`SlotrunError::KillEscalation`] if teardown left a process
    /// alive. If writing to `out` fails, every slot is torn down before the
    /// write error is returned.
    pub async fn run<S>(mut self, shutdown: S) -> Result<(RunSummary, W)>
    where
        S: Future<Output = ()>,
    {
        let mut summary = RunSummary::default();

        for slot in &self.slots {
            if let Err(e) = self.launch(slot) {
                error!(slot = %slot.name, error = %e, "failed to start slot");
                summary
                    .outcomes
                    .insert(slot.name.clone(), Termination::Error(e.to_string()));
            }
        }

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut escalation: Option<SlotrunError> = None;
        let mut output_error: Option<SlotrunError> = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Snapshot "done" before draining: a terminal state is
                    // only published after all output reached the relay.
                    let done = self.all_finished();
                    if let Err(e) = self.drain_all() {
                        error!(error = %e, "writing slot output failed; stopping all slots");
                        output_error = Some(e);
                        escalation = self.teardown().await;
                        break;
                    }
                    if done {
                        debug!("all slots finished");
                        break;
                    }
                }
                _ = &mut shutdown => {
                    info!("shutdown requested; stopping all slots");
                    escalation = self.teardown().await;
                    if let Err(e) = self.drain_all() {
                        warn!(error = %e, "writing remaining slot output failed");
                        output_error = Some(e);
                    }
                    break;
                }
            }
        }

        if let Some(e) = output_error {
            return Err(e);
        }

        for slot in &self.slots {
            if summary.outcomes.contains_key(&slot.name) {
                continue;
            }
            let outcome = match self.registry.state_of(&slot.name) {
                ProcessState::Terminated(t) => t,
                other => {
                    warn!(slot = %slot.name, state = %other, "slot still active at exit");
                    Termination::Error(format!("still {other} at exit"))
                }
            };
            summary.outcomes.insert(slot.name.clone(), outcome);
        }

        match escalation {
            Some(e) => Err(e),
            None => Ok((summary, self.out)),
        }
    }

    /// Stop every live slot. Returns the first escalation failure, if any.
    async fn teardown(&self) -> Option<SlotrunError> {
        let mut escalation = None;
        for (slot, outcome) in self.registry.teardown().await {
            match outcome {
                Ok(StopOutcome::Stopped(t)) => info!(slot = %slot, outcome = %t, "slot stopped"),
                Ok(StopOutcome::NothingToStop) => {}
                Err(e) => {
                    error!(slot = %slot, error = %e, "slot could not be stopped; process may be orphaned");
                    if escalation.is_none() {
                        escalation = Some(e);
                    }
                }
            }
        }
        escalation
    }

    fn launch(&self, slot: &SlotConfig) -> Result<()> {
        if let Some(path) = slot.resolved_settings_file() {
            if !slot.settings.is_empty() {
                write_side_file(self.fs.as_ref(), &path, &slot.settings)?;
            }
        }
        self.registry
            .start_in_slot(&slot.name, slot.launch_command())
            .map(|_| ())
    }

    fn all_finished(&self) -> bool {
        self.slots.iter().all(|slot| match self.registry.handle(&slot.name) {
            Some(handle) => handle.state().is_terminal(),
            None => true,
        })
    }

    fn drain_all(&mut self) -> Result<()> {
        for slot in &self.slots {
            for line in self.registry.drain(&slot.name) {
                writeln!(self.out, "[{}] {}", slot.name, line.text)?;
            }
        }
        self.out.flush()?;
        Ok(())
    }
}

fn select_slots(config: &ConfigFile, selected: &[String]) -> Result<Vec<SlotConfig>> {
    if selected.is_empty() {
        return Ok(config.slots.values().cloned().collect());
    }

    let mut slots = Vec::with_capacity(selected.len());
    for name in selected {
        let slot = config.slots.get(name).ok_or_else(|| {
            let known: Vec<&str> = config.slots.keys().map(String::as_str).collect();
            SlotrunError::ConfigError(format!(
                "unknown slot '{name}' (configured: {})",
                known.join(", ")
            ))
        })?;
        if !slots.iter().any(|s: &SlotConfig| s.name == slot.name) {
            slots.push(slot.clone());
        }
    }
    Ok(slots)
}
