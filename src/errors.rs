// src/errors.rs

//! Crate-wide error type and `Result` alias.
//!
//! Launch failures and kill-escalation failures are distinct variants so the
//! caller can tell "never started" apart from "could not be stopped". A
//! non-zero exit code is *not* an error; it lives in the terminal
//! [`ProcessState`](crate::types::ProcessState).

use thiserror::Error;

use crate::types::HandleId;

#[derive(Error, Debug)]
pub enum SlotrunError {
    /// The executable could not be spawned (not found, permission denied,
    /// resource exhaustion, bad working directory).
    #[error("failed to launch `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// `start()` was called while the supervisor still owns a live process.
    #[error("process {id} is still running")]
    AlreadyRunning { id: HandleId },

    /// `start_in_slot()` was called while the slot still owns a live process.
    #[error("slot '{slot}' already has an active process")]
    SlotBusy { slot: String },

    /// Graceful stop timed out and the forceful kill failed too. The process
    /// may be orphaned and needs manual intervention.
    #[error("failed to kill process {pid}: {reason}")]
    KillEscalation { pid: u32, reason: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SlotrunError>;
