// src/config/mod.rs

//! Configuration loading and validation for slotrun.
//!
//! Responsibilities:
//! - Define the TOML-backed raw model and the validated model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate slots and supervisor timings (`validate.rs`).
//! - Parse duration strings such as `"5s"` (`duration.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{load_and_validate, load_from_path};
pub use model::{
    ConfigFile, RawConfigFile, SlotCommand, SlotConfig, SlotSection, SupervisorSection,
    DEFAULT_POLL_INTERVAL,
};
