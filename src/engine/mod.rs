// src/engine/mod.rs

//! Front-end driver for `slotrun`.
//!
//! Plays the part of the presentation layer: writes settings side files,
//! starts slots through the registry, polls their relays on a fixed
//! interval and tears everything down on shutdown.

pub mod runtime;

pub use runtime::{RunSummary, Runtime};
