// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `slotrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "slotrun",
    version,
    about = "Launch plant-scheduling workers, stream their output, stop them safely.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Slotrun.toml")]
    pub config: String,

    /// Slots to run. Defaults to every slot in the config.
    #[arg(value_name = "SLOT")]
    pub slots: Vec<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SLOTRUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the resolved slots, but don't launch anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_slots_and_defaults() {
        let args = CliArgs::try_parse_from(["slotrun", "casting", "furnace-planning"]).unwrap();
        assert_eq!(args.slots, vec!["casting", "furnace-planning"]);
        assert_eq!(args.config, "Slotrun.toml");
        assert!(!args.dry_run);
        assert!(args.log_level.is_none());
    }

    #[test]
    fn log_level_flag() {
        let args = CliArgs::try_parse_from(["slotrun", "--log-level", "debug", "--dry-run"]).unwrap();
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
        assert!(args.dry_run);
        assert!(args.slots.is_empty());
    }
}
