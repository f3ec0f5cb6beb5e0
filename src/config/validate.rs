// src/config/validate.rs

use std::time::Duration;

use serde_json::{Map, Number, Value};
use tracing::warn;

use crate::errors::{Result, SlotrunError};
use crate::supervisor::SupervisorConfig;

use super::duration::parse_duration;
use super::model::{SlotCommand, SlotConfig, SlotSection, SupervisorSection, DEFAULT_POLL_INTERVAL};

/// Validate `[supervisor]`, filling in defaults.
///
/// Checks that every duration parses and that `poll_interval` is non-zero.
pub fn supervisor_section(section: &SupervisorSection) -> Result<(SupervisorConfig, Duration)> {
    let defaults = SupervisorConfig::default();

    let config = SupervisorConfig {
        grace_period: duration_field("grace_period", &section.grace_period, defaults.grace_period)?,
        kill_timeout: duration_field("kill_timeout", &section.kill_timeout, defaults.kill_timeout)?,
        drain_timeout: duration_field("drain_timeout", &section.drain_timeout, defaults.drain_timeout)?,
        kill_tree: section.kill_tree.unwrap_or(defaults.kill_tree),
    };

    let poll_interval = duration_field("poll_interval", &section.poll_interval, DEFAULT_POLL_INTERVAL)?;
    if poll_interval.is_zero() {
        return Err(SlotrunError::ConfigError(
            "[supervisor].poll_interval must be greater than zero".to_string(),
        ));
    }

    if config.kill_timeout <= config.drain_timeout {
        warn!(
            kill_timeout = ?config.kill_timeout,
            drain_timeout = ?config.drain_timeout,
            "kill_timeout does not exceed drain_timeout; a killed worker with orphaned children may be reported as unkillable"
        );
    }

    Ok((config, poll_interval))
}

fn duration_field(name: &str, value: &Option<String>, default: Duration) -> Result<Duration> {
    match value {
        Some(s) => parse_duration(s)
            .map_err(|e| SlotrunError::ConfigError(format!("invalid [supervisor].{name}: {e}"))),
        None => Ok(default),
    }
}

/// Validate one `[slot.<name>]` section.
///
/// Checks:
/// - exactly one of `cmd` / `program`, and it is non-empty
/// - `args` only together with `program`
/// - `settings` only together with `settings_file`
pub fn slot_section(name: &str, section: SlotSection) -> Result<SlotConfig> {
    if name.trim().is_empty() {
        return Err(SlotrunError::ConfigError("slot names must not be empty".to_string()));
    }

    let command = match (section.cmd, section.program) {
        (Some(_), Some(_)) => {
            return Err(slot_error(name, "sets both `cmd` and `program`; pick one"));
        }
        (None, None) => {
            return Err(slot_error(name, "needs either `cmd` or `program`"));
        }
        (Some(cmd), None) => {
            if !section.args.is_empty() {
                return Err(slot_error(name, "`args` can only be used with `program`"));
            }
            if cmd.trim().is_empty() {
                return Err(slot_error(name, "has an empty `cmd`"));
            }
            SlotCommand::Shell(cmd)
        }
        (None, Some(program)) => {
            if program.trim().is_empty() {
                return Err(slot_error(name, "has an empty `program`"));
            }
            SlotCommand::Program {
                program: program.into(),
                args: section.args,
            }
        }
    };

    let settings = match section.settings {
        Some(table) => {
            if section.settings_file.is_none() {
                return Err(slot_error(name, "has `settings` but no `settings_file`"));
            }
            settings_table(name, table)?
        }
        None => Default::default(),
    };

    Ok(SlotConfig {
        name: name.to_string(),
        command,
        working_dir: section.working_dir,
        settings_file: section.settings_file,
        settings,
    })
}

/// Convert `[slot.<name>.settings]` to JSON for the side file.
///
/// TOML datetimes become their RFC 3339 text; non-finite floats have no
/// JSON form and are rejected.
fn settings_table(name: &str, table: toml::Table) -> Result<Map<String, Value>> {
    table
        .into_iter()
        .map(|(key, value)| {
            let value = settings_value(name, &key, value)?;
            Ok((key, value))
        })
        .collect()
}

fn settings_value(name: &str, key: &str, value: toml::Value) -> Result<Value> {
    Ok(match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => Number::from_f64(f).map(Value::Number).ok_or_else(|| {
            slot_error(name, &format!("setting `{key}` = {f} has no JSON representation"))
        })?,
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| settings_value(name, key, item))
                .collect::<Result<_>>()?,
        ),
        toml::Value::Table(table) => Value::Object(settings_table(name, table)?),
    })
}

fn slot_error(name: &str, msg: &str) -> SlotrunError {
    SlotrunError::ConfigError(format!("slot '{name}' {msg}"))
}
