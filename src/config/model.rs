// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::errors::SlotrunError;
use crate::exec::LaunchCommand;
use crate::supervisor::SupervisorConfig;

use super::validate;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [supervisor]
/// grace_period = "5s"
/// poll_interval = "100ms"
///
/// [slot.furnace-planning]
/// program = "./furnacePlan.exe"
/// settings_file = "furnaceSetting.json"
///
/// [slot.furnace-planning.settings]
/// timeLimit = "60"
///
/// [slot.casting]
/// cmd = "main.exe"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    /// Stop-sequence timing from `[supervisor]`.
    #[serde(default)]
    pub supervisor: SupervisorSection,

    /// All slots from `[slot.<name>]`.
    #[serde(default)]
    pub slot: BTreeMap<String, SlotSection>,
}

/// `[supervisor]` section. Durations use `ms`, `s`, `m` or `h` suffixes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SupervisorSection {
    #[serde(default)]
    pub grace_period: Option<String>,
    #[serde(default)]
    pub kill_timeout: Option<String>,
    #[serde(default)]
    pub drain_timeout: Option<String>,
    #[serde(default)]
    pub poll_interval: Option<String>,
    #[serde(default)]
    pub kill_tree: Option<bool>,
}

/// `[slot.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlotSection {
    /// Shell command line. Mutually exclusive with `program`.
    #[serde(default)]
    pub cmd: Option<String>,

    /// Executable run directly, without a shell.
    #[serde(default)]
    pub program: Option<String>,

    /// Arguments for `program`.
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory, relative to the config file's directory.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// JSON side file the worker reads, relative to the working directory.
    #[serde(default)]
    pub settings_file: Option<PathBuf>,

    /// Keys merged into `settings_file` before each launch.
    #[serde(default)]
    pub settings: Option<toml::Table>,
}

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub supervisor: SupervisorConfig,
    /// How often observers drain relays and check slot states.
    pub poll_interval: Duration,
    pub slots: BTreeMap<String, SlotConfig>,
}

/// How a slot's worker is launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotCommand {
    Shell(String),
    /// `program` is either a bare name looked up on `PATH` or a path,
    /// which [`ConfigFile::resolve_paths`] anchors at the config directory.
    Program { program: PathBuf, args: Vec<String> },
}

/// One validated slot.
#[derive(Debug, Clone)]
pub struct SlotConfig {
    pub name: String,
    pub command: SlotCommand,
    pub working_dir: Option<PathBuf>,
    pub settings_file: Option<PathBuf>,
    pub settings: Map<String, Value>,
}

impl SlotConfig {
    pub fn launch_command(&self) -> LaunchCommand {
        let launch = match &self.command {
            SlotCommand::Shell(line) => LaunchCommand::shell(line.clone()),
            SlotCommand::Program { program, args } => LaunchCommand::new(program).args(args),
        };
        match &self.working_dir {
            Some(dir) => launch.current_dir(dir),
            None => launch,
        }
    }

    /// Side file path as the worker sees it (relative to its working dir).
    pub fn resolved_settings_file(&self) -> Option<PathBuf> {
        let file = self.settings_file.as_ref()?;
        Some(match &self.working_dir {
            Some(dir) if file.is_relative() => dir.join(file),
            _ => file.clone(),
        })
    }
}

impl ConfigFile {
    /// Anchor relative working directories and program paths at `base`
    /// (normally the config file's directory).
    ///
    /// Bare program names like `sleep` are left for `PATH` lookup. A
    /// relative program path is never handed to the OS together with a
    /// working directory, since platforms disagree on which one it is
    /// resolved against.
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        if base.as_os_str().is_empty() {
            return self;
        }
        for slot in self.slots.values_mut() {
            slot.working_dir = Some(match slot.working_dir.take() {
                Some(dir) if dir.is_relative() => base.join(dir),
                Some(dir) => dir,
                None => base.to_path_buf(),
            });
            if let SlotCommand::Program { program, .. } = &mut slot.command {
                if is_relative_path(program) {
                    let rel = program.strip_prefix(".").unwrap_or(program.as_path());
                    *program = base.join(rel);
                }
            }
        }
        self
    }
}

/// `./bin/plan.exe` or `bin/plan.exe`, as opposed to a bare `plan.exe`.
fn is_relative_path(program: &Path) -> bool {
    program.is_relative() && program.components().count() > 1
}

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = SlotrunError;

    fn try_from(raw: RawConfigFile) -> Result<Self, Self::Error> {
        if raw.slot.is_empty() {
            return Err(SlotrunError::ConfigError(
                "config must contain at least one [slot.<name>] section".to_string(),
            ));
        }

        let (supervisor, poll_interval) = validate::supervisor_section(&raw.supervisor)?;

        let mut slots = BTreeMap::new();
        for (name, section) in raw.slot {
            let slot = validate::slot_section(&name, section)?;
            slots.insert(name, slot);
        }

        Ok(ConfigFile {
            supervisor,
            poll_interval,
            slots,
        })
    }
}
