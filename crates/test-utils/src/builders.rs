#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;

use slotrun::config::{ConfigFile, RawConfigFile, SlotSection, SupervisorSection};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                supervisor: SupervisorSection::default(),
                slot: BTreeMap::new(),
            },
        }
    }

    pub fn with_slot(mut self, name: &str, slot: SlotSection) -> Self {
        self.config.slot.insert(name.to_string(), slot);
        self
    }

    pub fn grace_period(mut self, value: &str) -> Self {
        self.config.supervisor.grace_period = Some(value.to_string());
        self
    }

    pub fn poll_interval(mut self, value: &str) -> Self {
        self.config.supervisor.poll_interval = Some(value.to_string());
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `SlotSection`.
pub struct SlotBuilder {
    slot: SlotSection,
}

impl SlotBuilder {
    /// Slot running `cmd` through the shell.
    pub fn shell(cmd: &str) -> Self {
        Self {
            slot: SlotSection {
                cmd: Some(cmd.to_string()),
                ..SlotSection::default()
            },
        }
    }

    /// Slot executing `program` directly.
    pub fn program(program: &str) -> Self {
        Self {
            slot: SlotSection {
                program: Some(program.to_string()),
                ..SlotSection::default()
            },
        }
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.slot.args.push(arg.to_string());
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.slot.working_dir = Some(dir.into());
        self
    }

    pub fn settings_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.slot.settings_file = Some(file.into());
        self
    }

    pub fn setting(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.slot
            .settings
            .get_or_insert_with(toml::Table::new)
            .insert(key.to_string(), value.into());
        self
    }

    pub fn build(self) -> SlotSection {
        self.slot
    }
}
