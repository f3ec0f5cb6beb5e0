// src/config/loader.rs

use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;
use crate::fs::{FileSystem, RealFileSystem};

/// Load a configuration file from a given path and return the raw
/// `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    load_with_fs(&RealFileSystem, path.as_ref())
}

/// Like [`load_from_path`], reading through `fs`.
pub fn load_with_fs(fs: &dyn FileSystem, path: &Path) -> Result<RawConfigFile> {
    let contents = fs.read_to_string(path)?;
    let config: RawConfigFile = toml::from_str(&contents)?;
    Ok(config)
}

/// Load a configuration file from path and run validation.
///
/// - Reads TOML.
/// - Applies defaults (durations, `kill_tree`).
/// - Rejects malformed slots and durations.
/// - Anchors relative working directories and program paths at the config
///   file's directory, made absolute.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let raw_config = load_from_path(path)?;
    let config = ConfigFile::try_from(raw_config)?;

    let root = config_root_dir(path);
    let root = if root.as_os_str().is_empty() {
        std::env::current_dir()?
    } else {
        std::path::absolute(&root)?
    };
    Ok(config.resolve_paths(&root))
}

/// Directory that relative paths in the config are resolved against.
///
/// A bare filename like `Slotrun.toml` has an empty parent;
/// [`load_and_validate`] then anchors at the current working directory.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
}
