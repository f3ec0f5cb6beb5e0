// src/exec/side_file.rs

//! Settings side file written before a worker is launched.
//!
//! External workers take no arguments; they read a JSON settings file from
//! a fixed location. The file is updated read-modify-write: keys already in
//! the file but not configured here are preserved.

use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::errors::{Result, SlotrunError};
use crate::fs::FileSystem;

/// Merge `settings` into the JSON object stored at `path` and write it back
/// with 4-space indentation.
///
/// A missing file starts from an empty object. An existing file that is not
/// a JSON object is replaced, with a warning.
pub fn write_side_file(fs: &dyn FileSystem, path: &Path, settings: &Map<String, Value>) -> Result<()> {
    let mut merged = if fs.exists(path) {
        let existing = fs.read_to_string(path)?;
        match serde_json::from_str::<Value>(&existing) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                warn!(path = ?path, "existing side file is not a JSON object; replacing it");
                Map::new()
            }
        }
    } else {
        Map::new()
    };

    for (key, value) in settings {
        merged.insert(key.clone(), value.clone());
    }

    let rendered = to_pretty_json(&Value::Object(merged))?;
    fs.write(path, rendered.as_bytes())?;
    debug!(path = ?path, keys = settings.len(), "wrote settings side file");
    Ok(())
}

fn to_pretty_json(value: &Value) -> Result<String> {
    use serde::Serialize;

    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut ser)?;
    String::from_utf8(out).map_err(|e| SlotrunError::Other(e.into()))
}
