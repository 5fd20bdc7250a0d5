//! Configuration loading with drop-in overlay fragments.
//!
//! The base document is read first, then every `*.toml` / `*.json` file in
//! the overlay directory in file-name order. Objects merge key by key;
//! arrays and scalars from a later fragment replace earlier values.

use std::path::Path;

use serde_json::Value;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::WatchConfig;
use crate::error::{ConfigError, ConfigResult};
use crate::validate::validate;

/// Load, merge, and validate the watcher configuration.
pub fn load_config(base: &Path, overlay_dir: Option<&Path>) -> ConfigResult<WatchConfig> {
    let mut document = read_document(base)?;

    if let Some(dir) = overlay_dir {
        for fragment in overlay_fragments(dir)? {
            debug!(path = ?fragment, "merging config fragment");
            let overlay = read_document(&fragment)?;
            merge(&mut document, overlay);
        }
    }

    let config: WatchConfig =
        serde_json::from_value(document).map_err(|e| ConfigError::Parse {
            path: base.to_path_buf(),
            message: e.to_string(),
        })?;
    validate(&config)?;

    debug!(services = config.services.len(), "configuration loaded");
    Ok(config)
}

/// Parse one document into a JSON value according to its extension.
fn read_document(path: &Path) -> ConfigResult<Value> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let parse_err = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };

    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str::<Value>(&content).map_err(|e| parse_err(e.to_string())),
        Some("json") => {
            serde_json::from_str::<Value>(&content).map_err(|e| parse_err(e.to_string()))
        }
        _ => Err(ConfigError::Format(path.to_path_buf())),
    }
}

/// Overlay files directly inside `dir`, sorted by file name.
///
/// A missing directory means no overlays.
fn overlay_fragments(dir: &Path) -> ConfigResult<Vec<std::path::PathBuf>> {
    if !dir.exists() {
        debug!(?dir, "overlay directory absent, skipping");
        return Ok(Vec::new());
    }

    let mut fragments = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| ConfigError::Read {
            path: dir.to_path_buf(),
            source: e.into(),
        })?;
        let path = entry.path();
        let is_fragment = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("toml" | "json")
        );
        if entry.file_type().is_file() && is_fragment {
            fragments.push(path.to_path_buf());
        }
    }
    Ok(fragments)
}

/// Deep-merge `overlay` into `base`.
fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}
