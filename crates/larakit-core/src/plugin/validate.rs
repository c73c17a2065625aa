//! Structural checks for a plugin directory, independent of discovery.

use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::plugin::loader::{entry_path, parse_entry, DOC_FILE, ENTRY_FILE};
use crate::plugin::manifest::{PluginManifest, MANIFEST_FILE};

const REQUIRED_FIELDS: &[&str] = &["name", "version", "description"];

/// Prefix for findings that do not make the plugin unusable
pub const WARNING_PREFIX: &str = "Warning: ";

/// Report problems with the plugin at `path`. An empty list means none were found.
///
/// Incomplete plugins are reported on, never rejected; a missing documentation
/// file is listed with a [`WARNING_PREFIX`].
pub fn validate(path: &Path) -> Vec<String> {
    let mut errors = Vec::new();

    if !path.is_dir() {
        errors.push(format!("Plugin directory not found: {}", path.display()));
        return errors;
    }

    check_manifest(path, &mut errors);
    check_entry(path, &mut errors);

    if !path.join(DOC_FILE).is_file() {
        errors.push(format!(
            "{}Missing documentation file: {}",
            WARNING_PREFIX, DOC_FILE
        ));
    }

    errors
}

/// True when every finding is a warning
pub fn is_warning(message: &str) -> bool {
    message.starts_with(WARNING_PREFIX)
}

fn check_manifest(path: &Path, errors: &mut Vec<String>) {
    let manifest_path = PluginManifest::path_in(path);
    if !manifest_path.is_file() {
        errors.push(format!("Missing manifest file: {}", MANIFEST_FILE));
        return;
    }

    let content = match fs::read_to_string(&manifest_path) {
        Ok(content) => content,
        Err(e) => {
            errors.push(format!("Cannot read {}: {}", MANIFEST_FILE, e));
            return;
        }
    };

    let doc: Value = match serde_json::from_str(&content) {
        Ok(doc) => doc,
        Err(e) => {
            errors.push(format!("Invalid {}: {}", MANIFEST_FILE, e));
            return;
        }
    };

    for field in REQUIRED_FIELDS {
        let present = doc
            .get(field)
            .and_then(Value::as_str)
            .is_some_and(|s| !s.trim().is_empty());
        if !present {
            errors.push(format!(
                "Missing required field in {}: {}",
                MANIFEST_FILE, field
            ));
        }
    }
}

fn check_entry(path: &Path, errors: &mut Vec<String>) {
    let entry = entry_path(path);
    if !entry.is_file() {
        errors.push(format!("Missing entry file: {}", ENTRY_FILE));
        return;
    }

    match fs::read_to_string(&entry) {
        Ok(content) => {
            if let Err(e) = parse_entry(&content) {
                errors.push(format!("Invalid {}: {}", ENTRY_FILE, e));
            }
        }
        Err(e) => errors.push(format!("Cannot read {}: {}", ENTRY_FILE, e)),
    }
}
