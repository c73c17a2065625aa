//! Plugin manifest parsing for `plugin.json`

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LarakitError, Result};

/// Manifest file name inside a plugin root
pub const MANIFEST_FILE: &str = "plugin.json";

/// Static description of a plugin
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Plugin name (required, unique across the registry)
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub author: Option<String>,

    #[serde(default)]
    pub license: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Load automatically at startup when also enabled
    #[serde(default = "default_true")]
    pub autoload: bool,

    /// Dependency name -> version constraint. Informational only.
    #[serde(default)]
    pub requires: BTreeMap<String, String>,

    /// Declared command identifiers. Informational only.
    #[serde(default)]
    pub commands: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl PluginManifest {
    /// Path of the manifest file for a plugin root
    pub fn path_in(plugin_root: &Path) -> PathBuf {
        plugin_root.join(MANIFEST_FILE)
    }

    /// Check if a manifest exists in the plugin root
    pub fn exists(plugin_root: &Path) -> bool {
        Self::path_in(plugin_root).is_file()
    }

    /// Parse manifest content. A missing or blank `name` is rejected.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let manifest: PluginManifest =
            serde_json::from_str(content).map_err(|e| LarakitError::InvalidManifest {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        if manifest.name.trim().is_empty() {
            return Err(LarakitError::InvalidManifest {
                path: path.to_path_buf(),
                message: "missing required field 'name'".to_string(),
            });
        }

        Ok(manifest)
    }

    /// Load the manifest from a plugin root
    pub fn load(plugin_root: &Path) -> Result<Self> {
        let path = Self::path_in(plugin_root);
        let content = fs::read_to_string(&path)?;
        Self::parse(&content, &path)
    }

    /// Rewrite only the `enabled` field, keeping every other key as written.
    pub fn write_enabled(plugin_root: &Path, enabled: bool) -> Result<()> {
        let path = Self::path_in(plugin_root);
        let content = fs::read_to_string(&path)?;
        let mut doc: serde_json::Value = serde_json::from_str(&content)?;

        let object = doc
            .as_object_mut()
            .ok_or_else(|| LarakitError::InvalidManifest {
                path: path.clone(),
                message: "manifest is not a JSON object".to_string(),
            })?;
        object.insert("enabled".to_string(), serde_json::Value::Bool(enabled));

        let mut out = serde_json::to_string_pretty(&doc)?;
        out.push('\n');
        fs::write(&path, out)?;
        Ok(())
    }
}
