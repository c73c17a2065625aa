use std::fs;
use std::path::{Path, PathBuf};

use toml::{Table, Value};

use crate::error::{LarakitError, Result};

const CONFIG_FILE: &str = "config.toml";

/// Default config template with rich comments
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# larakit configuration file
# Location: ~/.larakit/config.toml

[project]
# PHP binary used for artisan and composer tasks
# Default: "php"
php = "php"

[plugins]
# Per-plugin settings live under [plugins.<plugin-name>] and are read by
# plugins through their scoped config accessor.
#
# Example:
# [plugins.task-timer]
# warn_after_ms = 2000
"#;

/// Hierarchical key-value configuration backed by a TOML table.
///
/// Keys are addressed with dot notation (`plugins.task-timer.warn_after_ms`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    root: Table,
}

impl Config {
    /// Load config from base directory. A missing file yields an empty config.
    pub fn load(base_dir: &Path) -> Result<Self> {
        let path = base_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let root: Table = toml::from_str(&content).map_err(|e| LarakitError::ConfigParse {
            path: path.clone(),
            message: e.to_string(),
        })?;

        Ok(Self { root })
    }

    /// Build a config from an in-memory TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(Self {
            root: toml::from_str(content)?,
        })
    }

    /// Save config to base directory
    pub fn save(&self, base_dir: &Path) -> Result<()> {
        let path = base_dir.join(CONFIG_FILE);
        fs::create_dir_all(base_dir)?;

        let content = toml::to_string_pretty(&self.root)?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// Get config file path
    pub fn path(base_dir: &Path) -> PathBuf {
        base_dir.join(CONFIG_FILE)
    }

    /// Initialize config with default template (rich comments)
    pub fn init(base_dir: &Path) -> Result<PathBuf> {
        let path = base_dir.join(CONFIG_FILE);
        fs::create_dir_all(base_dir)?;

        if !path.exists() {
            fs::write(&path, DEFAULT_CONFIG_TEMPLATE)?;
        }

        Ok(path)
    }

    /// Resolve a dotted key. Returns `None` if any segment is absent or
    /// an intermediate value is not a table.
    pub fn lookup(&self, key: &str) -> Option<&Value> {
        let mut segments = key.split('.');
        let first = segments.next()?;
        let mut current = self.root.get(first)?;

        for segment in segments {
            current = current.as_table()?.get(segment)?;
        }

        Some(current)
    }

    /// Get a config value by dot-notation key, rendered for display
    pub fn get(&self, key: &str) -> Option<String> {
        self.lookup(key).map(render_value)
    }

    /// Set a config value by dot-notation key, creating intermediate tables.
    ///
    /// The value is parsed as a TOML literal (`42`, `true`, `["a"]`) and
    /// falls back to a plain string.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let segments: Vec<&str> = key.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(LarakitError::ConfigKeyNotFound {
                key: key.to_string(),
            });
        }

        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| LarakitError::ConfigKeyNotFound {
                key: key.to_string(),
            })?;

        let mut table = &mut self.root;
        for segment in parents {
            let entry = table
                .entry(segment.to_string())
                .or_insert(Value::Table(Table::new()));
            table = match entry {
                Value::Table(t) => t,
                _ => {
                    return Err(LarakitError::ConfigKeyNotFound {
                        key: key.to_string(),
                    })
                }
            };
        }

        table.insert(last.to_string(), parse_value(value));
        Ok(())
    }

    /// List all leaf keys with their current values
    pub fn list(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        flatten("", &self.root, &mut out);
        out
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    toml::from_str::<Table>(&format!("v = {}", trimmed))
        .ok()
        .and_then(|mut t| t.remove("v"))
        .unwrap_or_else(|| Value::String(trimmed.to_string()))
}

fn flatten(prefix: &str, table: &Table, out: &mut Vec<(String, String)>) {
    for (key, value) in table {
        let full = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        match value {
            Value::Table(inner) => flatten(&full, inner, out),
            other => out.push((full, render_value(other))),
        }
    }
}
