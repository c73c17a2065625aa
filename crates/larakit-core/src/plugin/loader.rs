//! Entry-file resolution and the factory catalog.
//!
//! Plugins are compiled into the host binary and registered in a
//! [`FactoryCatalog`] under a symbol. A plugin directory's `entry.toml` names
//! the symbol to call; without a `factory` key the manifest name is used.
//!
//! ```toml
//! # plugins/deploy-tools/entry.toml
//! factory = "deploy_tools"
//! ```

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{LarakitError, Result};
use crate::plugin::contract::Plugin;
use crate::plugin::registry::RegistryEntry;

/// Entry file name inside a plugin root
pub const ENTRY_FILE: &str = "entry.toml";

/// Documentation file expected inside a plugin root
pub const DOC_FILE: &str = "README.md";

/// Constructor for one plugin instance
pub type PluginFactory = Box<dyn Fn() -> Box<dyn Plugin>>;

#[derive(Debug, Default, Deserialize)]
struct EntryFile {
    #[serde(default)]
    factory: Option<String>,
}

pub fn entry_path(plugin_root: &Path) -> PathBuf {
    plugin_root.join(ENTRY_FILE)
}

/// Parse entry file content, returning the declared factory symbol if any.
pub fn parse_entry(content: &str) -> Result<Option<String>> {
    let entry: EntryFile = toml::from_str(content)?;
    Ok(entry
        .factory
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

/// Locate the entry file for a discovered plugin and resolve its factory symbol.
pub fn resolve_factory_symbol(entry: &RegistryEntry) -> Result<String> {
    let path = entry_path(&entry.path);
    if !path.is_file() {
        return Err(LarakitError::EntryMissing {
            name: entry.name().to_string(),
            path,
        });
    }

    let content = fs::read_to_string(&path)?;
    let symbol = parse_entry(&content)?.unwrap_or_else(|| entry.name().to_string());
    Ok(symbol)
}

/// Compiled-in plugin constructors keyed by symbol
#[derive(Default)]
pub struct FactoryCatalog {
    factories: HashMap<String, PluginFactory>,
}

impl fmt::Debug for FactoryCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryCatalog")
            .field("symbols", &self.symbols())
            .finish()
    }
}

impl FactoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory. A later registration under the same symbol replaces it.
    pub fn register<F>(&mut self, symbol: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Plugin> + 'static,
    {
        self.factories.insert(symbol.into(), Box::new(factory));
    }

    pub fn get(&self, symbol: &str) -> Option<&PluginFactory> {
        self.factories.get(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.factories.contains_key(symbol)
    }

    /// Registered symbols, sorted
    pub fn symbols(&self) -> Vec<&str> {
        let mut symbols: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        symbols.sort_unstable();
        symbols
    }
}
