//! Plugin Registry
//!
//! In-memory store of discovered manifests keyed by plugin name.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{LarakitError, Result};
use crate::plugin::manifest::PluginManifest;

/// A discovered plugin
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEntry {
    pub manifest: PluginManifest,
    /// Plugin root directory (first search path that declared this name)
    pub path: PathBuf,
    /// In-memory enabled flag; may diverge from disk if persisting failed
    pub enabled: bool,
    pub autoload: bool,
}

impl RegistryEntry {
    fn new(manifest: PluginManifest, path: PathBuf) -> Self {
        Self {
            enabled: manifest.enabled,
            autoload: manifest.autoload,
            manifest,
            path,
        }
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    /// Enabled and autoload: picked up by `initialize`
    pub fn should_autoload(&self) -> bool {
        self.enabled && self.autoload
    }
}

/// Whether an enable/disable reached the manifest file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persistence {
    Persisted,
    Failed(String),
}

/// Load attempted as part of an enable
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoadAttempt {
    /// No load was tried
    #[default]
    Skipped,
    Loaded,
    Failed(String),
}

/// Result of enable/disable: the in-memory flag always changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub name: String,
    pub enabled: bool,
    pub persistence: Persistence,
    pub load: LoadAttempt,
}

impl ToggleOutcome {
    pub fn is_persisted(&self) -> bool {
        self.persistence == Persistence::Persisted
    }
}

/// A plugin directory that discovery could not accept
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedCandidate {
    pub path: PathBuf,
    pub reason: String,
}

/// What a discovery pass found
#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    /// Names inserted by this pass, in discovery order
    pub added: Vec<String>,
    /// Same-name plugins ignored because a higher-priority one already won
    pub shadowed: Vec<(String, PathBuf)>,
    pub skipped: Vec<SkippedCandidate>,
}

/// Registry of discovered plugins, in discovery order
#[derive(Debug, Default)]
pub struct PluginRegistry {
    entries: Vec<RegistryEntry>,
    index: HashMap<String, usize>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan each search path (highest priority first) for plugin subdirectories.
    ///
    /// The first plugin found with a given name wins; later ones are ignored.
    /// Unreadable or nameless manifests are skipped, never fatal.
    pub fn discover(&mut self, search_paths: &[PathBuf]) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();

        for search_path in search_paths {
            if !search_path.is_dir() {
                tracing::debug!("Plugin search path does not exist: {:?}", search_path);
                continue;
            }

            tracing::debug!("Searching for plugins in: {:?}", search_path);
            self.discover_in_path(search_path, &mut report);
        }

        tracing::info!(
            "Discovered {} plugins ({} skipped)",
            report.added.len(),
            report.skipped.len()
        );
        report
    }

    fn discover_in_path(&mut self, search_path: &Path, report: &mut DiscoveryReport) {
        let candidates = WalkDir::new(search_path)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name();

        for entry in candidates {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Error reading {:?}: {}", search_path, e);
                    continue;
                }
            };

            let plugin_root = entry.path();
            if !entry.file_type().is_dir() || !PluginManifest::exists(plugin_root) {
                continue;
            }

            let manifest = match PluginManifest::load(plugin_root) {
                Ok(manifest) => manifest,
                Err(e) => {
                    tracing::warn!("Skipping plugin candidate {:?}: {}", plugin_root, e);
                    report.skipped.push(SkippedCandidate {
                        path: plugin_root.to_path_buf(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            if self.index.contains_key(&manifest.name) {
                tracing::debug!(
                    "Plugin '{}' at {:?} shadowed by an earlier search path",
                    manifest.name,
                    plugin_root
                );
                report
                    .shadowed
                    .push((manifest.name, plugin_root.to_path_buf()));
                continue;
            }

            report.added.push(manifest.name.clone());
            self.insert(RegistryEntry::new(manifest, plugin_root.to_path_buf()));
        }
    }

    fn insert(&mut self, entry: RegistryEntry) {
        self.index
            .insert(entry.name().to_string(), self.entries.len());
        self.entries.push(entry);
    }

    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All entries in discovery order
    pub fn list(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn enable(&mut self, name: &str) -> Result<ToggleOutcome> {
        self.set_enabled(name, true)
    }

    pub fn disable(&mut self, name: &str) -> Result<ToggleOutcome> {
        self.set_enabled(name, false)
    }

    fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<ToggleOutcome> {
        let &i = self
            .index
            .get(name)
            .ok_or_else(|| LarakitError::PluginNotFound {
                name: name.to_string(),
            })?;

        let entry = &mut self.entries[i];
        entry.enabled = enabled;

        let persistence = match PluginManifest::write_enabled(&entry.path, enabled) {
            Ok(()) => {
                entry.manifest.enabled = enabled;
                Persistence::Persisted
            }
            Err(e) => {
                tracing::warn!("Could not persist enabled={} for '{}': {}", enabled, name, e);
                Persistence::Failed(e.to_string())
            }
        };

        Ok(ToggleOutcome {
            name: name.to_string(),
            enabled,
            persistence,
            load: LoadAttempt::Skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::manifest::MANIFEST_FILE;
    use std::fs;
    use tempfile::TempDir;

    fn write_plugin(root: &Path, dir: &str, manifest: &str) -> PathBuf {
        let plugin_dir = root.join(dir);
        fs::create_dir_all(&plugin_dir).unwrap();
        fs::write(plugin_dir.join(MANIFEST_FILE), manifest).unwrap();
        plugin_dir
    }

    #[test]
    fn test_discover_first_search_path_wins() {
        let local = TempDir::new().unwrap();
        let global = TempDir::new().unwrap();
        let local_dir = write_plugin(local.path(), "alpha", r#"{"name": "alpha"}"#);
        write_plugin(global.path(), "alpha-copy", r#"{"name": "alpha"}"#);

        let mut registry = PluginRegistry::new();
        let report = registry.discover(&[
            local.path().to_path_buf(),
            global.path().to_path_buf(),
        ]);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("alpha").unwrap().path, local_dir);
        assert_eq!(report.shadowed.len(), 1);
    }

    #[test]
    fn test_discover_skips_bad_manifests() {
        let root = TempDir::new().unwrap();
        write_plugin(root.path(), "good", r#"{"name": "good"}"#);
        write_plugin(root.path(), "nameless", r#"{"version": "1.0.0"}"#);
        write_plugin(root.path(), "broken", "{ nope");
        fs::create_dir_all(root.path().join("no-manifest")).unwrap();
        fs::write(root.path().join("stray.txt"), "x").unwrap();

        let mut registry = PluginRegistry::new();
        let report = registry.discover(&[root.path().to_path_buf()]);

        assert_eq!(registry.len(), 1);
        assert!(registry.contains("good"));
        assert_eq!(report.skipped.len(), 2);
    }

    #[test]
    fn test_discover_missing_search_path() {
        let mut registry = PluginRegistry::new();
        let report = registry.discover(&[PathBuf::from("/nonexistent/larakit/plugins")]);
        assert!(registry.is_empty());
        assert!(report.added.is_empty());
    }

    #[test]
    fn test_discovery_order_is_stable() {
        let root = TempDir::new().unwrap();
        write_plugin(root.path(), "b-plugin", r#"{"name": "bravo"}"#);
        write_plugin(root.path(), "a-plugin", r#"{"name": "alpha"}"#);

        let mut registry = PluginRegistry::new();
        registry.discover(&[root.path().to_path_buf()]);

        let names: Vec<&str> = registry.list().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["alpha", "bravo"]);
    }

    #[test]
    fn test_enable_disable_round_trip() {
        let root = TempDir::new().unwrap();
        let dir = write_plugin(root.path(), "p", r#"{"name": "p", "enabled": false}"#);

        let mut registry = PluginRegistry::new();
        registry.discover(&[root.path().to_path_buf()]);
        assert!(!registry.get("p").unwrap().enabled);

        assert!(registry.enable("p").unwrap().is_persisted());
        registry.disable("p").unwrap();
        let outcome = registry.enable("p").unwrap();

        assert!(outcome.enabled);
        assert!(registry.get("p").unwrap().enabled);
        assert_eq!(registry.list().len(), 1);
        assert!(PluginManifest::load(&dir).unwrap().enabled);
    }

    #[test]
    fn test_toggle_unknown_plugin() {
        let mut registry = PluginRegistry::new();
        assert!(matches!(
            registry.enable("ghost"),
            Err(LarakitError::PluginNotFound { .. })
        ));
    }

    #[test]
    fn test_persistence_failure_still_changes_memory() {
        let root = TempDir::new().unwrap();
        let dir = write_plugin(root.path(), "p", r#"{"name": "p"}"#);

        let mut registry = PluginRegistry::new();
        registry.discover(&[root.path().to_path_buf()]);
        fs::remove_file(dir.join(MANIFEST_FILE)).unwrap();

        let outcome = registry.disable("p").unwrap();
        assert!(matches!(outcome.persistence, Persistence::Failed(_)));
        assert!(!registry.get("p").unwrap().enabled);
    }
}
