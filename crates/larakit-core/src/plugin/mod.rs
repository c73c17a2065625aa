//! Plugin Module
//!
//! Discovery, loading and lifecycle of plugins.
//!
//! - `manifest`: `plugin.json` parsing and `enabled` write-back
//! - `registry`: discovered plugins keyed by name
//! - `loader`: entry files and compiled-in factories
//! - `contract`: the `Plugin` trait and its registration context
//! - `system`: the aggregate the CLI constructs at startup
//! - `validate`: structural checks for a plugin directory

pub mod contract;
pub mod loader;
pub mod manifest;
pub mod registry;
pub mod system;
pub mod validate;

// Re-exports
pub use contract::{LogLevel, Plugin, PluginContext};
pub use loader::{FactoryCatalog, PluginFactory, DOC_FILE, ENTRY_FILE};
pub use manifest::{PluginManifest, MANIFEST_FILE};
pub use registry::{
    DiscoveryReport, LoadAttempt, Persistence, PluginRegistry, RegistryEntry, SkippedCandidate,
    ToggleOutcome,
};
pub use system::{InitReport, LoadFailure, LoadStatus, LoadedPlugin, PluginSystem};
pub use validate::validate;
