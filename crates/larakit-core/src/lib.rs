pub mod command;
pub mod config;
pub mod error;
pub mod hooks;
pub mod plugin;

pub use command::{CommandRegistry, RegisteredCommand, TaskCommand};
pub use config::Config;
pub use error::{LarakitError, Result};
pub use hooks::{available_hooks, HookBus, HookCallback, HookPayload, KnownHook};
pub use plugin::{
    validate, DiscoveryReport, FactoryCatalog, InitReport, LoadAttempt, LoadFailure, LoadStatus,
    LogLevel, Persistence, Plugin, PluginContext, PluginManifest, PluginRegistry, PluginSystem,
    RegistryEntry, ToggleOutcome,
};
