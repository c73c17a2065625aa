use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LarakitError {
    #[error("Plugin not found: {name}")]
    PluginNotFound { name: String },

    #[error("Entry file missing for plugin '{name}': {path}")]
    EntryMissing { name: String, path: PathBuf },

    #[error("No factory registered for symbol '{symbol}' (plugin '{name}')")]
    FactoryNotFound { name: String, symbol: String },

    #[error("Factory for '{expected}' produced plugin named '{actual}'")]
    IdentityMismatch { expected: String, actual: String },

    #[error("Invalid manifest {path}: {message}")]
    InvalidManifest { path: PathBuf, message: String },

    #[error("Configuration error in plugin '{plugin}': {message}")]
    Configuration { plugin: String, message: String },

    #[error("Hook '{event}' failed: {source}")]
    Hook {
        event: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Command not found: {name}")]
    CommandNotFound { name: String },

    #[error("Command '{name}' failed: {source}")]
    CommandFailed {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Config parse error in {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("Config key not found: {key}")]
    ConfigKeyNotFound { key: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, LarakitError>;

impl LarakitError {
    pub fn configuration(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::PluginNotFound { .. } => 2,
            Self::CommandNotFound { .. } => 3,
            Self::Hook { .. } => 4,
            Self::CommandFailed { .. } => 5,
            Self::Configuration { .. } | Self::ConfigKeyNotFound { .. } => 6,
            _ => 1,
        }
    }
}
