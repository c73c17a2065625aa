//! Plugin contract
//!
//! A plugin is produced by a factory and initialized exactly once with a
//! [`PluginContext`]. Everything it registers through the context is staged and
//! only becomes visible if `initialize` succeeds.

use std::fmt;

use serde::de::DeserializeOwned;

use crate::command::{check_command_name, CommandRegistry, RegisteredCommand, TaskCommand};
use crate::config::Config;
use crate::error::{LarakitError, Result};
use crate::hooks::{HookBus, HookCallback, HookPayload};

/// Capability surface of a plugin implementation
pub trait Plugin {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Register commands and hooks. Called once, right after construction.
    fn initialize(&mut self, ctx: &mut PluginContext<'_>) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Registration surface handed to [`Plugin::initialize`]
pub struct PluginContext<'a> {
    plugin: String,
    config: &'a Config,
    existing_commands: &'a CommandRegistry,
    hooks: Vec<(String, HookCallback)>,
    commands: Vec<Box<dyn TaskCommand>>,
}

/// Registrations collected during a successful `initialize`
pub(crate) struct StagedRegistrations {
    plugin: String,
    hooks: Vec<(String, HookCallback)>,
    commands: Vec<Box<dyn TaskCommand>>,
}

impl<'a> PluginContext<'a> {
    pub(crate) fn new(
        plugin: &str,
        config: &'a Config,
        existing_commands: &'a CommandRegistry,
    ) -> Self {
        Self {
            plugin: plugin.to_string(),
            config,
            existing_commands,
            hooks: Vec::new(),
            commands: Vec::new(),
        }
    }

    /// Contribute a command. Fails with a configuration error if its name
    /// breaks the naming contract or is taken by another plugin.
    ///
    /// A name this plugin registered on an earlier load is not a collision.
    pub fn register_command<C>(&mut self, command: C) -> Result<()>
    where
        C: TaskCommand + 'static,
    {
        let name = command.name().to_string();
        check_command_name(&name).map_err(|msg| LarakitError::configuration(&self.plugin, msg))?;

        let staged_twice = self.commands.iter().any(|c| c.name() == name);
        let taken = self
            .existing_commands
            .get(&name)
            .is_some_and(|c| c.plugin != self.plugin);
        if staged_twice || taken {
            return Err(LarakitError::configuration(
                &self.plugin,
                format!("command '{}' is already registered", name),
            ));
        }

        self.commands.push(Box::new(command));
        Ok(())
    }

    /// Register a callback on the shared hook bus.
    pub fn register_hook<F>(&mut self, event: impl AsRef<str>, callback: F)
    where
        F: Fn(&HookPayload) -> anyhow::Result<()> + 'static,
    {
        self.hooks
            .push((event.as_ref().to_string(), Box::new(callback)));
    }

    /// Read `plugins.<plugin>.<key>`, falling back to `default` when any
    /// segment is missing or the value does not fit `T`.
    pub fn get_config<T>(&self, key: &str, default: T) -> T
    where
        T: DeserializeOwned,
    {
        let full_key = format!("plugins.{}.{}", self.plugin, key);
        self.config
            .lookup(&full_key)
            .and_then(|value| value.clone().try_into().ok())
            .unwrap_or(default)
    }

    /// Diagnostic sink tagged with the plugin name
    pub fn log(&self, message: &str, level: LogLevel) {
        let plugin = self.plugin.as_str();
        match level {
            LogLevel::Debug => tracing::debug!(plugin, "{}", message),
            LogLevel::Info => tracing::info!(plugin, "{}", message),
            LogLevel::Warning => tracing::warn!(plugin, "{}", message),
            LogLevel::Error => tracing::error!(plugin, "{}", message),
        }
    }

    pub(crate) fn into_staged(self) -> StagedRegistrations {
        StagedRegistrations {
            plugin: self.plugin,
            hooks: self.hooks,
            commands: self.commands,
        }
    }
}

impl StagedRegistrations {
    /// Publish hooks and commands, replacing whatever this plugin registered
    /// on an earlier load. Returns the contributed command names.
    pub(crate) fn commit(self, bus: &mut HookBus, registry: &mut CommandRegistry) -> Vec<String> {
        let stale_hooks = bus.retract_owner(&self.plugin);
        let stale_commands = registry.retract_owner(&self.plugin);
        if stale_hooks + stale_commands > 0 {
            tracing::debug!(
                plugin = %self.plugin,
                hooks = stale_hooks,
                commands = stale_commands,
                "Replacing earlier registrations"
            );
        }

        for (event, callback) in self.hooks {
            bus.register_boxed(&event, Some(self.plugin.clone()), callback);
        }

        let mut names = Vec::with_capacity(self.commands.len());
        for command in self.commands {
            names.push(command.name().to_string());
            registry.push(RegisteredCommand {
                plugin: self.plugin.clone(),
                command,
            });
        }
        names
    }
}
