//! Hook Bus
//!
//! Maps event names to ordered callback lists. Dispatch is synchronous and runs
//! every callback in registration order. The first failing callback aborts the
//! dispatch and its error is returned to the caller.

use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Value};

use crate::error::{LarakitError, Result};

/// Callback invoked with the dispatched payload
pub type HookCallback = Box<dyn Fn(&HookPayload) -> anyhow::Result<()>>;

/// Well-known hook names. Arbitrary names may still be registered and dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownHook {
    PluginLoaded,
    BeforeCommand,
    AfterCommand,
    ProjectInit,
    BackupCreated,
    MigrationRun,
    TestCompleted,
    DeploymentStarted,
    DeploymentCompleted,
}

impl KnownHook {
    pub const ALL: [KnownHook; 9] = [
        Self::PluginLoaded,
        Self::BeforeCommand,
        Self::AfterCommand,
        Self::ProjectInit,
        Self::BackupCreated,
        Self::MigrationRun,
        Self::TestCompleted,
        Self::DeploymentStarted,
        Self::DeploymentCompleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PluginLoaded => "plugin_loaded",
            Self::BeforeCommand => "before_command",
            Self::AfterCommand => "after_command",
            Self::ProjectInit => "project_init",
            Self::BackupCreated => "backup_created",
            Self::MigrationRun => "migration_run",
            Self::TestCompleted => "test_completed",
            Self::DeploymentStarted => "deployment_started",
            Self::DeploymentCompleted => "deployment_completed",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::PluginLoaded => "Fired after a plugin is loaded",
            Self::BeforeCommand => "Fired before a command executes",
            Self::AfterCommand => "Fired after a command executes",
            Self::ProjectInit => "Fired when a project is initialized",
            Self::BackupCreated => "Fired after a database backup is created",
            Self::MigrationRun => "Fired after migrations run",
            Self::TestCompleted => "Fired after the test suite completes",
            Self::DeploymentStarted => "Fired when a deployment starts",
            Self::DeploymentCompleted => "Fired when a deployment completes",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|h| h.as_str() == name)
    }
}

impl AsRef<str> for KnownHook {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for KnownHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog of well-known hooks with one-line descriptions, in catalog order.
pub fn available_hooks() -> Vec<(&'static str, &'static str)> {
    KnownHook::ALL
        .iter()
        .map(|h| (h.as_str(), h.description()))
        .collect()
}

/// Key-value data passed to hook callbacks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookPayload(Map<String, Value>);

impl HookPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

struct RegisteredHook {
    /// Plugin that registered the callback, if any
    owner: Option<String>,
    callback: HookCallback,
}

/// Process-wide event bus shared by plugins and the command layer
#[derive(Default)]
pub struct HookBus {
    hooks: HashMap<String, Vec<RegisteredHook>>,
}

impl fmt::Debug for HookBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<&str, usize> = self
            .hooks
            .iter()
            .map(|(k, v)| (k.as_str(), v.len()))
            .collect();
        f.debug_struct("HookBus").field("hooks", &counts).finish()
    }
}

impl HookBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a callback for `event`. Registering the same callback twice runs it twice.
    pub fn register<F>(&mut self, event: impl AsRef<str>, callback: F)
    where
        F: Fn(&HookPayload) -> anyhow::Result<()> + 'static,
    {
        self.register_boxed(event.as_ref(), None, Box::new(callback));
    }

    pub(crate) fn register_boxed(
        &mut self,
        event: &str,
        owner: Option<String>,
        callback: HookCallback,
    ) {
        tracing::debug!(event, owner = owner.as_deref(), "Registering hook");
        self.hooks
            .entry(event.to_string())
            .or_default()
            .push(RegisteredHook { owner, callback });
    }

    /// Run every callback for `event` in registration order.
    ///
    /// No listeners is a no-op. A failing callback stops the dispatch.
    pub fn dispatch(&self, event: impl AsRef<str>, payload: &HookPayload) -> Result<()> {
        let event = event.as_ref();
        let Some(hooks) = self.hooks.get(event) else {
            return Ok(());
        };

        tracing::debug!(event, listeners = hooks.len(), "Dispatching hook");
        for registered in hooks {
            (registered.callback)(payload).map_err(|source| LarakitError::Hook {
                event: event.to_string(),
                source,
            })?;
        }

        Ok(())
    }

    /// Number of callbacks registered for `event`
    pub fn listeners(&self, event: impl AsRef<str>) -> usize {
        self.hooks.get(event.as_ref()).map_or(0, Vec::len)
    }

    /// Event names with at least one callback, sorted
    pub fn events(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .hooks
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, _)| k.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Remove every callback registered by `owner`. Returns how many were removed.
    pub fn retract_owner(&mut self, owner: &str) -> usize {
        let mut removed = 0;
        for hooks in self.hooks.values_mut() {
            let before = hooks.len();
            hooks.retain(|h| h.owner.as_deref() != Some(owner));
            removed += before - hooks.len();
        }
        removed
    }
}
