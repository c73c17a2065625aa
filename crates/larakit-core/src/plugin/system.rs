//! Plugin System
//!
//! Explicitly constructed aggregate of registry, hook bus, command registry,
//! configuration and factory catalog. The CLI builds one at startup and passes
//! it by reference; tests build a fresh one each.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::command::CommandRegistry;
use crate::config::Config;
use crate::error::{LarakitError, Result};
use crate::hooks::{HookBus, HookPayload, KnownHook};
use crate::plugin::contract::{Plugin, PluginContext};
use crate::plugin::loader::{resolve_factory_symbol, FactoryCatalog};
use crate::plugin::registry::{DiscoveryReport, LoadAttempt, PluginRegistry, ToggleOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Loaded,
    /// Already marked loaded; nothing ran
    AlreadyLoaded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    pub name: String,
    pub error: String,
}

/// Outcome of [`PluginSystem::initialize`]
#[derive(Debug, Clone, Default)]
pub struct InitReport {
    pub discovery: DiscoveryReport,
    pub loaded: Vec<String>,
    pub failed: Vec<LoadFailure>,
}

/// Record that a plugin's factory ran and its registrations were committed
pub struct LoadedPlugin {
    pub plugin: Box<dyn Plugin>,
    pub commands: Vec<String>,
    pub loaded_at: DateTime<Utc>,
}

impl fmt::Debug for LoadedPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedPlugin")
            .field("name", &self.plugin.name())
            .field("version", &self.plugin.version())
            .field("commands", &self.commands)
            .field("loaded_at", &self.loaded_at)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct PluginSystem {
    registry: PluginRegistry,
    hooks: HookBus,
    commands: CommandRegistry,
    config: Config,
    factories: FactoryCatalog,
    loaded: HashMap<String, LoadedPlugin>,
}

impl PluginSystem {
    pub fn new(config: Config, factories: FactoryCatalog) -> Self {
        Self {
            config,
            factories,
            ..Default::default()
        }
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn hooks(&self) -> &HookBus {
        &self.hooks
    }

    /// Mutable bus access for host code registering its own callbacks
    pub fn hooks_mut(&mut self) -> &mut HookBus {
        &mut self.hooks
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn factories_mut(&mut self) -> &mut FactoryCatalog {
        &mut self.factories
    }

    pub fn discover(&mut self, search_paths: &[PathBuf]) -> DiscoveryReport {
        self.registry.discover(search_paths)
    }

    /// Discover plugins, then load every enabled autoload plugin in discovery order.
    ///
    /// A plugin that fails to load is recorded and skipped.
    pub fn initialize(&mut self, search_paths: &[PathBuf]) -> InitReport {
        let discovery = self.discover(search_paths);

        let candidates: Vec<String> = self
            .registry
            .list()
            .iter()
            .filter(|e| e.should_autoload())
            .map(|e| e.name().to_string())
            .collect();

        let mut report = InitReport {
            discovery,
            ..Default::default()
        };

        for name in candidates {
            match self.try_load(&name) {
                Ok(LoadStatus::Loaded) => report.loaded.push(name),
                Ok(LoadStatus::AlreadyLoaded) => {}
                Err(e) => {
                    tracing::warn!("Failed to load plugin {}: {}", name, e);
                    report.failed.push(LoadFailure {
                        name,
                        error: e.to_string(),
                    });
                }
            }
        }

        report
    }

    /// Load a discovered plugin once, returning why it could not be loaded.
    ///
    /// Registrations are committed only if the plugin initializes cleanly. A
    /// failing `plugin_loaded` callback is returned as an error, but the plugin
    /// stays loaded.
    pub fn try_load(&mut self, name: &str) -> Result<LoadStatus> {
        let entry = self
            .registry
            .get(name)
            .ok_or_else(|| LarakitError::PluginNotFound {
                name: name.to_string(),
            })?;

        if self.loaded.contains_key(name) {
            return Ok(LoadStatus::AlreadyLoaded);
        }

        let symbol = resolve_factory_symbol(entry)?;
        let factory = self
            .factories
            .get(&symbol)
            .ok_or_else(|| LarakitError::FactoryNotFound {
                name: name.to_string(),
                symbol: symbol.clone(),
            })?;

        let mut plugin = factory();
        if plugin.name() != name {
            return Err(LarakitError::IdentityMismatch {
                expected: name.to_string(),
                actual: plugin.name().to_string(),
            });
        }

        let mut ctx = PluginContext::new(name, &self.config, &self.commands);
        plugin.initialize(&mut ctx)?;
        let commands = ctx.into_staged().commit(&mut self.hooks, &mut self.commands);

        tracing::info!("Loaded plugin: {} v{}", plugin.name(), plugin.version());
        self.loaded.insert(
            name.to_string(),
            LoadedPlugin {
                plugin,
                commands,
                loaded_at: Utc::now(),
            },
        );

        self.hooks.dispatch(
            KnownHook::PluginLoaded,
            &HookPayload::new().with("plugin", name),
        )?;

        Ok(LoadStatus::Loaded)
    }

    /// Load a plugin, reporting only success. Failures are logged.
    pub fn load(&mut self, name: &str) -> bool {
        match self.try_load(name) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Failed to load plugin {}: {}", name, e);
                false
            }
        }
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.contains_key(name)
    }

    pub fn loaded_plugin(&self, name: &str) -> Option<&LoadedPlugin> {
        self.loaded.get(name)
    }

    /// Enable a plugin and, if it is an autoload plugin, load it now.
    ///
    /// A failed load does not undo the enable; it is reported in
    /// [`ToggleOutcome::load`].
    pub fn enable(&mut self, name: &str) -> Result<ToggleOutcome> {
        let mut outcome = self.registry.enable(name)?;

        let autoload = self.registry.get(name).is_some_and(|e| e.autoload);
        if autoload {
            outcome.load = match self.try_load(name) {
                Ok(_) => LoadAttempt::Loaded,
                Err(e) => {
                    tracing::warn!("Enabled {} but could not load it: {}", name, e);
                    LoadAttempt::Failed(e.to_string())
                }
            };
        }

        Ok(outcome)
    }

    /// Disable a plugin and clear its loaded marker.
    ///
    /// Hooks and commands it already registered stay in place; use
    /// [`PluginSystem::retract_hooks`] to remove its callbacks.
    pub fn disable(&mut self, name: &str) -> Result<ToggleOutcome> {
        let outcome = self.registry.disable(name)?;
        if self.loaded.remove(name).is_some() {
            tracing::debug!("Cleared loaded marker for {}", name);
        }
        Ok(outcome)
    }

    /// Remove every hook callback registered by `name`.
    pub fn retract_hooks(&mut self, name: &str) -> usize {
        self.hooks.retract_owner(name)
    }

    pub fn dispatch(&self, event: impl AsRef<str>, payload: &HookPayload) -> Result<()> {
        self.hooks.dispatch(event, payload)
    }

    /// Run a plugin-contributed command between `before_command` and
    /// `after_command` dispatches.
    pub fn run_command(&self, name: &str, args: &[String]) -> Result<()> {
        let registered = self
            .commands
            .get(name)
            .ok_or_else(|| LarakitError::CommandNotFound {
                name: name.to_string(),
            })?;

        self.hooks.dispatch(
            KnownHook::BeforeCommand,
            &HookPayload::new()
                .with("command", name)
                .with("args", args.to_vec()),
        )?;

        let result = registered.command.run(args);

        self.hooks.dispatch(
            KnownHook::AfterCommand,
            &HookPayload::new()
                .with("command", name)
                .with("success", result.is_ok()),
        )?;

        result.map_err(|source| LarakitError::CommandFailed {
            name: name.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::TaskCommand;
    use crate::plugin::loader::ENTRY_FILE;
    use crate::plugin::manifest::MANIFEST_FILE;
    use std::cell::{Cell, RefCell};
    use std::fs;
    use std::path::Path;
    use std::rc::Rc;
    use tempfile::TempDir;

    /// Test plugin: counts hook invocations and optionally registers a command.
    struct CounterPlugin {
        name: String,
        hook: Option<(&'static str, Rc<Cell<usize>>)>,
        command: Option<&'static str>,
    }

    impl Plugin for CounterPlugin {
        fn name(&self) -> &str {
            &self.name
        }

        fn version(&self) -> &str {
            "1.0.0"
        }

        fn initialize(&mut self, ctx: &mut PluginContext<'_>) -> Result<()> {
            if let Some((event, counter)) = &self.hook {
                let counter = Rc::clone(counter);
                ctx.register_hook(*event, move |_| {
                    counter.set(counter.get() + 1);
                    Ok(())
                });
            }
            if let Some(command) = self.command {
                ctx.register_command(Named(command))?;
            }
            Ok(())
        }
    }

    struct Named(&'static str);

    impl TaskCommand for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn run(&self, args: &[String]) -> anyhow::Result<()> {
            if args.first().map(String::as_str) == Some("--fail") {
                anyhow::bail!("requested failure");
            }
            Ok(())
        }
    }

    fn write_plugin(root: &Path, name: &str, manifest_extra: &str, entry: Option<&str>) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(MANIFEST_FILE),
            format!(
                r#"{{"name": "{}", "version": "1.0.0", "description": "test"{}}}"#,
                name, manifest_extra
            ),
        )
        .unwrap();
        if let Some(entry) = entry {
            fs::write(dir.join(ENTRY_FILE), entry).unwrap();
        }
    }

    /// Register a factory that counts how often it runs.
    fn counting_factory(
        system: &mut PluginSystem,
        name: &'static str,
        hook: Option<(&'static str, Rc<Cell<usize>>)>,
        command: Option<&'static str>,
    ) -> Rc<Cell<usize>> {
        let runs = Rc::new(Cell::new(0));
        let factory_runs = Rc::clone(&runs);
        system.factories_mut().register(name, move || {
            factory_runs.set(factory_runs.get() + 1);
            Box::new(CounterPlugin {
                name: name.to_string(),
                hook: hook.clone(),
                command,
            }) as Box<dyn Plugin>
        });
        runs
    }

    fn search_path(temp: &TempDir) -> Vec<PathBuf> {
        vec![temp.path().to_path_buf()]
    }

    #[test]
    fn test_load_is_idempotent() {
        let temp = TempDir::new().unwrap();
        write_plugin(temp.path(), "alpha", r#", "autoload": false"#, Some(""));

        let mut system = PluginSystem::default();
        let runs = counting_factory(&mut system, "alpha", None, None);
        system.discover(&search_path(&temp));

        assert!(system.load("alpha"));
        assert!(system.load("alpha"));
        assert_eq!(system.try_load("alpha").unwrap(), LoadStatus::AlreadyLoaded);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_load_unknown_plugin() {
        let mut system = PluginSystem::default();
        assert!(!system.load("nonexistent"));
        assert!(!system.is_loaded("nonexistent"));
        assert!(matches!(
            system.try_load("nonexistent"),
            Err(LarakitError::PluginNotFound { .. })
        ));
    }

    #[test]
    fn test_load_fails_without_entry_or_factory() {
        let temp = TempDir::new().unwrap();
        write_plugin(temp.path(), "no-entry", "", None);
        write_plugin(temp.path(), "no-factory", "", Some("factory = \"missing\""));

        let mut system = PluginSystem::default();
        let report = system.initialize(&search_path(&temp));

        assert!(report.loaded.is_empty());
        assert_eq!(report.failed.len(), 2);
        assert!(!system.is_loaded("no-entry"));
        assert!(!system.is_loaded("no-factory"));
    }

    #[test]
    fn test_entry_file_selects_factory_symbol() {
        let temp = TempDir::new().unwrap();
        write_plugin(temp.path(), "alpha", "", Some("factory = \"alpha_v2\""));

        let mut system = PluginSystem::default();
        system.factories_mut().register("alpha_v2", || {
            Box::new(CounterPlugin {
                name: "alpha".to_string(),
                hook: None,
                command: None,
            }) as Box<dyn Plugin>
        });

        let report = system.initialize(&search_path(&temp));
        assert_eq!(report.loaded, vec!["alpha"]);
    }

    #[test]
    fn test_identity_mismatch_fails_load() {
        let temp = TempDir::new().unwrap();
        write_plugin(temp.path(), "alpha", "", Some("factory = \"beta\""));

        let mut system = PluginSystem::default();
        counting_factory(&mut system, "beta", None, None);
        system.discover(&search_path(&temp));

        assert!(matches!(
            system.try_load("alpha"),
            Err(LarakitError::IdentityMismatch { .. })
        ));
    }

    #[test]
    fn test_plugin_loaded_fires_per_load() {
        let temp = TempDir::new().unwrap();
        write_plugin(temp.path(), "alpha", "", Some(""));
        write_plugin(temp.path(), "beta", "", Some(""));

        let mut system = PluginSystem::default();
        counting_factory(&mut system, "alpha", None, None);
        counting_factory(&mut system, "beta", None, None);

        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let seen = Rc::clone(&seen);
            system
                .hooks_mut()
                .register(KnownHook::PluginLoaded, move |payload| {
                    seen.borrow_mut()
                        .push(payload.get_str("plugin").unwrap_or_default().to_string());
                    Ok(())
                });
        }

        system.initialize(&search_path(&temp));
        assert_eq!(*seen.borrow(), vec!["alpha", "beta"]);
    }

    #[test]
    fn test_failed_initialize_leaves_no_registrations() {
        let temp = TempDir::new().unwrap();
        write_plugin(temp.path(), "alpha", "", Some(""));
        write_plugin(temp.path(), "beta", "", Some(""));

        let mut system = PluginSystem::default();
        let alpha_hits = Rc::new(Cell::new(0));
        let beta_hits = Rc::new(Cell::new(0));
        counting_factory(
            &mut system,
            "alpha",
            Some(("before_command", Rc::clone(&alpha_hits))),
            Some("shared:task"),
        );
        // beta registers a hook, then collides on the command name
        counting_factory(
            &mut system,
            "beta",
            Some(("before_command", Rc::clone(&beta_hits))),
            Some("shared:task"),
        );

        let report = system.initialize(&search_path(&temp));
        assert_eq!(report.loaded, vec!["alpha"]);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].error.contains("already registered"));

        system
            .dispatch("before_command", &HookPayload::new())
            .unwrap();
        assert_eq!(alpha_hits.get(), 1);
        assert_eq!(beta_hits.get(), 0);
        assert_eq!(system.commands().len(), 1);
    }

    #[test]
    fn test_disable_keeps_registrations() {
        let temp = TempDir::new().unwrap();
        write_plugin(temp.path(), "p", "", Some(""));

        let mut system = PluginSystem::default();
        let hits = Rc::new(Cell::new(0));
        counting_factory(
            &mut system,
            "p",
            Some(("after_command", Rc::clone(&hits))),
            None,
        );
        system.discover(&search_path(&temp));

        assert!(system.load("p"));
        system.disable("p").unwrap();
        assert!(!system.is_loaded("p"));

        system.dispatch("after_command", &HookPayload::new()).unwrap();
        assert_eq!(hits.get(), 1);

        assert_eq!(system.retract_hooks("p"), 1);
        system.dispatch("after_command", &HookPayload::new()).unwrap();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_enable_loads_autoload_plugin() {
        let temp = TempDir::new().unwrap();
        write_plugin(temp.path(), "p", r#", "enabled": false"#, Some(""));

        let mut system = PluginSystem::default();
        counting_factory(&mut system, "p", None, None);
        let report = system.initialize(&search_path(&temp));
        assert!(report.loaded.is_empty());

        let outcome = system.enable("p").unwrap();
        assert!(outcome.enabled);
        assert!(system.is_loaded("p"));

        system.disable("p").unwrap();
        system.enable("p").unwrap();
        assert!(system.registry().get("p").unwrap().enabled);
        assert_eq!(system.registry().list().len(), 1);
    }

    #[test]
    fn test_reenable_reloads_plugin_with_command() {
        let temp = TempDir::new().unwrap();
        write_plugin(temp.path(), "p", "", Some(""));

        let mut system = PluginSystem::default();
        let hits = Rc::new(Cell::new(0));
        let runs = counting_factory(
            &mut system,
            "p",
            Some(("before_command", Rc::clone(&hits))),
            Some("p:run"),
        );
        system.initialize(&search_path(&temp));
        assert!(system.is_loaded("p"));

        system.disable("p").unwrap();
        assert!(!system.is_loaded("p"));
        assert!(system.commands().contains("p:run"));

        let outcome = system.enable("p").unwrap();
        assert_eq!(outcome.load, LoadAttempt::Loaded);
        assert!(system.is_loaded("p"));
        assert_eq!(runs.get(), 2);

        // the reload replaced the earlier registrations instead of doubling them
        assert_eq!(system.commands().len(), 1);
        system.run_command("p:run", &[]).unwrap();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_enable_reports_failed_load() {
        let temp = TempDir::new().unwrap();
        write_plugin(temp.path(), "p", r#", "enabled": false"#, None);

        let mut system = PluginSystem::default();
        counting_factory(&mut system, "p", None, None);
        system.initialize(&search_path(&temp));

        let outcome = system.enable("p").unwrap();
        assert!(outcome.enabled);
        assert!(matches!(outcome.load, LoadAttempt::Failed(ref e) if e.contains("Entry file")));
        assert!(!system.is_loaded("p"));
    }

    #[test]
    fn test_enable_skips_load_for_dormant_plugin() {
        let temp = TempDir::new().unwrap();
        write_plugin(temp.path(), "p", r#", "autoload": false"#, Some(""));

        let mut system = PluginSystem::default();
        counting_factory(&mut system, "p", None, None);
        system.discover(&search_path(&temp));

        let outcome = system.enable("p").unwrap();
        assert_eq!(outcome.load, LoadAttempt::Skipped);
        assert!(!system.is_loaded("p"));
    }

    #[test]
    fn test_run_command_wraps_with_hooks() {
        let temp = TempDir::new().unwrap();
        write_plugin(temp.path(), "alpha", "", Some(""));

        let mut system = PluginSystem::default();
        counting_factory(&mut system, "alpha", None, Some("alpha:hello"));
        system.initialize(&search_path(&temp));
        assert_eq!(
            system.loaded_plugin("alpha").unwrap().commands,
            vec!["alpha:hello"]
        );

        let events = Rc::new(RefCell::new(Vec::new()));
        for event in [KnownHook::BeforeCommand, KnownHook::AfterCommand] {
            let events = Rc::clone(&events);
            system.hooks_mut().register(event, move |payload| {
                events.borrow_mut().push(format!(
                    "{}:{}",
                    event,
                    payload.get("success").map(|v| v.to_string()).unwrap_or_default()
                ));
                Ok(())
            });
        }

        system.run_command("alpha:hello", &[]).unwrap();
        let err = system
            .run_command("alpha:hello", &["--fail".to_string()])
            .unwrap_err();
        assert!(matches!(err, LarakitError::CommandFailed { .. }));
        assert!(matches!(
            system.run_command("alpha:missing", &[]),
            Err(LarakitError::CommandNotFound { .. })
        ));

        assert_eq!(
            *events.borrow(),
            vec![
                "before_command:",
                "after_command:true",
                "before_command:",
                "after_command:false",
            ]
        );
    }

    #[test]
    fn test_plugin_reads_scoped_config() {
        struct ConfigPlugin(Rc<Cell<i64>>);

        impl Plugin for ConfigPlugin {
            fn name(&self) -> &str {
                "cfg"
            }

            fn version(&self) -> &str {
                "0.1.0"
            }

            fn initialize(&mut self, ctx: &mut PluginContext<'_>) -> Result<()> {
                self.0.set(ctx.get_config("limit", -1));
                Ok(())
            }
        }

        let temp = TempDir::new().unwrap();
        write_plugin(temp.path(), "cfg", "", Some(""));

        let seen = Rc::new(Cell::new(0));
        let mut factories = FactoryCatalog::new();
        {
            let seen = Rc::clone(&seen);
            factories.register("cfg", move || {
                Box::new(ConfigPlugin(Rc::clone(&seen))) as Box<dyn Plugin>
            });
        }
        let config = Config::from_toml_str("[plugins.cfg]\nlimit = 42\n").unwrap();

        let mut system = PluginSystem::new(config, factories);
        system.initialize(&search_path(&temp));
        assert_eq!(seen.get(), 42);
    }

    #[test]
    fn test_end_to_end_alpha_beta() {
        let temp = TempDir::new().unwrap();
        write_plugin(temp.path(), "alpha", "", Some(""));
        write_plugin(temp.path(), "beta", r#", "autoload": false"#, Some(""));

        let mut system = PluginSystem::default();
        let counter = Rc::new(Cell::new(0));
        counting_factory(
            &mut system,
            "alpha",
            Some(("before_command", Rc::clone(&counter))),
            None,
        );
        counting_factory(&mut system, "beta", None, None);

        system.initialize(&search_path(&temp));
        assert!(system.is_loaded("alpha"));
        assert!(!system.is_loaded("beta"));

        system
            .dispatch(KnownHook::BeforeCommand, &HookPayload::new())
            .unwrap();
        assert_eq!(counter.get(), 1);

        assert!(system.load("beta"));
        assert!(system.is_loaded("beta"));
        assert_eq!(counter.get(), 1);
    }
}
