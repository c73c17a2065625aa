//! Task commands contributed by plugins
//!
//! The CLI consults [`CommandRegistry`] to find commands it does not implement
//! itself. The core only validates and collects them; running is up to the caller.

use std::fmt;

/// Capability set every plugin-contributed command must provide
pub trait TaskCommand {
    /// Identifier in `namespace:name` form, e.g. `deploy:rollback`
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Run with the remaining CLI arguments. `Err` means the task failed.
    fn run(&self, args: &[String]) -> anyhow::Result<()>;
}

/// A registered command and the plugin that contributed it
pub struct RegisteredCommand {
    pub plugin: String,
    pub command: Box<dyn TaskCommand>,
}

impl RegisteredCommand {
    pub fn name(&self) -> &str {
        self.command.name()
    }
}

impl fmt::Debug for RegisteredCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredCommand")
            .field("plugin", &self.plugin)
            .field("name", &self.command.name())
            .finish()
    }
}

/// Check a command identifier against the naming contract.
///
/// Lowercase `segment(:segment)*`, each segment `[a-z0-9-]` starting alphanumeric.
pub fn check_command_name(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err("command name is empty".to_string());
    }

    for segment in name.split(':') {
        let mut chars = segment.chars();
        match chars.next() {
            Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit() => {}
            _ => {
                return Err(format!(
                    "invalid command name '{}': each ':'-separated segment must start with a lowercase letter or digit",
                    name
                ))
            }
        }
        if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
            return Err(format!(
                "invalid command name '{}': only lowercase letters, digits, '-' and ':' are allowed",
                name
            ));
        }
    }

    Ok(())
}

/// Commands collected from loaded plugins, in registration order
#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: Vec<RegisteredCommand>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, registered: RegisteredCommand) {
        tracing::debug!(
            command = registered.name(),
            plugin = %registered.plugin,
            "Registering command"
        );
        self.commands.push(registered);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.iter().any(|c| c.name() == name)
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredCommand> {
        self.commands.iter().find(|c| c.name() == name)
    }

    pub fn list(&self) -> &[RegisteredCommand] {
        &self.commands
    }

    /// Drop every command contributed by `plugin`. Returns how many were removed.
    pub(crate) fn retract_owner(&mut self, plugin: &str) -> usize {
        let before = self.commands.len();
        self.commands.retain(|c| c.plugin != plugin);
        before - self.commands.len()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
