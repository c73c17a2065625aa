use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "larakit")]
#[command(about = "Task runner for Laravel projects with plugins and hooks")]
#[command(version)]
pub struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Base directory (default: ~/.larakit)
    #[arg(long, global = true)]
    pub base_dir: Option<PathBuf>,

    /// Laravel project directory (default: current directory)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage plugins
    Plugin {
        #[command(subcommand)]
        action: PluginAction,
    },

    /// Run a plugin-provided command
    Run {
        /// Command name (e.g., timer:threshold)
        command: String,

        /// Arguments passed to the command
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// List commands contributed by loaded plugins
    Commands,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum PluginAction {
    /// List discovered plugins and their state
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a plugin directory for problems
    Validate {
        /// Plugin directory
        path: PathBuf,
    },

    /// Enable a plugin
    Enable {
        /// Plugin name
        name: String,

        /// Load it now even if autoload is off
        #[arg(long)]
        load: bool,
    },

    /// Disable a plugin
    Disable {
        /// Plugin name
        name: String,
    },

    /// Show well-known hooks and current listeners
    Hooks,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g., plugins.task-timer.warn_after_ms)
        key: String,
    },

    /// Set a config value
    Set {
        /// Config key (e.g., project.php)
        key: String,

        /// Value to set (TOML literal or plain string)
        value: String,
    },

    /// List all config values
    List,

    /// Show config file path
    Path,

    /// Initialize config file with defaults
    Init,
}
