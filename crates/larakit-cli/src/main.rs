use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use larakit_core::plugin::validate::is_warning;
use larakit_core::{
    available_hooks, validate, Config, FactoryCatalog, InitReport, KnownHook, LarakitError,
    LoadAttempt, Persistence, PluginSystem, Result, ToggleOutcome,
};

mod args;
mod builtin;
use args::{Cli, Commands, ConfigAction, PluginAction, Shell};

/// Project-local plugin directory (highest priority)
const PROJECT_PLUGIN_DIR: &str = ".larakit/plugins";
/// Alternate project location
const PROJECT_ALT_PLUGIN_DIR: &str = "plugins";

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let base_dir = resolve_base_dir(cli.base_dir);
    let project_dir = cli.project.unwrap_or_else(|| PathBuf::from("."));

    let result = match cli.command {
        Some(Commands::Plugin { action }) => handle_plugin(action, &base_dir, &project_dir),
        Some(Commands::Run { command, args }) => {
            handle_run(&base_dir, &project_dir, &command, &args)
        }
        Some(Commands::Commands) => handle_commands(&base_dir, &project_dir),
        Some(Commands::Config { action }) => handle_config(action, &base_dir),
        Some(Commands::Completions { shell }) => {
            handle_completions(shell);
            Ok(())
        }
        None => {
            Cli::command().print_help().ok();
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "[ERROR]".red().bold(), e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

/// `LARAKIT_LOG` wins; otherwise -v/-q pick the level.
fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_env("LARAKIT_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn handle_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let shell = match shell {
        Shell::Bash => clap_complete::Shell::Bash,
        Shell::Zsh => clap_complete::Shell::Zsh,
        Shell::Fish => clap_complete::Shell::Fish,
        Shell::PowerShell => clap_complete::Shell::PowerShell,
        Shell::Elvish => clap_complete::Shell::Elvish,
    };
    generate(shell, &mut cmd, "larakit", &mut io::stdout());
}

fn resolve_base_dir(cli_base: Option<PathBuf>) -> PathBuf {
    if let Some(base) = cli_base {
        return base;
    }

    if let Ok(base) = std::env::var("LARAKIT_BASE") {
        return PathBuf::from(base);
    }

    dirs::home_dir()
        .map(|h| h.join(".larakit"))
        .unwrap_or_else(|| PathBuf::from(".larakit"))
}

/// Plugin search paths, highest priority first
fn search_paths(base_dir: &Path, project_dir: &Path) -> Vec<PathBuf> {
    vec![
        project_dir.join(PROJECT_PLUGIN_DIR),
        project_dir.join(PROJECT_ALT_PLUGIN_DIR),
        base_dir.join("plugins"),
    ]
}

/// Build the plugin system and autoload plugins
fn boot(base_dir: &Path, project_dir: &Path) -> Result<(PluginSystem, InitReport)> {
    let config = Config::load(base_dir)?;

    let mut factories = FactoryCatalog::new();
    builtin::register(&mut factories);

    let mut system = PluginSystem::new(config, factories);
    let report = system.initialize(&search_paths(base_dir, project_dir));
    Ok((system, report))
}

fn handle_run(base_dir: &Path, project_dir: &Path, command: &str, args: &[String]) -> Result<()> {
    let (system, _) = boot(base_dir, project_dir)?;
    system.run_command(command, args)
}

fn handle_commands(base_dir: &Path, project_dir: &Path) -> Result<()> {
    let (system, _) = boot(base_dir, project_dir)?;
    let commands = system.commands().list();

    if commands.is_empty() {
        println!("No plugin commands registered.");
        return Ok(());
    }

    println!();
    println!("{}", "Plugin commands:".cyan().bold());
    println!();
    for registered in commands {
        println!(
            "  {:<28} {} {}",
            registered.name().green(),
            registered.command.description(),
            format!("[{}]", registered.plugin).dimmed()
        );
    }
    println!();
    Ok(())
}

fn handle_plugin(action: PluginAction, base_dir: &Path, project_dir: &Path) -> Result<()> {
    match action {
        PluginAction::List { json } => {
            let (system, report) = boot(base_dir, project_dir)?;
            if json {
                print_plugins_json(&system, &report)
            } else {
                print_plugins(&system, &report);
                Ok(())
            }
        }
        PluginAction::Validate { path } => {
            handle_validate(&path);
            Ok(())
        }
        PluginAction::Enable { name, load } => {
            let (mut system, _) = boot(base_dir, project_dir)?;
            let mut outcome = system.enable(&name)?;

            if load && outcome.load == LoadAttempt::Skipped {
                outcome.load = match system.try_load(&name) {
                    Ok(_) => LoadAttempt::Loaded,
                    Err(e) => LoadAttempt::Failed(e.to_string()),
                };
            }
            print_toggle(&outcome);
            Ok(())
        }
        PluginAction::Disable { name } => {
            let (mut system, _) = boot(base_dir, project_dir)?;
            let outcome = system.disable(&name)?;
            print_toggle(&outcome);
            Ok(())
        }
        PluginAction::Hooks => {
            let (system, _) = boot(base_dir, project_dir)?;
            print_hooks(&system);
            Ok(())
        }
    }
}

fn print_toggle(outcome: &ToggleOutcome) {
    let label = if outcome.enabled {
        "Enabled:".green()
    } else {
        "Disabled:".yellow()
    };
    println!("{} {}", label, outcome.name);

    if let Persistence::Failed(reason) = &outcome.persistence {
        eprintln!(
            "{} Change applies to this run only; manifest not updated: {}",
            "[WARN]".yellow().bold(),
            reason
        );
    }

    match &outcome.load {
        LoadAttempt::Skipped => {}
        LoadAttempt::Loaded => println!("{} {}", "Loaded:".green(), outcome.name),
        LoadAttempt::Failed(reason) => eprintln!(
            "{} {} is enabled but failed to load: {}",
            "[WARN]".yellow().bold(),
            outcome.name,
            reason
        ),
    }
}

fn print_plugins(system: &PluginSystem, report: &InitReport) {
    let entries = system.registry().list();
    if entries.is_empty() {
        println!("No plugins found.");
        println!();
        println!("Plugins are discovered in:");
        for path in &report_search_hint() {
            println!("  {}", path);
        }
        return;
    }

    println!();
    println!("{}", "Plugins:".cyan().bold());
    println!();
    for entry in entries {
        let state = if system.is_loaded(entry.name()) {
            "loaded".green()
        } else if !entry.enabled {
            "disabled".red()
        } else if !entry.autoload {
            "dormant".yellow()
        } else {
            "failed".red().bold()
        };

        let version = if entry.manifest.version.is_empty() {
            "-".to_string()
        } else {
            entry.manifest.version.clone()
        };

        println!("  {} {} [{}]", entry.name().bold(), version.dimmed(), state);
        if !entry.manifest.description.is_empty() {
            println!("    {}", entry.manifest.description);
        }
        println!("    {}", entry.path.display().to_string().dimmed());
    }
    println!();

    for failure in &report.failed {
        eprintln!(
            "{} {}: {}",
            "[WARN]".yellow().bold(),
            failure.name,
            failure.error
        );
    }
    for skipped in &report.discovery.skipped {
        eprintln!(
            "{} skipped {}: {}",
            "[WARN]".yellow().bold(),
            skipped.path.display(),
            skipped.reason
        );
    }
}

fn report_search_hint() -> Vec<String> {
    vec![
        format!("<project>/{}", PROJECT_PLUGIN_DIR),
        format!("<project>/{}", PROJECT_ALT_PLUGIN_DIR),
        "<base-dir>/plugins".to_string(),
    ]
}

fn print_plugins_json(system: &PluginSystem, report: &InitReport) -> Result<()> {
    let plugins: Vec<serde_json::Value> = system
        .registry()
        .list()
        .iter()
        .map(|entry| {
            let loaded = system.loaded_plugin(entry.name());
            serde_json::json!({
                "name": entry.name(),
                "version": entry.manifest.version,
                "description": entry.manifest.description,
                "enabled": entry.enabled,
                "autoload": entry.autoload,
                "loaded": loaded.is_some(),
                "loaded_at": loaded.map(|p| p.loaded_at.to_rfc3339()),
                "path": entry.path,
                "commands": loaded.map(|p| p.commands.clone()).unwrap_or_default(),
            })
        })
        .collect();

    let failed: Vec<serde_json::Value> = report
        .failed
        .iter()
        .map(|f| serde_json::json!({ "name": f.name, "error": f.error }))
        .collect();

    let out = serde_json::json!({ "plugins": plugins, "failed": failed });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn handle_validate(path: &Path) {
    let findings = validate(path);
    if findings.is_empty() {
        println!("{} {}", "Valid:".green(), path.display());
        return;
    }

    for finding in &findings {
        if is_warning(finding) {
            println!("  {} {}", "!".yellow(), finding);
        } else {
            println!("  {} {}", "x".red(), finding);
        }
    }

    let errors = findings.iter().filter(|f| !is_warning(f)).count();
    println!();
    if errors == 0 {
        println!("{} {} (with warnings)", "Valid:".green(), path.display());
    } else {
        println!(
            "{} {} ({} problem(s))",
            "Invalid:".red(),
            path.display(),
            errors
        );
    }
}

fn print_hooks(system: &PluginSystem) {
    let bus = system.hooks();

    println!();
    println!("{}", "Available hooks:".cyan().bold());
    println!();
    for (name, description) in available_hooks() {
        println!(
            "  {:<22} {} {}",
            name.green(),
            description,
            format!("({} listeners)", bus.listeners(name)).dimmed()
        );
    }

    let custom: Vec<&str> = bus
        .events()
        .into_iter()
        .filter(|e| KnownHook::from_name(e).is_none())
        .collect();
    if !custom.is_empty() {
        println!();
        println!("{}", "Custom hooks:".cyan().bold());
        println!();
        for name in custom {
            println!(
                "  {:<22} {}",
                name.green(),
                format!("({} listeners)", bus.listeners(name)).dimmed()
            );
        }
    }
    println!();
}

fn handle_config(action: ConfigAction, base_dir: &Path) -> Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load(base_dir)?;
            match config.get(&key) {
                Some(value) => {
                    println!("{}", value);
                }
                None => {
                    return Err(LarakitError::ConfigKeyNotFound { key });
                }
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load(base_dir)?;
            config.set(&key, &value)?;
            config.save(base_dir)?;
            println!("{} {} = {}", "Set:".green(), key, value);
        }
        ConfigAction::List => {
            let config = Config::load(base_dir)?;
            println!();
            for (key, value) in config.list() {
                println!("{} = {}", key.cyan(), value);
            }
            println!();
        }
        ConfigAction::Path => {
            let path = Config::path(base_dir);
            println!("{}", path.display());
        }
        ConfigAction::Init => {
            let path = Config::init(base_dir)?;
            println!("{} {}", "Initialized:".green(), path.display());
        }
    }

    Ok(())
}
