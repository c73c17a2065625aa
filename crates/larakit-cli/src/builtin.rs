//! Plugins compiled into the `larakit` binary.
//!
//! A plugin directory selects one of these through its `entry.toml`.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use colored::Colorize;

use larakit_core::{
    FactoryCatalog, KnownHook, LogLevel, Plugin, PluginContext, Result, TaskCommand,
};

pub const TASK_TIMER: &str = "task-timer";

const DEFAULT_WARN_AFTER_MS: u64 = 2000;

/// Register every compiled-in plugin factory.
pub fn register(factories: &mut FactoryCatalog) {
    factories.register(TASK_TIMER, || Box::new(TaskTimer) as Box<dyn Plugin>);
}

/// Reports how long each plugin command took.
struct TaskTimer;

#[derive(Default)]
struct TimerState {
    started: Option<Instant>,
}

impl Plugin for TaskTimer {
    fn name(&self) -> &str {
        TASK_TIMER
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn description(&self) -> &str {
        "Reports command durations"
    }

    fn initialize(&mut self, ctx: &mut PluginContext<'_>) -> Result<()> {
        let warn_after_ms = ctx.get_config("warn_after_ms", DEFAULT_WARN_AFTER_MS);
        let warn_after = Duration::from_millis(warn_after_ms);
        let state = Rc::new(RefCell::new(TimerState::default()));

        {
            let state = Rc::clone(&state);
            ctx.register_hook(KnownHook::BeforeCommand, move |_| {
                state.borrow_mut().started = Some(Instant::now());
                Ok(())
            });
        }

        ctx.register_hook(KnownHook::AfterCommand, move |payload| {
            let Some(started) = state.borrow_mut().started.take() else {
                return Ok(());
            };
            let elapsed = started.elapsed();
            let command = payload.get_str("command").unwrap_or("?");

            if elapsed > warn_after {
                tracing::warn!(
                    "{} took {}ms (threshold {}ms)",
                    command,
                    elapsed.as_millis(),
                    warn_after.as_millis()
                );
            }
            eprintln!(
                "{} {} in {}ms",
                "[timer]".dimmed(),
                command,
                elapsed.as_millis()
            );
            Ok(())
        });

        ctx.register_command(ShowThreshold { warn_after })?;
        ctx.log("task timer ready", LogLevel::Debug);
        Ok(())
    }
}

struct ShowThreshold {
    warn_after: Duration,
}

impl TaskCommand for ShowThreshold {
    fn name(&self) -> &str {
        "timer:threshold"
    }

    fn description(&self) -> &str {
        "Show the slow-command warning threshold"
    }

    fn run(&self, _args: &[String]) -> anyhow::Result<()> {
        println!(
            "Commands slower than {}ms are reported as warnings",
            self.warn_after.as_millis()
        );
        println!(
            "Change with: larakit config set plugins.{}.warn_after_ms <ms>",
            TASK_TIMER
        );
        Ok(())
    }
}
