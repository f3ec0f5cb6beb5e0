// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod relay;
pub mod supervisor;
pub mod types;

use std::path::PathBuf;

use anyhow::Result;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{load_and_validate, ConfigFile, SlotCommand};
use crate::engine::Runtime;

pub use crate::exec::LaunchCommand;
pub use crate::relay::{LogLine, LogRelay};
pub use crate::supervisor::{ProcessHandle, ProcessSupervisor, SupervisorConfig, SupervisorRegistry};
pub use crate::types::{HandleId, ProcessState, StopOutcome, Termination};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the supervisor registry and the polling runtime
/// - Ctrl-C handling
///
/// Returns whether every slot exited with code 0.
pub async fn run(args: CliArgs) -> Result<bool> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg, &args.slots);
        return Ok(true);
    }

    let runtime = Runtime::new(&cfg, &args.slots, std::io::stdout())?;
    info!(?runtime, "starting slots");

    // Ctrl-C → graceful teardown.
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    let (summary, _stdout) = runtime.run(shutdown).await?;
    for (slot, outcome) in &summary.outcomes {
        info!(slot = %slot, outcome = %outcome, "slot finished");
    }
    Ok(summary.success())
}

/// Simple dry-run output: print the resolved slots and timings.
fn print_dry_run(cfg: &ConfigFile, selected: &[String]) {
    println!("slotrun dry-run");
    println!("  supervisor.grace_period = {:?}", cfg.supervisor.grace_period);
    println!("  supervisor.kill_timeout = {:?}", cfg.supervisor.kill_timeout);
    println!("  supervisor.drain_timeout = {:?}", cfg.supervisor.drain_timeout);
    println!("  supervisor.kill_tree = {}", cfg.supervisor.kill_tree);
    println!("  poll_interval = {:?}", cfg.poll_interval);
    println!();

    println!("slots ({}):", cfg.slots.len());
    for (name, slot) in cfg.slots.iter() {
        let marker = if selected.is_empty() || selected.contains(name) { "*" } else { " " };
        println!("  {marker} {name}");
        match &slot.command {
            SlotCommand::Shell(cmd) => println!("      cmd: {cmd}"),
            SlotCommand::Program { program, args } => {
                println!("      program: {}", program.display());
                if !args.is_empty() {
                    println!("      args: {:?}", args);
                }
            }
        }
        if let Some(dir) = &slot.working_dir {
            println!("      working_dir: {}", dir.display());
        }
        if let Some(file) = slot.resolved_settings_file() {
            println!("      settings_file: {}", file.display());
            if !slot.settings.is_empty() {
                let keys: Vec<&str> = slot.settings.keys().map(String::as_str).collect();
                println!("      settings: {:?}", keys);
            }
        }
    }

    debug!("dry-run complete (nothing launched)");
}
