// src/lib.rs

pub mod cli;
pub mod config;
pub mod devnet;
pub mod errors;
pub mod extract;
pub mod logging;
pub mod process;
pub mod readiness;
pub mod runner;
pub mod signal;
pub mod subject;
pub mod supervisor;
pub mod types;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, HarnessCommand};
use crate::config::{load_and_validate, HarnessConfig};
use crate::process::LaunchTarget;
use crate::runner::CommandRunner;
use crate::supervisor::{start_service, stop_service, ServiceHandle};
use crate::types::{OutputFormat, RunMode};

pub use crate::errors::{HarnessError, Result as HarnessResult};
pub use crate::extract::ParsedResult;
pub use crate::runner::CommandOutput;
pub use crate::supervisor::ServiceState;

/// How often `up` checks that the service is still alive.
const LIVENESS_INTERVAL: Duration = Duration::from_millis(500);

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - service supervision
/// - the command runner (`exec`)
/// - Ctrl-C handling (`up`)
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    match args.command {
        HarnessCommand::Up => run_up(cfg).await,
        HarnessCommand::Exec { mode, parse, args } => run_exec(cfg, mode, parse, args).await,
    }
}

async fn run_up(cfg: HarnessConfig) -> Result<()> {
    let mut handle = start_service(cfg.service).await?;
    println!(
        "{} ready after {}ms: {}",
        handle.name(),
        handle.readiness().elapsed.as_millis(),
        handle.readiness().detail
    );

    let shutdown = signal::shutdown_signal();
    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(LIVENESS_INTERVAL);
    let died = loop {
        tokio::select! {
            _ = &mut shutdown => break None,
            _ = ticker.tick() => {
                if let Err(e) = handle.check_alive().await {
                    break Some(e);
                }
            }
        }
    };

    if let Some(e) = died {
        return Err(e.into());
    }

    info!(service = %handle.name(), "shutdown requested");
    stop_service(handle).await?;
    Ok(())
}

async fn run_exec(
    cfg: HarnessConfig,
    mode: Option<RunMode>,
    parse: Option<OutputFormat>,
    args: Vec<String>,
) -> Result<()> {
    let mut handle = start_service(cfg.service).await?;
    let runner = CommandRunner::new(cfg.subject);
    let mode = mode.unwrap_or(runner.config().mode);

    let outcome = runner.run_with_mode(&args, mode).await;
    teardown(&mut handle).await;

    let output = outcome?;
    print!("{}", output.stdout);
    if !output.stderr.is_empty() {
        eprint!("{}", output.stderr);
    }

    if let Some(format) = parse {
        let parsed = output.parse(format)?;
        println!("parsed: {parsed:?}");
    }
    Ok(())
}

/// Stop the service, logging rather than returning shutdown trouble: the
/// command outcome is what the caller cares about.
async fn teardown(handle: &mut ServiceHandle) {
    if let Err(e) = handle.stop().await {
        warn!(service = %handle.name(), error = %e, "service did not stop cleanly");
    }
}

/// Simple dry-run output: print the resolved service and subject settings.
fn print_dry_run(cfg: &HarnessConfig) {
    let service = &cfg.service;
    println!("emuharness dry-run");
    println!();

    println!("service: {}", service.name());
    match &service.launch.target {
        LaunchTarget::Program(path) => println!("  program: {}", path.display()),
        LaunchTarget::CargoBin { bin, manifest_path } => {
            println!("  cargo_bin: {bin}");
            if let Some(manifest) = manifest_path {
                println!("  manifest_path: {}", manifest.display());
            }
        }
    }
    if !service.launch.args.is_empty() {
        println!("  args: {:?}", service.launch.args);
    }
    if let Some(cwd) = &service.launch.cwd {
        println!("  cwd: {}", cwd.display());
    }
    println!("  readiness: {}", service.readiness);
    println!("  readiness_timeout: {:?}", service.readiness_timeout);
    println!("  stop_timeout: {:?}", service.stop_timeout);
    println!("  terminator: {:?}", service.terminator);
    if !service.sweep_names.is_empty() {
        println!("  sweep_names: {:?}", service.sweep_names);
    }
    println!();

    let subject = &cfg.subject;
    println!("subject:");
    match &subject.program {
        Some(program) => println!("  program: {}", program.display()),
        None => println!("  program: (in-process only)"),
    }
    if let Some(config_file) = &subject.config_file {
        println!("  config_file: {}", config_file.display());
    }
    println!("  mode: {:?}", subject.mode);
    println!("  timeout: {:?}", subject.timeout);

    debug!("dry-run complete (nothing started)");
}
