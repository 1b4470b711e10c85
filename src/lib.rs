// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod pipeline;
pub mod serve;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cli::{CliArgs, PipelineCommand};
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::dag::Scheduler;
use crate::engine::{
    spawn_executor, RebuildQueue, RunReport, Runtime, RuntimeEvent, RuntimeOptions, TriggerReason,
};
use crate::pipeline::{build_stage_specs, BuildContext};
use crate::serve::ReloadHub;
use crate::watch::{build_watch_profiles, spawn_watcher};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - scheduler / queue / runtime
/// - executor
/// - (watch mode) file watcher, dev server, Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let ctx = BuildContext::from_config(&cfg, &config_path)?;

    match args.command {
        PipelineCommand::Clean => ctx.clean(),
        PipelineCommand::Build { dry_run } => {
            if dry_run {
                print_dry_run(&cfg);
                return Ok(());
            }
            ctx.ensure_source_exists()?;
            let report = run_build(&cfg, Arc::new(ctx)).await?;
            if report.is_success() {
                Ok(())
            } else {
                Err(anyhow!(
                    "build failed; failing stages: {}",
                    report.failed_stages.join(", ")
                ))
            }
        }
        PipelineCommand::Watch { port } => {
            ctx.ensure_source_exists()?;
            run_watch(&cfg, Arc::new(ctx), port).await
        }
    }
}

/// Run the full stage DAG once and return the run report.
///
/// No watcher and no dev server; the runtime exits as soon as the DAG is
/// idle. This is also the programmatic entry point used by the integration
/// tests.
pub async fn run_build(cfg: &ConfigFile, ctx: Arc<BuildContext>) -> Result<RunReport> {
    let scheduler = Scheduler::from_config(cfg);
    let queue = RebuildQueue::new();
    let specs = Arc::new(build_stage_specs(cfg)?);

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let exec_tx = spawn_executor(rt_tx.clone(), specs, ctx);

    seed_roots(&scheduler, &rt_tx).await?;
    drop(rt_tx);

    let options = RuntimeOptions {
        exit_when_idle: true,
    };
    let runtime = Runtime::new(scheduler, queue, options, rt_rx, exec_tx, None);
    runtime.run().await
}

/// Run the pipeline once, then watch the source tree and serve the output
/// tree with live reload until shutdown.
pub async fn run_watch(cfg: &ConfigFile, ctx: Arc<BuildContext>, port: Option<u16>) -> Result<()> {
    let scheduler = Scheduler::from_config(cfg);
    let queue = RebuildQueue::new();
    let specs = Arc::new(build_stage_specs(cfg)?);

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let exec_tx = spawn_executor(rt_tx.clone(), Arc::clone(&specs), Arc::clone(&ctx));

    // Dev server over the output tree.
    let hub = ReloadHub::new();
    let port = port.unwrap_or(cfg.project.port);
    std::fs::create_dir_all(ctx.out_dir())?;
    let _server = serve::spawn_server(port, ctx.out_dir(), hub.clone()).await?;

    // File watcher; startup failure here is fatal.
    let profiles = build_watch_profiles(cfg)?;
    let window = Duration::from_millis(cfg.project.debounce_ms);
    let _watcher_handle = spawn_watcher(
        Arc::clone(&ctx),
        profiles,
        Arc::clone(&specs),
        window,
        rt_tx.clone(),
    )?;

    // Ctrl-C -> graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    // Seed the initial full build from the DAG roots.
    seed_roots(&scheduler, &rt_tx).await?;
    drop(rt_tx);

    let options = RuntimeOptions {
        exit_when_idle: false,
    };
    let runtime = Runtime::new(scheduler, queue, options, rt_rx, exec_tx, Some(hub));
    let report = runtime.run().await?;

    if !report.is_success() {
        warn!(
            failed = ?report.failed_stages,
            "watch session ended with earlier stage failures"
        );
    }
    Ok(())
}

/// Trigger all DAG roots as one batch; the scheduler cascades to their
/// dependents, so this seeds a full pipeline run.
async fn seed_roots(scheduler: &Scheduler, rt_tx: &mpsc::Sender<RuntimeEvent>) -> Result<()> {
    let roots = scheduler.roots();
    info!(?roots, "initial DAG roots to trigger at startup");

    rt_tx
        .send(RuntimeEvent::RunRequested {
            stages: roots,
            reason: TriggerReason::Manual,
        })
        .await?;
    Ok(())
}

/// Simple dry-run output: print stages, deps, inputs and outputs.
fn print_dry_run(cfg: &ConfigFile) {
    println!("assetpipe dry-run");
    println!("  project.source_dir = {}", cfg.project.source_dir);
    println!("  project.out_dir = {}", cfg.project.out_dir);
    println!("  project.debounce_ms = {}", cfg.project.debounce_ms);
    println!();

    println!("stages ({}):", cfg.stage.len());
    for (name, stage) in cfg.stage.iter() {
        println!("  - {name}");
        println!("      kind: {:?}", stage.kind);
        println!("      input: {:?}", stage.input);
        if !stage.exclude.is_empty() {
            println!("      exclude: {:?}", stage.exclude);
        }
        if !stage.base.is_empty() {
            println!("      base: {}", stage.base);
        }
        if !stage.dest.is_empty() {
            println!("      dest: {}", stage.dest);
        }
        if let Some(ref ext) = stage.ext {
            println!("      ext: {ext}");
        }
        if let Some(ref command) = stage.command {
            println!("      command: {command}");
        }
        if !stage.after.is_empty() {
            println!("      after: {:?}", stage.after);
        }
        if let Some(ref watch) = stage.watch {
            println!("      watch: {:?}", watch);
        }
        if stage.fingerprint {
            println!("      fingerprint: true");
        }
    }
}
