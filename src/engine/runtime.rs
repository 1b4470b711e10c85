// src/engine/runtime.rs

use std::collections::HashSet;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::dag::scheduler::{Scheduler, SchedulerStep};
use crate::engine::queue::RebuildQueue;
use crate::serve::ReloadHub;

/// Public type alias for stage names throughout the engine.
pub type StageName = String;

/// Reason why a run was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    FileWatch,
    Manual,
}

/// Result of a stage run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Success,
    Failed,
}

/// Events sent into the runtime from the watcher, the executor, or external
/// signals.
///
/// - the watcher sends `RunRequested` (one batch per debounce flush)
/// - the executor sends `StageCompleted`
/// - Ctrl-C handling sends `ShutdownRequested`
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// Request a run covering the given stages (and their dependents).
    ///
    /// The whole batch enters one run, so stages sharing a dependent
    /// (diamonds) are never split across runs.
    RunRequested {
        stages: Vec<StageName>,
        reason: TriggerReason,
    },
    StageCompleted {
        stage: StageName,
        outcome: StageOutcome,
    },
    ShutdownRequested,
}

/// Options that influence how the runtime behaves.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOptions {
    /// If true, exit as soon as there is nothing left to run and no queued
    /// triggers. In watch mode this should be `false`.
    pub exit_when_idle: bool,
}

/// Summary of everything that failed while the runtime was alive.
///
/// For `build` this covers the single run; an empty `failed_stages` maps to
/// exit code 0.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub failed_stages: Vec<StageName>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed_stages.is_empty()
    }
}

/// The main orchestration runtime.
///
/// Responsibilities:
/// - Consume `RuntimeEvent`s from the watcher/executor/ctrl-c.
/// - Serialize rebuilds: at most one run in flight, later triggers coalesce
///   in the [`RebuildQueue`].
/// - Drive the DAG scheduler and send ready stages to the executor.
/// - Fire the live-reload hook after a fully successful run; a run with any
///   failed stage never notifies (stale-but-valid beats broken).
pub struct Runtime {
    scheduler: Scheduler,
    queue: RebuildQueue,
    options: RuntimeOptions,

    /// Unified event stream from all producers.
    events_rx: mpsc::Receiver<RuntimeEvent>,

    /// Channel to the executor: ready stages are sent here.
    exec_tx: mpsc::Sender<StageName>,

    /// Live-reload hook; `None` outside watch mode.
    reload: Option<ReloadHub>,

    /// Stages that failed or were blocked in the run currently in flight.
    failed_this_run: HashSet<StageName>,
    /// Stages dispatched in the run currently in flight.
    dispatched_this_run: usize,
    /// Failures across the whole runtime lifetime, for the final report.
    all_failed: Vec<StageName>,
}

impl Runtime {
    pub fn new(
        scheduler: Scheduler,
        queue: RebuildQueue,
        options: RuntimeOptions,
        events_rx: mpsc::Receiver<RuntimeEvent>,
        exec_tx: mpsc::Sender<StageName>,
        reload: Option<ReloadHub>,
    ) -> Self {
        Self {
            scheduler,
            queue,
            options,
            events_rx,
            exec_tx,
            reload,
            failed_this_run: HashSet::new(),
            dispatched_this_run: 0,
            all_failed: Vec::new(),
        }
    }

    /// Main event loop.
    ///
    /// This should be called after:
    /// - config is loaded & validated
    /// - `Scheduler` is constructed from config
    /// - the executor has been spawned and given a clone of the
    ///   `mpsc::Sender<RuntimeEvent>`
    /// - (watch mode) the watcher and dev server are running
    pub async fn run(mut self) -> Result<RunReport> {
        info!("assetpipe runtime started");

        while let Some(event) = self.events_rx.recv().await {
            debug!(?event, "runtime received event");

            let was_idle = self.scheduler.is_idle();

            let keep_running = match event {
                RuntimeEvent::RunRequested { stages, reason } => {
                    self.handle_run_request(stages, reason).await?
                }
                RuntimeEvent::StageCompleted { stage, outcome } => {
                    self.handle_stage_completion(stage, outcome).await?
                }
                RuntimeEvent::ShutdownRequested => {
                    info!("shutdown requested, stopping runtime");
                    false
                }
            };

            if !keep_running {
                break;
            }

            // A run can also start and finish within a single event (every
            // stage blocked), so "became idle" alone is not enough.
            if self.scheduler.is_idle() && (!was_idle || !self.failed_this_run.is_empty()) {
                self.finish_run();
                self.maybe_start_queued_run().await?;
            }

            // In `build` mode, exit once the DAG is idle and nothing is queued.
            if self.options.exit_when_idle
                && self.scheduler.is_idle()
                && self.queue.is_empty()
            {
                info!("runtime idle and exit_when_idle=true, stopping");
                break;
            }
        }

        info!("assetpipe runtime exiting");
        Ok(RunReport {
            failed_stages: self.all_failed,
        })
    }

    /// Handle a run request (from file watching or manual seeding).
    async fn handle_run_request(
        &mut self,
        stages: Vec<StageName>,
        reason: TriggerReason,
    ) -> Result<bool> {
        info!(?stages, ?reason, "run requested");

        if self.scheduler.is_idle() {
            // Starting a new run: combine this batch with anything queued.
            let mut triggers: HashSet<StageName> =
                self.queue.drain_pending().into_iter().collect();
            triggers.extend(stages);

            self.start_new_run(triggers.into_iter().collect()).await?;
        } else {
            // Run in flight: coalesce into the pending rebuild batch.
            for stage in &stages {
                self.queue.record_trigger(stage);
            }
            debug!(?stages, "run request recorded in rebuild queue");
        }

        Ok(true)
    }

    /// Handle completion of a stage.
    ///
    /// Failures cause dependents to be skipped, which is handled inside
    /// `Scheduler::handle_completion`; unrelated branches continue.
    async fn handle_stage_completion(
        &mut self,
        stage: StageName,
        outcome: StageOutcome,
    ) -> Result<bool> {
        match outcome {
            StageOutcome::Success => info!(stage = %stage, "stage completed successfully"),
            StageOutcome::Failed => {
                warn!(stage = %stage, "stage failed");
                self.failed_this_run.insert(stage.clone());
            }
        }

        let step = self.scheduler.handle_completion(&stage, outcome);
        self.apply_scheduler_step(step).await?;

        Ok(true)
    }

    /// Start a brand-new run from the given set of triggers.
    async fn start_new_run(&mut self, triggers: Vec<StageName>) -> Result<()> {
        if triggers.is_empty() {
            debug!("start_new_run called with empty trigger set; nothing to do");
            return Ok(());
        }

        info!(triggers = ?triggers, "starting new run");

        self.scheduler.start_new_run();
        self.failed_this_run.clear();
        self.dispatched_this_run = 0;

        let step = self.scheduler.handle_trigger(&triggers);
        self.apply_scheduler_step(step).await?;

        Ok(())
    }

    /// Dispatch the ready stages of a scheduler step and record its blocked
    /// stages as failures for this run.
    async fn apply_scheduler_step(&mut self, step: SchedulerStep) -> Result<()> {
        for stage in &step.blocked {
            warn!(stage = %stage, "stage skipped: dependencies unsatisfiable in this run");
            self.failed_this_run.insert(stage.clone());
        }

        for stage in step.ready {
            debug!(stage = %stage, "dispatching stage to executor");
            self.dispatched_this_run += 1;
            if let Err(err) = self.exec_tx.send(stage).await {
                error!(error = %err, "failed to send stage to executor");
                // If the executor channel is closed, there's not much we can
                // do; bubble up so higher layers can decide.
                return Err(err.into());
            }
        }
        Ok(())
    }

    /// Bookkeeping once a run has reached a terminal state for all its
    /// stages: log the outcome and notify reload clients on full success.
    fn finish_run(&mut self) {
        if self.failed_this_run.is_empty() {
            if self.dispatched_this_run > 0 {
                info!(stages = self.dispatched_this_run, "run finished successfully");
                if let Some(hub) = &self.reload {
                    hub.notify();
                }
            }
        } else {
            let mut failed: Vec<StageName> = self.failed_this_run.drain().collect();
            failed.sort();
            warn!(?failed, "run finished with failures; reload suppressed");
            self.all_failed.extend(failed);
        }
        self.failed_this_run.clear();
        self.dispatched_this_run = 0;
    }

    /// If the scheduler is idle and there are queued triggers, start a new run.
    async fn maybe_start_queued_run(&mut self) -> Result<()> {
        if !self.scheduler.is_idle() {
            return Ok(());
        }

        let triggers = self.queue.drain_pending();
        if triggers.is_empty() {
            return Ok(());
        }

        self.start_new_run(triggers).await
    }
}
