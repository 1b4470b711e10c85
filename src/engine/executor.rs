// src/engine/executor.rs

//! Stage executor.
//!
//! Consumes ready stage names from the runtime, runs the corresponding
//! pipeline stage, and reports completion back as `RuntimeEvent`s. Each stage
//! runs in its own Tokio task, so independent branches of the DAG execute
//! concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::engine::{RuntimeEvent, StageName, StageOutcome};
use crate::pipeline::{run_stage, BuildContext, StageSpec};

/// Spawn the background executor loop.
///
/// The returned `mpsc::Sender<StageName>` is what the runtime uses as
/// `exec_tx` in `engine::Runtime`.
pub fn spawn_executor(
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    specs: Arc<HashMap<StageName, StageSpec>>,
    ctx: Arc<BuildContext>,
) -> mpsc::Sender<StageName> {
    let (tx, mut rx) = mpsc::channel::<StageName>(32);

    tokio::spawn(async move {
        info!("executor loop started");
        while let Some(stage) = rx.recv().await {
            let runtime_tx = runtime_tx.clone();
            let specs = Arc::clone(&specs);
            let ctx = Arc::clone(&ctx);
            tokio::spawn(async move {
                execute_one(stage, specs, ctx, runtime_tx).await;
            });
        }
        info!("executor loop finished (channel closed)");
    });

    tx
}

/// Run a single stage and emit its `StageCompleted` event.
///
/// Stage-level errors (unreadable source tree, closed channel, ...) are
/// converted into a failed completion and logged.
async fn execute_one(
    stage: StageName,
    specs: Arc<HashMap<StageName, StageSpec>>,
    ctx: Arc<BuildContext>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) {
    let spec = match specs.get(&stage) {
        Some(s) => s,
        None => {
            error!(stage = %stage, "executor received unknown stage");
            let _ = runtime_tx
                .send(RuntimeEvent::StageCompleted {
                    stage,
                    outcome: StageOutcome::Failed,
                })
                .await;
            return;
        }
    };

    info!(stage = %stage, kind = ?spec.kind, "running stage");

    let outcome = match run_stage(spec, &ctx).await {
        Ok(report) => {
            for failure in &report.failures {
                warn!(
                    stage = %stage,
                    file = ?failure.path,
                    reason = %failure.reason,
                    "stage input failed"
                );
            }
            if report.is_success() {
                info!(
                    stage = %stage,
                    outputs = report.outputs.len(),
                    "stage finished"
                );
                StageOutcome::Success
            } else {
                warn!(
                    stage = %stage,
                    outputs = report.outputs.len(),
                    failures = report.failures.len(),
                    "stage finished with file failures"
                );
                StageOutcome::Failed
            }
        }
        Err(err) => {
            error!(stage = %stage, error = %err, "stage execution error");
            StageOutcome::Failed
        }
    };

    let _ = runtime_tx
        .send(RuntimeEvent::StageCompleted { stage, outcome })
        .await;
}
