// src/engine/queue.rs

use std::collections::HashSet;

use tracing::debug;

use super::runtime::StageName;

/// Queue of triggers that arrive while a run is already executing.
///
/// Semantics (at-most-one in-flight rebuild per chain):
/// - While a run is active, every trigger is merged into a single pending
///   batch. The batch represents the one queued re-run.
/// - Further changes keep coalescing into that batch until the runtime is
///   idle and calls `drain_pending()`, which starts the re-run from the
///   merged stage set.
///
/// This gives the coalescing rule from the concurrency model: a new change
/// arriving mid-build queues one pending re-run; additional changes fold
/// into it rather than piling up runs.
#[derive(Debug, Default)]
pub struct RebuildQueue {
    pending: HashSet<StageName>,
}

impl RebuildQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if there are no queued triggers.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Record that a stage was triggered while a run is in progress.
    pub fn record_trigger(&mut self, stage: &str) {
        let inserted = self.pending.insert(stage.to_string());
        debug!(stage = %stage, inserted, "merged trigger into pending rebuild batch");
    }

    /// Drain the pending batch into a vector of stage names.
    ///
    /// This is called by the runtime when it becomes idle and wants to start
    /// a new run based on everything that was queued while it was running.
    pub fn drain_pending(&mut self) -> Vec<StageName> {
        let stages: Vec<StageName> = self.pending.drain().collect();
        debug!(drained = stages.len(), "drained queued triggers into new run");
        stages
    }
}
