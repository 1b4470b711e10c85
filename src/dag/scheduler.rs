// src/dag/scheduler.rs

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::config::model::ConfigFile;
use crate::dag::graph::StageGraph;
use crate::engine::{StageName, StageOutcome};

/// Per-run state of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    /// Stage is part of this run but waiting on dependencies.
    Pending,
    /// Stage has been dispatched to the executor and is currently running.
    Running,
    /// Stage completed successfully for this run.
    DoneSuccess,
    /// Stage failed in this run (or was blocked by a failed dependency).
    DoneFailed,
}

/// Static stage information derived from config, plus per-run state.
#[derive(Debug, Clone)]
struct StageState {
    name: StageName,
    /// Direct dependencies for this stage (names in `after = [...]`).
    deps: Vec<StageName>,

    /// Per-run state (None if not participating in the current run).
    run_state: Option<RunState>,

    /// Last run ID in which this stage succeeded.
    ///
    /// This allows semantics like: if clean -> copy -> convert and only
    /// `convert` is triggered while `copy` previously succeeded, `convert`
    /// can run without re-running `copy`.
    last_successful_run: Option<u64>,
}

/// Outcome of feeding one event into the scheduler.
///
/// `ready` stages should be dispatched to the executor now. `blocked` stages
/// can never run in this run (a dependency failed, or is absent from the run
/// and has never succeeded) and have been marked failed; the runtime reports
/// them so the run counts as failed.
#[derive(Debug, Default)]
pub struct SchedulerStep {
    pub ready: Vec<StageName>,
    pub blocked: Vec<StageName>,
}

/// Dependency status of a pending stage within the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DepStatus {
    /// All deps satisfied; the stage can run now.
    Satisfied,
    /// At least one dep is still pending/running in this run.
    Waiting,
    /// A dep failed, or is outside the run with no success history; the
    /// stage can never run in this run.
    Unsatisfiable,
}

/// Scheduler holds the immutable DAG plus mutable per-run state.
///
/// It is responsible for:
/// - remembering which stages are part of the current run
/// - cascading a trigger to the stage's transitive dependents
/// - deciding when a triggered stage is "ready" to run (deps satisfied)
/// - marking stages as succeeded/failed
/// - failing dependents when a stage fails, while unrelated branches
///   keep running
pub struct Scheduler {
    graph: StageGraph,
    stages: HashMap<StageName, StageState>,

    /// Monotonically increasing run ID.
    run_counter: u64,
    /// Currently active run ID, or `None` if there is no active run.
    current_run_id: Option<u64>,
}

impl Scheduler {
    /// Construct a scheduler from a validated [`ConfigFile`].
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let graph = StageGraph::from_config(cfg);

        let mut stages = HashMap::new();
        for name in cfg.stage.keys() {
            let deps = graph.dependencies_of(name).to_vec();
            stages.insert(
                name.clone(),
                StageState {
                    name: name.clone(),
                    deps,
                    run_state: None,
                    last_successful_run: None,
                },
            );
        }

        Self {
            graph,
            stages,
            run_counter: 0,
            current_run_id: None,
        }
    }

    /// Returns `true` if there is currently no active run.
    pub fn is_idle(&self) -> bool {
        self.current_run_id.is_none()
    }

    /// Stage names with no `after` dependencies.
    pub fn roots(&self) -> Vec<StageName> {
        self.graph.roots()
    }

    /// Start a new run, resetting per-run state but keeping historical
    /// success information (for dependency satisfaction on later runs).
    pub fn start_new_run(&mut self) {
        self.run_counter += 1;
        self.current_run_id = Some(self.run_counter);

        for state in self.stages.values_mut() {
            state.run_state = None;
        }

        debug!(run_id = self.run_counter, "scheduler: starting new run");
    }

    /// Handle a trigger batch for this run.
    ///
    /// Each triggered stage *and its transitive dependents* are marked as
    /// participating in the current run, so a change to a CSS source re-runs
    /// the CSS stage plus anything downstream of it, and nothing else.
    /// Triggering all stages of a batch at once keeps shared dependents
    /// (diamonds) in a single run.
    pub fn handle_trigger(&mut self, stages: &[StageName]) -> SchedulerStep {
        if self.current_run_id.is_none() {
            warn!("handle_trigger called with no active run; implicitly starting a new run");
            self.start_new_run();
        }

        // Mark each stage and everything downstream as Pending, unless a
        // node is already participating in this run.
        let mut stack: Vec<StageName> = Vec::new();
        for stage in stages {
            if self.stages.contains_key(stage) {
                stack.push(stage.clone());
            } else {
                warn!(stage = %stage, "trigger for unknown stage; ignoring");
            }
        }

        while let Some(name) = stack.pop() {
            let state = match self.stages.get_mut(&name) {
                Some(s) => s,
                None => continue,
            };
            if state.run_state.is_none() {
                state.run_state = Some(RunState::Pending);
                debug!(stage = %state.name, "stage marked as Pending in this run");
                stack.extend(self.graph.dependents_of(&name).iter().cloned());
            } else {
                debug!(
                    stage = %state.name,
                    "stage already participating in current run; ignoring additional trigger"
                );
            }
        }

        let step = self.resolve_pending_stages();
        self.maybe_finish_run();
        step
    }

    /// Handle completion of a stage with a concrete outcome.
    ///
    /// - On success, mark it `DoneSuccess`, update history, and release
    ///   dependents whose dependencies are now satisfied.
    /// - On failure, mark it `DoneFailed` and mark all triggered dependents
    ///   in this run as `DoneFailed` as well; unrelated branches continue.
    pub fn handle_completion(&mut self, stage: &str, outcome: StageOutcome) -> SchedulerStep {
        let run_id = match self.current_run_id {
            Some(id) => id,
            None => {
                warn!(stage = %stage, "handle_completion called with no active run; ignoring");
                return SchedulerStep::default();
            }
        };

        let mut step = SchedulerStep::default();

        match self.stages.get_mut(stage) {
            Some(state) => match outcome {
                StageOutcome::Success => {
                    state.run_state = Some(RunState::DoneSuccess);
                    state.last_successful_run = Some(run_id);
                    debug!(stage = %state.name, "stage completed successfully");
                    step = self.resolve_pending_stages();
                }
                StageOutcome::Failed => {
                    state.run_state = Some(RunState::DoneFailed);
                    warn!(stage = %state.name, "stage failed; failing dependents in this run");
                    self.mark_dependents_failed(stage);
                    // Unrelated branches may have become ready via other
                    // completions queued behind this one; nothing to do here.
                }
            },
            None => {
                warn!(stage = %stage, "completion for unknown stage; ignoring");
            }
        }

        self.maybe_finish_run();
        step
    }

    /// Determine whether all stages are in a terminal state and clear
    /// `current_run_id` if so.
    fn maybe_finish_run(&mut self) {
        if self.current_run_id.is_none() {
            return;
        }

        let any_active = self.stages.values().any(|state| {
            matches!(
                state.run_state,
                Some(RunState::Pending) | Some(RunState::Running)
            )
        });

        if !any_active {
            info!(
                run_id = self.current_run_id,
                "scheduler: all stages terminal; marking run as finished"
            );
            self.current_run_id = None;
        }
    }

    /// Sweep `Pending` stages: mark satisfied ones `Running` (returned as
    /// ready) and unsatisfiable ones `DoneFailed` (returned as blocked).
    ///
    /// Failing a blocked stage can make its own dependents unsatisfiable, so
    /// the sweep repeats until it reaches a fixed point.
    fn resolve_pending_stages(&mut self) -> SchedulerStep {
        let mut step = SchedulerStep::default();

        loop {
            // Decide first, then mutate, to avoid borrowing conflicts.
            let mut ready: Vec<StageName> = Vec::new();
            let mut blocked: Vec<StageName> = Vec::new();

            for state in self.stages.values() {
                if !matches!(state.run_state, Some(RunState::Pending)) {
                    continue;
                }
                match self.deps_status(state) {
                    DepStatus::Satisfied => ready.push(state.name.clone()),
                    DepStatus::Unsatisfiable => blocked.push(state.name.clone()),
                    DepStatus::Waiting => {}
                }
            }

            if ready.is_empty() && blocked.is_empty() {
                break;
            }

            for name in ready {
                if let Some(state) = self.stages.get_mut(&name) {
                    debug!(stage = %state.name, "dependencies satisfied; marking Running");
                    state.run_state = Some(RunState::Running);
                    step.ready.push(name);
                }
            }

            for name in blocked {
                if let Some(state) = self.stages.get_mut(&name) {
                    warn!(
                        stage = %state.name,
                        "dependencies can never be satisfied in this run; marking failed"
                    );
                    state.run_state = Some(RunState::DoneFailed);
                    step.blocked.push(name);
                }
            }
        }

        step
    }

    /// Dependency status of a pending stage for the *current run*.
    ///
    /// A dependency is satisfied if:
    /// - in this run its `run_state` is `DoneSuccess`, OR
    /// - it is not part of this run (`run_state == None`) **and** it has a
    ///   `last_successful_run` recorded.
    fn deps_status(&self, state: &StageState) -> DepStatus {
        let mut waiting = false;

        for dep_name in &state.deps {
            let dep = match self.stages.get(dep_name) {
                Some(d) => d,
                None => {
                    // Should not happen since config is validated.
                    warn!(stage = %state.name, dep = %dep_name, "dependency missing from stage map");
                    return DepStatus::Unsatisfiable;
                }
            };

            match dep.run_state {
                Some(RunState::DoneSuccess) => {}
                Some(RunState::DoneFailed) => return DepStatus::Unsatisfiable,
                Some(RunState::Pending) | Some(RunState::Running) => waiting = true,
                None => {
                    // Not part of this run; rely on history.
                    if dep.last_successful_run.is_none() {
                        return DepStatus::Unsatisfiable;
                    }
                }
            }
        }

        if waiting {
            DepStatus::Waiting
        } else {
            DepStatus::Satisfied
        }
    }

    /// Mark all *triggered* dependents (and their transitively triggered
    /// dependents) of a failed stage as `DoneFailed` for this run.
    fn mark_dependents_failed(&mut self, failed_stage: &str) {
        let mut stack: Vec<StageName> = self
            .graph
            .dependents_of(failed_stage)
            .to_vec();

        while let Some(name) = stack.pop() {
            if let Some(state) = self.stages.get_mut(&name) {
                match state.run_state {
                    Some(RunState::Pending) | Some(RunState::Running) => {
                        state.run_state = Some(RunState::DoneFailed);
                        debug!(
                            stage = %state.name,
                            "marking dependent as DoneFailed due to upstream failure"
                        );
                        stack.extend(self.graph.dependents_of(&name).iter().cloned());
                    }
                    Some(RunState::DoneSuccess) | Some(RunState::DoneFailed) | None => {}
                }
            }
        }
    }
}
