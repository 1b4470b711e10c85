// src/dag/mod.rs

//! Stage DAG representation and scheduling.
//!
//! - [`graph`] holds a simple directed acyclic graph of stages.
//! - [`scheduler`] contains the per-run state machine that decides
//!   which stages are ready to run, and when dependents can be scheduled.

pub mod graph;
pub mod scheduler;

pub use graph::StageGraph;
pub use scheduler::{Scheduler, SchedulerStep};
