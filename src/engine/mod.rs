// src/engine/mod.rs

//! Orchestration engine for assetpipe.
//!
//! This module ties together:
//! - the stage DAG scheduler
//! - the rebuild queue (what happens when triggers arrive while a run is active)
//! - the stage executor
//! - the main runtime event loop that reacts to:
//!   - file-watch triggers
//!   - stage completion events
//!   - shutdown signals

pub mod executor;
pub mod queue;
pub mod runtime;

pub use executor::spawn_executor;
pub use queue::RebuildQueue;
pub use runtime::{
    RunReport, Runtime, RuntimeEvent, RuntimeOptions, StageName, StageOutcome, TriggerReason,
};
