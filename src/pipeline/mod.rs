// src/pipeline/mod.rs

//! Pipeline stages: the uniform adapter every transformation implements.
//!
//! A stage consumes a set of input files matched by its globs and emits a set
//! of output files under the output tree. Failure of one file is recorded in
//! the stage report and never prevents the remaining files from being
//! processed.
//!
//! - [`context`] holds the immutable source/output roots.
//! - [`spec`] compiles `[stage.<name>]` config into runnable stage specs.
//! - [`report`] is the per-run result of a stage.
//! - [`stages`] executes `copy` / `concat` stages.
//! - [`exec`] executes external-command stages.

pub mod context;
pub mod exec;
pub mod report;
pub mod spec;
pub mod stages;

pub use context::BuildContext;
pub use report::{FileFailure, StageReport};
pub use spec::{build_stage_specs, StageSpec};
pub use stages::run_stage;
