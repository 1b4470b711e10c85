// src/errors.rs

//! Crate-wide error taxonomy.
//!
//! Startup problems (`Config`, `Watch`) are fatal and make the process exit
//! non-zero. `Transform` is recorded per file inside a stage report and never
//! aborts sibling files. `Io` aborts the stage it occurred in.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("stage '{stage}' failed on {file:?}: {reason}")]
    Transform {
        stage: String,
        file: PathBuf,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
