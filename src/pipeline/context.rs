// src/pipeline/context.rs

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::config::model::ConfigFile;

/// Immutable source/output roots shared read-only by all stages.
///
/// Constructed once at startup; relative `source_dir` / `out_dir` from the
/// config are resolved against the directory containing the config file, so
/// `assetpipe` behaves the same regardless of the current working directory.
#[derive(Debug, Clone)]
pub struct BuildContext {
    source_dir: PathBuf,
    out_dir: PathBuf,
}

impl BuildContext {
    /// Build a context from a validated config and the path of the config
    /// file it was loaded from.
    pub fn from_config(cfg: &ConfigFile, config_path: &Path) -> Result<Self> {
        let root = config_root_dir(config_path);
        let source_dir = root.join(&cfg.project.source_dir);
        let out_dir = root.join(&cfg.project.out_dir);

        Ok(Self {
            source_dir,
            out_dir,
        })
    }

    /// Check that the source tree exists; `build` and `watch` call this
    /// before doing anything, `clean` does not need a source tree.
    pub fn ensure_source_exists(&self) -> Result<()> {
        if !self.source_dir.is_dir() {
            anyhow::bail!(
                "source directory {:?} does not exist or is not a directory",
                self.source_dir
            );
        }
        Ok(())
    }

    /// Construct a context from explicit roots (used by tests).
    pub fn new(source_dir: impl Into<PathBuf>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            out_dir: out_dir.into(),
        }
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Recursively delete the output tree.
    ///
    /// Missing output directory is not an error; `clean` on a fresh checkout
    /// is a no-op.
    pub fn clean(&self) -> Result<()> {
        if self.out_dir.exists() {
            std::fs::remove_dir_all(&self.out_dir)
                .with_context(|| format!("removing output tree at {:?}", self.out_dir))?;
            info!(out_dir = ?self.out_dir, "output tree removed");
        }
        Ok(())
    }
}

/// Directory containing the config file, or `.`.
fn config_root_dir(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}
