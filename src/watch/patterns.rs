// src/watch/patterns.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::model::ConfigFile;
use crate::engine::StageName;

/// Compiled watch/exclude glob patterns for a single stage.
///
/// The patterns are relative to the source root; the watcher passes relative
/// paths (e.g. `"assets/sass/main.sass"`, forward slashes) into `matches`.
#[derive(Clone)]
pub struct WatchProfile {
    name: StageName,
    watch_set: GlobSet,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for WatchProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchProfile")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl WatchProfile {
    /// Name of the stage this profile belongs to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if this stage is interested in the given source-relative
    /// path.
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.watch_set.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

/// Build a compiled watch profile for each configured stage.
///
/// A stage watches its explicit `watch` globs when present, otherwise its
/// `input` globs; `exclude` applies in both cases.
pub fn build_watch_profiles(cfg: &ConfigFile) -> Result<Vec<WatchProfile>> {
    let mut profiles = Vec::with_capacity(cfg.stage.len());

    for (name, stage) in cfg.stage.iter() {
        let watch_set = build_globset(stage.effective_watch())
            .with_context(|| format!("building watch globset for stage {}", name))?;

        let exclude_set = if stage.exclude.is_empty() {
            None
        } else {
            Some(
                build_globset(&stage.exclude)
                    .with_context(|| format!("building exclude globset for stage {}", name))?,
            )
        };

        profiles.push(WatchProfile {
            name: name.clone(),
            watch_set,
            exclude_set,
        });
    }

    Ok(profiles)
}

/// Build a GlobSet from simple string patterns.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
