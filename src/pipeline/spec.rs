// src/pipeline/spec.rs

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::model::{ConfigFile, StageKind};
use crate::engine::StageName;
use crate::pipeline::context::BuildContext;

/// Compiled, runnable form of a `[stage.<name>]` section.
///
/// Globsets are compiled once at startup; specs are immutable for the process
/// lifetime and cheap to clone (the globsets are internally shared).
#[derive(Clone)]
pub struct StageSpec {
    pub name: StageName,
    pub kind: StageKind,
    pub base: String,
    pub dest: String,
    pub ext: Option<String>,
    pub command: Option<String>,
    pub fingerprint: bool,
    input_set: GlobSet,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for StageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageSpec")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl StageSpec {
    /// Returns true if the given source-relative path (forward slashes) is
    /// part of this stage's input set.
    pub fn matches_input(&self, rel_path: &str) -> bool {
        if !self.input_set.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }

    /// Collect all files under the source root matching this stage's inputs,
    /// as source-relative paths, sorted for deterministic processing order.
    pub fn collect_inputs(&self, ctx: &BuildContext) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        walk_files(ctx.source_dir(), ctx.source_dir(), &mut |rel| {
            let rel_str = rel.to_string_lossy().replace('\\', "/");
            if self.matches_input(&rel_str) {
                found.push(rel.to_path_buf());
            }
        })?;
        found.sort();
        Ok(found)
    }

    /// Map a source-relative input path to its output path under `out_dir`.
    ///
    /// The `base` prefix is stripped, the remainder is joined under `dest`,
    /// and for `exec` stages the extension is rewritten when `ext` is set.
    pub fn output_path(&self, ctx: &BuildContext, rel_input: &Path) -> PathBuf {
        let stripped = if self.base.is_empty() {
            rel_input.to_path_buf()
        } else {
            rel_input
                .strip_prefix(&self.base)
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|_| rel_input.to_path_buf())
        };

        let mut out = ctx.out_dir().join(&self.dest).join(stripped);
        if let Some(ext) = &self.ext {
            out.set_extension(ext);
        }
        out
    }
}

/// Compile every configured stage into a [`StageSpec`], keyed by name.
pub fn build_stage_specs(cfg: &ConfigFile) -> Result<HashMap<StageName, StageSpec>> {
    let mut specs = HashMap::with_capacity(cfg.stage.len());

    for (name, stage) in cfg.stage.iter() {
        let input_set = build_globset(&stage.input)
            .with_context(|| format!("building input globset for stage {}", name))?;

        let exclude_set = if stage.exclude.is_empty() {
            None
        } else {
            Some(
                build_globset(&stage.exclude)
                    .with_context(|| format!("building exclude globset for stage {}", name))?,
            )
        };

        specs.insert(
            name.clone(),
            StageSpec {
                name: name.clone(),
                kind: stage.kind,
                base: stage.base.clone(),
                dest: stage.dest.clone(),
                ext: stage.ext.clone(),
                command: stage.command.clone(),
                fingerprint: stage.fingerprint,
                input_set,
                exclude_set,
            },
        );
    }

    Ok(specs)
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

/// Depth-first walk over regular files under `dir`, invoking the callback
/// with root-relative paths.
fn walk_files(root: &Path, dir: &Path, f: &mut impl FnMut(&Path)) -> Result<()> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("reading directory {:?}", dir))?;

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            walk_files(root, &path, f)?;
        } else if path.is_file() {
            if let Ok(rel) = path.strip_prefix(root) {
                f(rel);
            }
        }
    }
    Ok(())
}
