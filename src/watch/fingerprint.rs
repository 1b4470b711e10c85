// src/watch/fingerprint.rs

//! Content fingerprinting for watch triggers.
//!
//! When a stage opts in (`fingerprint = true`), a trigger is skipped if the
//! aggregate hash over the stage's current input set matches the last run.
//! This avoids rebuilds for touch-only events (mtime bumps, editor swap
//! files matched too broadly).

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::debug;

use crate::engine::StageName;
use crate::pipeline::{BuildContext, StageSpec};

/// Compute a deterministic hash over the contents of a stage's input files.
///
/// `collect_inputs` returns sorted paths, so the hash is stable independent
/// of directory iteration order.
pub fn stage_fingerprint(spec: &StageSpec, ctx: &BuildContext) -> Result<String> {
    let mut hasher = Hasher::new();

    for rel in spec.collect_inputs(ctx)? {
        let path = ctx.source_dir().join(&rel);
        // Path bytes participate too: a rename with identical content still
        // changes the output layout.
        hasher.update(rel.to_string_lossy().as_bytes());

        let mut file =
            File::open(&path).with_context(|| format!("opening file for hashing: {:?}", path))?;
        let mut buf = [0u8; 8192];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
    }

    let hash = hasher.finalize().to_hex().to_string();
    debug!(stage = %spec.name, hash = %hash, "computed stage fingerprint");
    Ok(hash)
}

/// In-memory store of the last-seen fingerprint per stage.
///
/// The process owns the output directory for its lifetime, so there is no
/// need to persist fingerprints across sessions.
#[derive(Debug, Default)]
pub struct FingerprintCache {
    seen: HashMap<StageName, String>,
}

impl FingerprintCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the stage's inputs changed since the last check (or
    /// were never seen), updating the stored fingerprint.
    ///
    /// Hashing errors count as "changed": better to rebuild once too often
    /// than to miss a change.
    pub fn changed(&mut self, spec: &StageSpec, ctx: &BuildContext) -> bool {
        let fresh = match stage_fingerprint(spec, ctx) {
            Ok(h) => h,
            Err(err) => {
                debug!(stage = %spec.name, error = %err, "fingerprint failed; treating as changed");
                self.seen.remove(&spec.name);
                return true;
            }
        };

        match self.seen.insert(spec.name.clone(), fresh.clone()) {
            Some(old) if old == fresh => false,
            _ => true,
        }
    }
}
