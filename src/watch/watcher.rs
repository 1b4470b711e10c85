// src/watch/watcher.rs

use std::collections::HashMap;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::{RuntimeEvent, StageName, TriggerReason};
use crate::errors::Result;
use crate::pipeline::{BuildContext, StageSpec};
use crate::watch::debounce::spawn_debouncer;
use crate::watch::fingerprint::FingerprintCache;
use crate::watch::patterns::WatchProfile;

/// Handle for the filesystem watcher.
///
/// This exists mainly so the underlying `RecommendedWatcher` is kept alive
/// for as long as needed. Dropping this handle stops file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Spawn a filesystem watcher observing the source root recursively.
///
/// Raw events flow through the debouncer; each flushed batch is matched
/// against the per-stage watch profiles and produces at most one
/// `RuntimeEvent::RunRequested` covering all matched stages.
///
/// Failure to *start* the watcher is fatal and returned to the caller; errors
/// during a running session are logged and the session continues.
pub fn spawn_watcher(
    ctx: Arc<BuildContext>,
    profiles: Vec<WatchProfile>,
    specs: Arc<HashMap<StageName, StageSpec>>,
    debounce_window: Duration,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> Result<WatcherHandle> {
    let root = ctx.source_dir().to_path_buf();
    // Notify reports canonical paths on some platforms; match that.
    let root = root.canonicalize().unwrap_or(root);

    // Channel from the blocking notify callback into the async world.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<PathBuf>();

    // Closure called synchronously by notify whenever an event arrives.
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for path in event.paths {
                    if let Err(err) = event_tx.send(path) {
                        // Receiver side shut down; nothing left to forward to.
                        eprintln!("assetpipe: failed to forward notify event: {err}");
                    }
                }
            }
            Err(err) => {
                eprintln!("assetpipe: file watch error: {err}");
            }
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;

    info!("file watcher started on {:?}", root);

    // Debounce raw events into batches.
    let (batch_tx, mut batch_rx) = mpsc::channel::<Vec<PathBuf>>(16);
    spawn_debouncer(event_rx, batch_tx, debounce_window);

    // Async task that turns debounced batches into stage triggers.
    tokio::spawn(async move {
        let mut fingerprints = FingerprintCache::new();

        while let Some(batch) = batch_rx.recv().await {
            let mut stages = Vec::new();

            for stage in stages_for_batch(&root, &batch, &profiles) {
                if let Some(spec) = specs.get(&stage) {
                    if spec.fingerprint && !fingerprints.changed(spec, &ctx) {
                        info!(stage = %stage, "watched content unchanged; skipping trigger");
                        continue;
                    }
                }
                stages.push(stage);
            }

            if stages.is_empty() {
                continue;
            }

            // One batch -> one run request, so stages sharing a dependent
            // stay in the same run.
            debug!(?stages, "watch match -> requesting run");
            if let Err(err) = runtime_tx
                .send(RuntimeEvent::RunRequested {
                    stages,
                    reason: TriggerReason::FileWatch,
                })
                .await
            {
                warn!("failed to send RuntimeEvent::RunRequested: {err}");
                // Runtime channel closed; no point keeping the loop alive.
                return;
            }
        }

        debug!("file watcher loop ended");
    });

    Ok(WatcherHandle { _inner: watcher })
}

/// Match every path in a debounced batch against the profiles, returning the
/// distinct set of stages to trigger (sorted for deterministic ordering).
fn stages_for_batch(
    root: &Path,
    batch: &[PathBuf],
    profiles: &[WatchProfile],
) -> Vec<StageName> {
    let mut matched: HashSet<StageName> = HashSet::new();

    for path in batch {
        let rel_str = match relative_str(root, path) {
            Some(s) => s,
            None => {
                debug!(
                    "ignoring event path {:?} outside watch root {:?}",
                    path, root
                );
                continue;
            }
        };

        for profile in profiles {
            if profile.matches(&rel_str) {
                matched.insert(profile.name().to_string());
            }
        }
    }

    let mut stages: Vec<StageName> = matched.into_iter().collect();
    stages.sort();
    stages
}

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Returns `None` if the path is not under `root` and cannot be relativized.
fn relative_str(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let s = rel.to_string_lossy().replace('\\', "/");
    Some(s)
}
