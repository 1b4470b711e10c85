// src/watch/debounce.rs

//! Debouncing of raw filesystem events.
//!
//! Editors produce bursts of events per logical save (write, rename,
//! metadata). The debouncer accumulates changed paths and flushes them as
//! one batch once no new event has arrived for the configured window, so
//! rapid successive saves trigger exactly one rebuild.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Spawn the debouncer task.
///
/// Reads raw changed paths from `events_rx` and writes coalesced batches to
/// `batch_tx`. The window restarts on every incoming event, so a batch
/// flushes `window` after the burst settles.
pub fn spawn_debouncer(
    mut events_rx: mpsc::UnboundedReceiver<PathBuf>,
    batch_tx: mpsc::Sender<Vec<PathBuf>>,
    window: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut pending: HashSet<PathBuf> = HashSet::new();
        let mut deadline: Option<Instant> = None;

        loop {
            let wake = deadline.unwrap_or_else(Instant::now);

            tokio::select! {
                maybe_path = events_rx.recv() => match maybe_path {
                    Some(path) => {
                        pending.insert(path);
                        deadline = Some(Instant::now() + window);
                    }
                    None => {
                        // Producer gone; flush whatever is left and stop.
                        if !pending.is_empty() {
                            let batch: Vec<PathBuf> = pending.drain().collect();
                            let _ = batch_tx.send(batch).await;
                        }
                        break;
                    }
                },
                _ = sleep_until(wake), if deadline.is_some() => {
                    deadline = None;
                    let batch: Vec<PathBuf> = pending.drain().collect();
                    debug!(paths = batch.len(), "debounce window elapsed; flushing batch");
                    if batch_tx.send(batch).await.is_err() {
                        break;
                    }
                }
            }
        }

        debug!("debouncer task ended");
    })
}
