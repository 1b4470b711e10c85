// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Compiling per-stage watch/exclude glob patterns.
//! - Wiring up a cross-platform filesystem watcher (`notify`).
//! - Debouncing event bursts (editor save-and-rename, bulk writes) into a
//!   single trigger batch.
//! - Optional content fingerprinting to skip triggers when watched files
//!   haven't actually changed.
//!
//! It does **not** know about the DAG or stage dependencies; it only turns
//! filesystem changes into stage-level triggers.

pub mod debounce;
pub mod fingerprint;
pub mod patterns;
pub mod watcher;

pub use debounce::spawn_debouncer;
pub use fingerprint::{stage_fingerprint, FingerprintCache};
pub use patterns::{build_watch_profiles, WatchProfile};
pub use watcher::{spawn_watcher, WatcherHandle};
