//! Asynchronous file remover worker (spec §4.5, C2).
//!
//! Grounded on `server/src/watch.rs`'s background-channel-consumer shape
//! (there: `std::thread::spawn` draining a `std::sync::mpsc::Receiver` of
//! filesystem events) — re-expressed with `tokio::spawn` and an unbounded
//! `tokio::sync::mpsc` channel so eviction never blocks the caller on disk
//! I/O. [`crate::lru::Lru`] sends a path the moment it evicts an entry; this
//! worker is the only place those paths are actually unlinked.

use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedReceiver;

/// Drains `rx` until the channel is closed, removing each path from disk.
/// A missing file is not an error — the cache entry may already have been
/// cleaned up by a prior run or a concurrent delete.
pub async fn run(mut rx: UnboundedReceiver<PathBuf>) {
    while let Some(path) = rx.recv().await {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => tracing::debug!(path = %path.display(), "removed evicted cache file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove evicted cache file"),
        }
    }
    tracing::debug!("file remover worker exiting: channel closed");
}

/// Spawns [`run`] as a detached task and returns its [`tokio::task::JoinHandle`]
/// so callers can await a clean shutdown after closing the sending half.
pub fn spawn(rx: UnboundedReceiver<PathBuf>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run(rx))
}
