//! Per-directory advisory locks
//!
//! Serializes ingestion and processing of the same batch within one process.
//! Locks are keyed by directory path and dropped from the registry once no
//! caller holds or waits on them.

use dashmap::DashMap;
use lazy_static::lazy_static;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

lazy_static! {
    static ref DIR_LOCKS: DashMap<PathBuf, Arc<Mutex<()>>> = DashMap::new();
}

/// Run `f` while holding the lock for `dir`
pub fn with_dir_lock<T>(dir: &Path, f: impl FnOnce() -> T) -> T {
    let key = dir.to_path_buf();
    let lock = Arc::clone(
        DIR_LOCKS
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value(),
    );

    let result = {
        // Guarded state lives on disk, so a poisoned mutex is still usable
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        debug!(dir = %dir.display(), "dir_lock_acquired");
        f()
    };

    drop(lock);
    // Only the registry holds it now; waiters keep their own clone
    DIR_LOCKS.remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
    result
}
