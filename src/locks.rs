//! Per-path async locks
//!
//! A watcher event and a workspace-scan task may touch the same file at the same
//! time. Every read → parse → commit cycle for a path runs under that path's lock so
//! the two never interleave; different paths proceed independently.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Dead slots are swept once the table grows past this many entries
const PRUNE_THRESHOLD: usize = 1024;

/// Table of lazily created, weakly held async mutexes keyed by path.
#[derive(Debug, Default)]
pub struct PathLocks {
    slots: Mutex<HashMap<PathBuf, Weak<AsyncMutex<()>>>>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `path`. The lock is released when the guard drops.
    pub async fn lock(&self, path: &Path) -> OwnedMutexGuard<()> {
        let slot = self.slot(path);
        slot.lock_owned().await
    }

    /// Number of paths currently locked or waited on
    pub fn active(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| slot.strong_count() > 0)
            .count()
    }

    fn slot(&self, path: &Path) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock();
        if let Some(existing) = slots.get(path).and_then(Weak::upgrade) {
            return existing;
        }
        if slots.len() >= PRUNE_THRESHOLD {
            slots.retain(|_, slot| slot.strong_count() > 0);
        }
        let fresh = Arc::new(AsyncMutex::new(()));
        slots.insert(path.to_path_buf(), Arc::downgrade(&fresh));
        fresh
    }
}
