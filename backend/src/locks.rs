//! Per-poll mutual exclusion.
//!
//! Each poll id maps to one async mutex that is created on first use and
//! evicted again once nobody holds or waits on it. The map itself sits behind
//! a short-lived std mutex; handing out a lock and evicting one both happen
//! under it, so two callers can never end up on different lock instances for
//! the same id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OwnedMutexGuard;
use tracing::trace;

type LockMap = HashMap<String, Arc<tokio::sync::Mutex<()>>>;

#[derive(Debug, Clone, Default)]
pub struct LockRegistry {
    entries: Arc<Mutex<LockMap>>,
}

/// Exclusive hold on one poll id. Released on drop.
#[derive(Debug)]
pub struct PollLock {
    id: String,
    guard: Option<OwnedMutexGuard<()>>,
    entries: Arc<Mutex<LockMap>>,
}

fn lock_map(entries: &Mutex<LockMap>) -> MutexGuard<'_, LockMap> {
    // The map is only ever touched by entry/remove calls that cannot leave it
    // half-updated, so a poisoned guard is still consistent.
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes `id` when only the map's own reference is left: no holder, no waiter.
fn evict_if_idle(entries: &mut LockMap, id: &str) -> bool {
    let idle = entries
        .get(id)
        .is_some_and(|lock| Arc::strong_count(lock) == 1);
    if idle {
        entries.remove(id);
    }
    idle
}

/// Armed while an `acquire` call is queued. If that call is dropped before it
/// gets the lock, the entry it was keeping alive may have become idle.
struct Waiting<'a> {
    id: &'a str,
    entries: &'a Mutex<LockMap>,
    armed: bool,
}

impl Drop for Waiting<'_> {
    fn drop(&mut self) {
        if self.armed {
            let evicted = evict_if_idle(&mut lock_map(self.entries), self.id);
            trace!(poll_id = self.id, evicted, "abandoned poll lock wait");
        }
    }
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until the caller is the only holder for `id`. No timeout.
    pub async fn acquire(&self, id: &str) -> PollLock {
        let lock = {
            let mut entries = lock_map(&self.entries);
            Arc::clone(entries.entry(id.to_string()).or_default())
        };

        // Declared before the wait so it drops after the pending future has
        // released its reference.
        let mut waiting = Waiting { id, entries: &self.entries, armed: true };
        let guard = lock.lock_owned().await;
        waiting.armed = false;
        trace!(poll_id = id, "acquired poll lock");

        PollLock {
            id: id.to_string(),
            guard: Some(guard),
            entries: Arc::clone(&self.entries),
        }
    }

    /// Number of ids that currently have a holder or a waiter.
    pub fn len(&self) -> usize {
        lock_map(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PollLock {
    pub fn poll_id(&self) -> &str {
        &self.id
    }
}

impl Drop for PollLock {
    fn drop(&mut self) {
        let mut entries = lock_map(&self.entries);
        self.guard.take();
        let idle = evict_if_idle(&mut entries, &self.id);
        trace!(poll_id = %self.id, evicted = idle, "released poll lock");
    }
}
