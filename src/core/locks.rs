use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::KindredError;
use crate::models::PairKey;

type Slot = Arc<AsyncMutex<()>>;

/// Per-pair mutual exclusion for match state mutations
///
/// Each canonical pair gets its own async mutex on first use. Slots are
/// dropped from the table once no holder or waiter references them, so the
/// table only ever holds pairs with in-flight mutations.
#[derive(Debug)]
pub struct PairLocks {
    slots: Mutex<HashMap<PairKey, Slot>>,
    acquire_timeout: Duration,
}

/// Scoped hold on one pair. Releases the pair when dropped.
#[derive(Debug)]
pub struct PairGuard<'a> {
    table: &'a PairLocks,
    key: PairKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl PairLocks {
    pub fn new(acquire_timeout: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            acquire_timeout,
        }
    }

    /// Wait for exclusive access to `key`, bounded by the acquire timeout
    pub async fn acquire(&self, key: &PairKey) -> Result<PairGuard<'_>, KindredError> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(slots.entry(key.clone()).or_default())
        };

        match tokio::time::timeout(self.acquire_timeout, slot.lock_owned()).await {
            Ok(guard) => Ok(PairGuard {
                table: self,
                key: key.clone(),
                guard: Some(guard),
            }),
            Err(_) => {
                self.prune(key);
                tracing::warn!("Timed out after {:?} waiting for pair lock {}", self.acquire_timeout, key);
                Err(KindredError::StorageTimeout(format!("pair {} is busy", key)))
            }
        }
    }

    /// Number of pairs currently held or awaited
    pub fn active(&self) -> usize {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    /// Drop the slot for `key` if nothing but the table references it
    fn prune(&self, key: &PairKey) {
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(slot) = slots.get(key) {
            if Arc::strong_count(slot) == 1 {
                slots.remove(key);
            }
        }
    }
}

impl PairGuard<'_> {
    pub fn key(&self) -> &PairKey {
        &self.key
    }
}

impl Drop for PairGuard<'_> {
    fn drop(&mut self) {
        // Release the mutex before pruning so the slot's count reflects only waiters
        drop(self.guard.take());
        self.table.prune(&self.key);
    }
}
