//! Keyed async mutual exclusion.
//!
//! [`KeyedLocks`] hands out one mutex per key, so work on different ticket
//! types, orders or tickets proceeds in parallel while work on the same key is
//! serialized. Guards are owned and may be held across `.await`.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Idle slots are pruned once the table grows past this size.
const PRUNE_THRESHOLD: usize = 1024;

/// A table of per-key mutexes.
pub struct KeyedLocks<K> {
    slots: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash,
{
    /// Creates an empty lock table
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Waits for exclusive access to `key`.
    pub async fn lock(&self, key: K) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().await;
            if slots.len() >= PRUNE_THRESHOLD {
                // Only the table holds an idle slot: no guard, no waiter.
                slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            }
            Arc::clone(slots.entry(key).or_default())
        };
        slot.lock_owned().await
    }
}

impl<K> Default for KeyedLocks<K>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}
