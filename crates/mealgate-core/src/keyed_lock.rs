//! A table of per-key async mutexes.
//!
//! Requests for the same key queue behind one another; requests for
//! different keys never contend. The table only holds weak references, so a
//! slot disappears once the last holder releases it.

use std::{
  collections::HashMap,
  hash::Hash,
  sync::{Arc, Mutex, PoisonError, Weak},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Held while the key is locked; dropping it releases the key.
pub type KeyGuard = OwnedMutexGuard<()>;

#[derive(Debug)]
pub struct KeyedLocks<K> {
  slots: Mutex<HashMap<K, Weak<AsyncMutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
  fn default() -> Self { Self { slots: Mutex::new(HashMap::new()) } }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
  pub fn new() -> Self { Self::default() }

  /// Wait until `key` is free and take it.
  pub async fn lock(&self, key: K) -> KeyGuard {
    let slot = {
      let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
      slots.retain(|_, weak| weak.strong_count() > 0);

      match slots.get(&key).and_then(Weak::upgrade) {
        Some(slot) => slot,
        None => {
          let slot = Arc::new(AsyncMutex::new(()));
          slots.insert(key, Arc::downgrade(&slot));
          slot
        }
      }
    };
    slot.lock_owned().await
  }

  /// Number of keys currently held or waited on.
  pub fn live_keys(&self) -> usize {
    let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
    slots.values().filter(|weak| weak.strong_count() > 0).count()
  }
}
