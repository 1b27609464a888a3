//! Async locks keyed by string, created on demand and dropped once unused.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
pub(crate) struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Held while the keyed section runs; releasing it prunes the map entry when
/// no one else is waiting on the same key.
pub(crate) struct KeyedGuard<'a> {
    owner: &'a KeyedLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyedLocks {
    pub(crate) async fn lock(&self, key: &str) -> KeyedGuard<'_> {
        let lock = match self.locks.lock() {
            Ok(mut map) => Arc::clone(map.entry(key.to_owned()).or_default()),
            // A poisoned map only loses serialisation, never data.
            Err(_) => Arc::new(AsyncMutex::new(())),
        };
        KeyedGuard {
            owner: self,
            key: key.to_owned(),
            guard: Some(lock.lock_owned().await),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks.lock().map(|m| m.len()).unwrap_or(0)
    }
}

impl Drop for KeyedGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        if let Ok(mut map) = self.owner.locks.lock() {
            if map.get(&self.key).is_some_and(|l| Arc::strong_count(l) == 1) {
                map.remove(&self.key);
            }
        }
    }
}
