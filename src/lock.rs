use ahash::RandomState;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use crate::any::TypeInfo;

const CLEANUP_THRESHOLD: usize = 64;

/// Implementation type and scope key id
pub(crate) type LockKey = (TypeInfo, usize);

/// One lock per key, alive while someone holds it.
/// Serializes the first construction of a scoped instance without blocking unrelated keys.
#[derive(Default)]
pub(crate) struct KeyedLocks {
    locks: Mutex<HashMap<LockKey, Weak<Mutex<()>>, RandomState>>,
}

impl KeyedLocks {
    #[inline]
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub(crate) fn get(&self, key: LockKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        if let Some(lock) = locks.get(&key).and_then(Weak::upgrade) {
            return lock;
        }

        if locks.len() >= CLEANUP_THRESHOLD {
            locks.retain(|_, lock| lock.strong_count() > 0);
        }

        let lock = Arc::new(Mutex::new(()));
        locks.insert(key, Arc::downgrade(&lock));
        lock
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().len()
    }
}
