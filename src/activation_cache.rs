use ahash::RandomState;
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};

use crate::{
    any::{instance_address, Instance, WeakInstance},
    pruner::Prunable,
};

#[derive(Default)]
struct Seen {
    activated: HashMap<usize, WeakInstance, RandomState>,
    deactivated: HashMap<usize, WeakInstance, RandomState>,
}

fn contains(set: &HashMap<usize, WeakInstance, RandomState>, instance: &Instance) -> bool {
    set.get(&instance_address(instance)).is_some_and(|weak| weak.strong_count() > 0)
}

/// Identity sets of instances already activated or deactivated, so each is processed once
/// even when reached through several bindings. Entries never keep instances alive.
#[derive(Default)]
pub struct ActivationCache {
    seen: Mutex<Seen>,
}

impl ActivationCache {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_activated(&self, instance: &Instance) -> bool {
        contains(&self.seen.lock().activated, instance)
    }

    #[must_use]
    pub fn is_deactivated(&self, instance: &Instance) -> bool {
        contains(&self.seen.lock().deactivated, instance)
    }

    pub fn add_activated(&self, instance: &Instance) {
        self.seen
            .lock()
            .activated
            .insert(instance_address(instance), Arc::downgrade(instance));
    }

    pub fn add_deactivated(&self, instance: &Instance) {
        self.seen
            .lock()
            .deactivated
            .insert(instance_address(instance), Arc::downgrade(instance));
    }

    pub fn clear(&self) {
        let mut seen = self.seen.lock();
        seen.activated.clear();
        seen.deactivated.clear();
    }

    /// Number of tracked instances, dead or alive
    #[must_use]
    pub fn len(&self) -> usize {
        let seen = self.seen.lock();
        seen.activated.len() + seen.deactivated.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Prunable for ActivationCache {
    fn prune(&self) {
        let mut seen = self.seen.lock();
        seen.activated.retain(|_, weak| weak.strong_count() > 0);
        seen.deactivated.retain(|_, weak| weak.strong_count() > 0);
    }
}
