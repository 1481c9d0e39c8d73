use ahash::RandomState;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};
use tracing::{debug, error};

use crate::{
    activation::{InstanceReference, Pipeline},
    any::{instance_address, Instance, TypeInfo},
    context::Context,
    pruner::Prunable,
    scope::{ScopeKey, WeakScopeKey},
};

struct CacheEntry {
    context: Arc<Context>,
    reference: InstanceReference,
    sequence: u64,
}

struct Bucket {
    scope: WeakScopeKey,
    entries: HashMap<TypeInfo, Vec<CacheEntry>, RandomState>,
}

impl Bucket {
    fn drain(self, removed: &mut Vec<CacheEntry>) {
        removed.extend(self.entries.into_values().flatten());
    }
}

#[derive(Default)]
struct State {
    buckets: HashMap<usize, Bucket, RandomState>,
    sequence: u64,
}

impl State {
    fn take_stale(&mut self) -> Vec<CacheEntry> {
        let stale: Vec<usize> = self
            .buckets
            .iter()
            .filter(|(_, bucket)| !bucket.scope.is_alive())
            .map(|(id, _)| *id)
            .collect();

        let mut removed = Vec::new();
        for id in stale {
            if let Some(bucket) = self.buckets.remove(&id) {
                bucket.drain(&mut removed);
            }
        }
        removed
    }
}

/// Scoped instances by scope key and implementation type.
/// Buckets never keep their scope key alive, entries of a released key are deactivated on the next sweep
/// or right away for keys able to notify.
pub struct ScopeCache {
    state: Mutex<State>,
    pipeline: Arc<Pipeline>,
    this: Weak<ScopeCache>,
}

impl ScopeCache {
    #[must_use]
    pub fn new(pipeline: Arc<Pipeline>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            state: Mutex::new(State::default()),
            pipeline,
            this: this.clone(),
        })
    }

    /// Gets the instance of `implementation` cached under `scope`.
    #[must_use]
    pub fn try_get(&self, implementation: &TypeInfo, scope: &ScopeKey) -> Option<InstanceReference> {
        let (stale, found) = {
            let mut state = self.state.lock();
            let stale = state.take_stale();
            let found = state
                .buckets
                .get(&scope.id())
                .and_then(|bucket| bucket.entries.get(implementation))
                .and_then(|entries| entries.last())
                .map(|entry| entry.reference.clone());
            (stale, found)
        };
        self.deactivate(stale);

        if found.is_some() {
            debug!(implementation = %implementation, scope = scope.label(), "Found in cache");
        }
        found
    }

    /// Caches an activated instance under `scope`.
    pub fn remember(&self, context: &Arc<Context>, reference: InstanceReference, scope: &ScopeKey) {
        let (stale, new_bucket) = {
            let mut state = self.state.lock();
            let stale = state.take_stale();
            state.sequence += 1;
            let entry = CacheEntry {
                context: context.clone(),
                reference,
                sequence: state.sequence,
            };

            let mut new_bucket = false;
            let bucket = state.buckets.entry(scope.id()).or_insert_with(|| {
                new_bucket = true;
                Bucket {
                    scope: scope.downgrade(),
                    entries: HashMap::default(),
                }
            });
            bucket.entries.entry(context.implementation).or_default().push(entry);
            (stale, new_bucket)
        };
        self.deactivate(stale);

        if new_bucket && scope.supports_notification() {
            let cache = self.this.clone();
            let subscribed = scope.subscribe(Box::new(move |id| {
                if let Some(cache) = cache.upgrade() {
                    cache.clear_scope_id(id);
                }
            }));
            if !subscribed {
                debug!(scope = scope.label(), "Scope already disposed");
                self.clear_scope_id(scope.id());
            }
        }
    }

    /// Deactivates and forgets a cached instance. Returns `false` if it isn't cached.
    pub fn release(&self, instance: &Instance) -> bool {
        self.release_address(instance_address(instance))
    }

    pub(crate) fn release_address(&self, address: usize) -> bool {
        let removed = {
            let mut state = self.state.lock();
            let mut removed = Vec::new();
            for bucket in state.buckets.values_mut() {
                for entries in bucket.entries.values_mut() {
                    if let Some(index) = entries
                        .iter()
                        .position(|entry| instance_address(&entry.reference.instance) == address)
                    {
                        removed.push(entries.remove(index));
                    }
                }
                bucket.entries.retain(|_, entries| !entries.is_empty());
            }
            removed
        };

        let released = !removed.is_empty();
        self.deactivate(removed);
        released
    }

    /// Deactivates and forgets every instance cached under `scope`.
    pub fn clear_scope(&self, scope: &ScopeKey) {
        self.clear_scope_id(scope.id());
    }

    pub(crate) fn clear_scope_id(&self, id: usize) {
        let bucket = self.state.lock().buckets.remove(&id);
        if let Some(bucket) = bucket {
            let mut removed = Vec::new();
            bucket.drain(&mut removed);
            self.deactivate(removed);
        }
    }

    /// Deactivates and forgets everything.
    pub fn clear(&self) {
        let buckets = core::mem::take(&mut self.state.lock().buckets);
        let mut removed = Vec::new();
        for (_, bucket) in buckets {
            bucket.drain(&mut removed);
        }
        self.deactivate(removed);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .buckets
            .values()
            .flat_map(|bucket| bucket.entries.values())
            .map(Vec::len)
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs outside the state lock: deactivation hooks and dropped instances may reenter the cache.
    fn deactivate(&self, mut removed: Vec<CacheEntry>) {
        removed.sort_by(|a, b| b.sequence.cmp(&a.sequence));
        for entry in removed {
            if let Err(err) = self.pipeline.deactivate(&entry.context, &entry.reference) {
                error!("{}", err);
            }
        }
    }
}

impl Prunable for ScopeCache {
    fn prune(&self) {
        let stale = self.state.lock().take_stale();
        if !stale.is_empty() {
            debug!(count = stale.len(), "Pruned");
        }
        self.deactivate(stale);
    }
}
