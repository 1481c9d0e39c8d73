use core::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use parking_lot::{Condvar, Mutex};
use std::{
    sync::{Arc, Weak},
    thread::{self, JoinHandle},
};
use tracing::{debug, warn};

use crate::scope::released_scopes;

/// A cache holding entries that can go stale.
pub trait Prunable: Send + Sync {
    /// Drops stale entries.
    fn prune(&self);
}

#[derive(Default)]
struct State {
    running: bool,
    handle: Option<JoinHandle<()>>,
}

struct PrunerInner {
    interval: Option<Duration>,
    caches: Mutex<Vec<Weak<dyn Prunable>>>,
    state: Mutex<State>,
    wake: Condvar,
    pruning: Mutex<()>,
    last_released: AtomicU64,
}

impl PrunerInner {
    fn prune_all(&self) {
        let caches: Vec<Arc<dyn Prunable>> = {
            let mut caches = self.caches.lock();
            caches.retain(|cache| cache.strong_count() > 0);
            caches.iter().filter_map(Weak::upgrade).collect()
        };
        for cache in caches {
            cache.prune();
        }
    }

    fn tick(&self) {
        let released = released_scopes();
        if self.last_released.swap(released, Ordering::AcqRel) == released {
            return;
        }

        let Some(_pruning) = self.pruning.try_lock() else {
            debug!("Previous pruning still running, tick skipped");
            return;
        };
        debug!("Pruning caches");
        self.prune_all();
    }

    fn run(&self, interval: Duration) {
        loop {
            {
                let mut state = self.state.lock();
                if !state.running {
                    break;
                }
                self.wake.wait_for(&mut state, interval);
                if !state.running {
                    break;
                }
            }
            self.tick();
        }
        debug!("Pruner stopped");
    }
}

/// Periodically drops cache entries whose scope was released.
/// A tick only sweeps when some scope key was released since the previous one.
#[derive(Clone)]
pub struct CachePruner {
    inner: Arc<PrunerInner>,
}

impl CachePruner {
    #[must_use]
    pub fn new(interval: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(PrunerInner {
                interval,
                caches: Mutex::new(Vec::new()),
                state: Mutex::new(State::default()),
                wake: Condvar::new(),
                pruning: Mutex::new(()),
                last_released: AtomicU64::new(released_scopes()),
            }),
        }
    }

    /// Registers a cache without keeping it alive.
    pub fn register(&self, cache: Weak<dyn Prunable>) {
        self.inner.caches.lock().push(cache);
    }

    /// Starts the background thread. Does nothing if it runs already or no interval is set.
    pub fn start(&self) {
        let Some(interval) = self.inner.interval else {
            return;
        };

        let mut state = self.inner.state.lock();
        if state.running {
            return;
        }
        state.running = true;

        let inner = self.inner.clone();
        match thread::Builder::new()
            .name(String::from("armory-pruner"))
            .spawn(move || inner.run(interval))
        {
            Ok(handle) => {
                state.handle = Some(handle);
                debug!(?interval, "Pruner started");
            }
            Err(err) => {
                state.running = false;
                warn!("Failed to start pruner: {}", err);
            }
        }
    }

    /// Stops the background thread and waits for it, unless called from that thread.
    pub fn stop(&self) {
        let handle = {
            let mut state = self.inner.state.lock();
            state.running = false;
            self.inner.wake.notify_all();
            state.handle.take()
        };

        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                warn!("Pruner thread panicked");
            }
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.state.lock().running
    }

    /// Sweeps every registered cache now, waiting for a running sweep to finish first.
    pub fn prune_now(&self) {
        let _pruning = self.inner.pruning.lock();
        self.inner.last_released.store(released_scopes(), Ordering::Release);
        self.inner.prune_all();
    }
}

#[cfg(test)]
mod tests {
    use super::{CachePruner, Prunable};
    use crate::scope::ScopeKey;

    use core::{
        sync::atomic::{AtomicU8, Ordering},
        time::Duration,
    };
    use std::{
        sync::{Arc, Weak},
        thread,
        time::Instant,
    };
    use tracing_test::traced_test;

    #[derive(Default)]
    struct Counter {
        prunes: AtomicU8,
    }

    impl Prunable for Counter {
        fn prune(&self) {
            self.prunes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    #[traced_test]
    fn test_prune_now() {
        let pruner = CachePruner::new(None);
        let counter = Arc::new(Counter::default());
        pruner.register(Arc::downgrade(&counter) as Weak<dyn Prunable>);

        pruner.prune_now();
        assert_eq!(counter.prunes.load(Ordering::SeqCst), 1);

        drop(counter);
        pruner.prune_now();
        assert!(pruner.inner.caches.lock().is_empty());
    }

    #[test]
    #[traced_test]
    fn test_start_without_interval_is_noop() {
        let pruner = CachePruner::new(None);

        pruner.start();
        assert!(!pruner.is_running());
        pruner.stop();
    }

    #[test]
    #[traced_test]
    fn test_background_tick_after_release() {
        let pruner = CachePruner::new(Some(Duration::from_millis(5)));
        let counter = Arc::new(Counter::default());
        pruner.register(Arc::downgrade(&counter) as Weak<dyn Prunable>);

        pruner.start();
        pruner.start();
        assert!(pruner.is_running());

        drop(ScopeKey::new("custom"));

        let deadline = Instant::now() + Duration::from_secs(5);
        while counter.prunes.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        pruner.stop();
        assert!(!pruner.is_running());
        assert!(counter.prunes.load(Ordering::SeqCst) >= 1);
    }
}
