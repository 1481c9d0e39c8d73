use core::{
    fmt::{self, Debug, Formatter},
    sync::atomic::{AtomicU64, Ordering},
};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::debug;

use crate::{errors::ResolveErrorKind, kernel::Kernel, parameter::Parameter, request::Request};

/// Count of scope keys released so far. The pruner compares it between ticks
/// and only sweeps caches when it moved.
static RELEASED_SCOPES: AtomicU64 = AtomicU64::new(0);

#[inline]
#[must_use]
pub(crate) fn released_scopes() -> u64 {
    RELEASED_SCOPES.load(Ordering::Acquire)
}

pub(crate) type ReleaseCallback = Box<dyn FnOnce(usize) + Send>;

#[derive(Default)]
struct Notifier {
    fired: bool,
    callbacks: Vec<ReleaseCallback>,
}

pub(crate) struct ScopeKeyInner {
    label: &'static str,
    notifier: Option<Mutex<Notifier>>,
}

impl ScopeKeyInner {
    #[inline]
    fn id(&self) -> usize {
        self as *const Self as usize
    }

    fn fire(&self) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        let callbacks = {
            let mut notifier = notifier.lock();
            notifier.fired = true;
            core::mem::take(&mut notifier.callbacks)
        };
        let id = self.id();
        for callback in callbacks {
            callback(id);
        }
    }
}

impl Drop for ScopeKeyInner {
    fn drop(&mut self) {
        RELEASED_SCOPES.fetch_add(1, Ordering::AcqRel);
        self.fire();
        debug!(label = self.label, "Scope released");
    }
}

/// Identity-compared object keying cached instances.
/// Entries cached under a key live exactly as long as the key is reachable from outside the cache.
#[derive(Clone)]
pub struct ScopeKey(Arc<ScopeKeyInner>);

impl ScopeKey {
    #[inline]
    #[must_use]
    pub fn new(label: &'static str) -> Self {
        Self(Arc::new(ScopeKeyInner { label, notifier: None }))
    }

    /// Key that notifies subscribed caches when it is disposed or released.
    #[inline]
    #[must_use]
    pub fn notifying(label: &'static str) -> Self {
        Self(Arc::new(ScopeKeyInner {
            label,
            notifier: Some(Mutex::new(Notifier::default())),
        }))
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> usize {
        self.0.id()
    }

    #[inline]
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.0.label
    }

    #[inline]
    #[must_use]
    pub fn downgrade(&self) -> WeakScopeKey {
        WeakScopeKey(Arc::downgrade(&self.0))
    }

    #[inline]
    #[must_use]
    pub fn supports_notification(&self) -> bool {
        self.0.notifier.is_some()
    }

    /// Registers a callback fired once when the key is disposed or released.
    /// Returns `false` if the key can't notify or has already fired, the callback is dropped then.
    pub(crate) fn subscribe(&self, callback: ReleaseCallback) -> bool {
        let Some(notifier) = &self.0.notifier else {
            return false;
        };
        let mut notifier = notifier.lock();
        if notifier.fired {
            return false;
        }
        notifier.callbacks.push(callback);
        true
    }

    /// Fires subscribed callbacks without waiting for the key to be released.
    pub(crate) fn dispose(&self) {
        self.0.fire();
    }
}

impl PartialEq for ScopeKey {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ScopeKey {}

impl Debug for ScopeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeKey")
            .field("label", &self.0.label)
            .field("id", &self.id())
            .finish()
    }
}

/// Non-owning handle to a [`ScopeKey`].
#[derive(Clone)]
pub struct WeakScopeKey(Weak<ScopeKeyInner>);

impl WeakScopeKey {
    #[inline]
    #[must_use]
    pub fn upgrade(&self) -> Option<ScopeKey> {
        self.0.upgrade().map(ScopeKey)
    }

    #[inline]
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> usize {
        self.0.as_ptr() as usize
    }
}

impl Debug for WeakScopeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakScopeKey")
            .field("id", &self.id())
            .field("alive", &self.is_alive())
            .finish()
    }
}

thread_local! {
    static THREAD_SCOPE: ScopeKey = ScopeKey::new("thread");
}

/// Key of the calling thread, released when the thread exits.
#[inline]
#[must_use]
pub fn thread_scope() -> ScopeKey {
    THREAD_SCOPE.with(Clone::clone)
}

/// Explicitly owned scope. Instances bound `in_activation_scope` and resolved through it
/// are cached under its key and deactivated when it is disposed or dropped.
pub struct ActivationScope {
    kernel: Kernel,
    key: ScopeKey,
}

impl ActivationScope {
    #[inline]
    #[must_use]
    pub(crate) fn new(kernel: Kernel) -> Self {
        Self {
            kernel,
            key: ScopeKey::notifying("activation"),
        }
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> &ScopeKey {
        &self.key
    }

    #[inline]
    #[must_use]
    pub fn request<S: ?Sized + 'static>(&self) -> Request {
        Request::of::<S>().in_activation_scope(self.key.downgrade())
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn get<S: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<S>, ResolveErrorKind> {
        self.kernel.get_with_request(self.request::<S>())
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn get_with<S, I>(&self, parameters: I) -> Result<Arc<S>, ResolveErrorKind>
    where
        S: ?Sized + Send + Sync + 'static,
        I: IntoIterator<Item = Parameter>,
    {
        self.kernel.get_with_request(self.request::<S>().with_parameters(parameters))
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn try_get<S: ?Sized + Send + Sync + 'static>(&self) -> Result<Option<Arc<S>>, ResolveErrorKind> {
        self.kernel.try_get_with_request(self.request::<S>().optional())
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn get_all<S: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<S>>, ResolveErrorKind> {
        self.kernel.get_all_with_request(self.request::<S>().multiple().optional())
    }

    /// Deactivates and forgets every instance cached under this scope.
    pub fn dispose(&self) {
        self.key.dispose();
    }
}

impl Drop for ActivationScope {
    fn drop(&mut self) {
        self.dispose();
        debug!("Activation scope disposed on drop");
    }
}
