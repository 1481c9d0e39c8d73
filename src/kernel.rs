use std::{
    sync::{Arc, Weak},
    vec,
};
use tracing::{debug, error, info_span};

use crate::{
    activation::{default_strategies, ActivationStrategy, InstanceReference, Pipeline},
    activation_cache::ActivationCache,
    any::{downcast_service, Instance, ServiceValue, TypeInfo},
    binding::{Binding, ScopeCallback},
    binding_resolver::ResolutionChain,
    cache::ScopeCache,
    context::Context,
    descriptor::{Catalog, Injectable, TypeDescriptor},
    errors::ResolveErrorKind,
    lock::KeyedLocks,
    parameter::Parameter,
    planner::{ConstructorDirective, Plan, Planner},
    pruner::{CachePruner, Prunable},
    registry::Registry,
    request::Request,
    scope::{thread_scope, ActivationScope, ScopeKey},
    scorer::{ConstructorScorer, StandardConstructorScorer},
    selector::{InjectionHeuristic, Selector, StandardInjectionHeuristic},
    settings::Settings,
};

/// An instance produced for one binding of a resolved request.
pub struct Activated {
    context: Arc<Context>,
    instance: Instance,
}

impl Activated {
    #[inline]
    #[must_use]
    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    #[inline]
    #[must_use]
    pub fn instance(&self) -> &Instance {
        &self.instance
    }
}

/// Lazy sequence of activations, one per surviving binding.
/// Each step constructs (or fetches from the cache) only when pulled.
pub struct Resolution<'a> {
    kernel: &'a Kernel,
    request: Arc<Request>,
    bindings: vec::IntoIter<Arc<Binding>>,
}

impl Resolution<'_> {
    #[inline]
    #[must_use]
    pub fn request(&self) -> &Arc<Request> {
        &self.request
    }
}

impl Iterator for Resolution<'_> {
    type Item = Result<Option<Activated>, ResolveErrorKind>;

    fn next(&mut self) -> Option<Self::Item> {
        let binding = self.bindings.next()?;
        Some(self.kernel.activate(&self.request, binding))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.bindings.size_hint()
    }
}

pub(crate) struct KernelInner {
    settings: Settings,
    registry: Registry,
    catalog: Catalog,
    chain: ResolutionChain,
    planner: Planner,
    scorer: Box<dyn ConstructorScorer>,
    pipeline: Arc<Pipeline>,
    cache: Arc<ScopeCache>,
    activation_cache: Arc<ActivationCache>,
    pruner: CachePruner,
    locks: KeyedLocks,
    singleton: ScopeKey,
}

impl KernelInner {
    fn dispose(&self) {
        self.pruner.stop();
        self.cache.clear();
        self.activation_cache.clear();
    }
}

impl Drop for KernelInner {
    fn drop(&mut self) {
        self.dispose();
        debug!("Kernel disposed on drop");
    }
}

/// Entry point of the engine: owns bindings, descriptors, caches and the pruner.
/// Clones share the same state. The last clone dropped disposes it.
#[derive(Clone)]
pub struct Kernel {
    inner: Arc<KernelInner>,
}

impl Kernel {
    #[inline]
    #[must_use]
    pub fn builder() -> KernelBuilder {
        KernelBuilder::default()
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    #[inline]
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    #[inline]
    #[must_use]
    pub fn planner(&self) -> &Planner {
        &self.inner.planner
    }

    #[inline]
    #[must_use]
    pub fn cache(&self) -> &Arc<ScopeCache> {
        &self.inner.cache
    }

    #[inline]
    #[must_use]
    pub fn activation_cache(&self) -> &Arc<ActivationCache> {
        &self.inner.activation_cache
    }

    #[inline]
    #[must_use]
    pub fn pruner(&self) -> &CachePruner {
        &self.inner.pruner
    }

    /// Key singleton-scoped instances are cached under
    #[inline]
    #[must_use]
    pub fn singleton_scope(&self) -> &ScopeKey {
        &self.inner.singleton
    }

    pub fn add_binding(&self, binding: impl Into<Binding>) -> Arc<Binding> {
        let binding = self.inner.registry.add(binding.into());
        debug!(binding = binding.describe(), "Binding added");
        binding
    }

    /// Removes every binding of `S`. Instances already cached stay cached.
    pub fn unbind<S: ?Sized + 'static>(&self) -> Vec<Arc<Binding>> {
        self.inner.registry.remove(&TypeInfo::of::<S>())
    }

    /// Opens an activation scope. Instances bound `in_activation_scope` and resolved through it
    /// are shared within it and deactivated when it ends.
    #[inline]
    #[must_use]
    pub fn begin_scope(&self) -> ActivationScope {
        ActivationScope::new(self.clone())
    }

    /// Gets an instance of `S`
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::NotResolvable`] if nothing can satisfy the request
    /// - Returns [`ResolveErrorKind::AmbiguousBinding`] if several bindings can
    /// - Returns any error raised while activating the instance or its dependencies
    pub fn get<S: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<S>, ResolveErrorKind> {
        self.get_with_request(Request::of::<S>())
    }

    /// Gets the instance of `S` bound with `name`
    #[allow(clippy::missing_errors_doc)]
    pub fn get_named<S: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Result<Arc<S>, ResolveErrorKind> {
        self.get_with_request(Request::of::<S>().named(name))
    }

    /// Gets an instance of `S`, supplying explicit parameters
    #[allow(clippy::missing_errors_doc)]
    pub fn get_with<S, I>(&self, parameters: I) -> Result<Arc<S>, ResolveErrorKind>
    where
        S: ?Sized + Send + Sync + 'static,
        I: IntoIterator<Item = Parameter>,
    {
        self.get_with_request(Request::of::<S>().with_parameters(parameters))
    }

    /// Gets an instance of `S`, or `None` if nothing can satisfy the request
    #[allow(clippy::missing_errors_doc)]
    pub fn try_get<S: ?Sized + Send + Sync + 'static>(&self) -> Result<Option<Arc<S>>, ResolveErrorKind> {
        self.try_get_with_request(Request::of::<S>().optional())
    }

    /// Gets an instance of every binding of `S`, in resolution order
    #[allow(clippy::missing_errors_doc)]
    pub fn get_all<S: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<S>>, ResolveErrorKind> {
        self.get_all_with_request(Request::of::<S>().multiple().optional())
    }

    /// # Errors
    /// - Returns [`ResolveErrorKind::ArgumentInvalid`] if the request isn't for `S`
    /// - Returns [`ResolveErrorKind::ProviderReturnedNothing`] if the request resolved to nothing
    /// - Returns any error of [`Kernel::get`]
    pub fn get_with_request<S: ?Sized + Send + Sync + 'static>(&self, request: Request) -> Result<Arc<S>, ResolveErrorKind> {
        let service = request.service;
        let path = request.path();
        match self.try_get_with_request(request)? {
            Some(value) => Ok(value),
            None => {
                let err = ResolveErrorKind::ProviderReturnedNothing { service, path };
                error!("{}", err);
                Err(err)
            }
        }
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn try_get_with_request<S: ?Sized + Send + Sync + 'static>(&self, request: Request) -> Result<Option<Arc<S>>, ResolveErrorKind> {
        let span = info_span!("get", service = request.service.short_name());
        let _guard = span.enter();

        check_service::<S>(&request)?;
        let mut resolution = self.resolve_request(Arc::new(request))?;
        match resolution.next() {
            Some(activated) => match activated? {
                Some(activated) => self.downcast::<S>(&activated).map(Some),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn get_all_with_request<S: ?Sized + Send + Sync + 'static>(&self, request: Request) -> Result<Vec<Arc<S>>, ResolveErrorKind> {
        let span = info_span!("get_all", service = request.service.short_name());
        let _guard = span.enter();

        check_service::<S>(&request)?;
        let mut values = Vec::new();
        for activated in self.resolve_request(Arc::new(request))? {
            if let Some(activated) = activated? {
                values.push(self.downcast::<S>(&activated)?);
            }
        }
        Ok(values)
    }

    /// Resolves a request lazily.
    /// Binding selection errors are returned right away, activation errors when the failing item is pulled.
    #[allow(clippy::missing_errors_doc)]
    pub fn resolve(&self, request: Request) -> Result<Resolution<'_>, ResolveErrorKind> {
        let span = info_span!("resolve", service = request.service.short_name());
        let _guard = span.enter();

        self.resolve_request(Arc::new(request))
    }

    /// Whether some binding, existing or implicit, could satisfy the request. Nothing is registered or built.
    #[must_use]
    pub fn can_resolve(&self, request: &Request) -> bool {
        self.inner
            .chain
            .resolve(&self.inner.registry, &self.inner.catalog, request, false)
            .iter()
            .any(|binding| request.matches(binding))
    }

    /// Deactivates a cached instance and drops it from the cache. Returns `false` if it isn't cached.
    pub fn release<S: ?Sized>(&self, instance: &Arc<S>) -> bool {
        self.inner
            .cache
            .release_address(Arc::as_ptr(instance).cast::<()>() as usize)
    }

    /// Deactivates every instance cached under `scope`.
    pub fn clear_scope(&self, scope: &ScopeKey) {
        self.inner.cache.clear_scope(scope);
    }

    /// Drops stale cache entries now instead of waiting for the pruner.
    pub fn prune(&self) {
        self.inner.pruner.prune_now();
    }

    /// Stops the pruner and deactivates every cached instance, most recent first.
    pub fn dispose(&self) {
        self.inner.dispose();
        debug!("Kernel disposed");
    }

    pub(crate) fn plan(&self, implementation: &TypeInfo) -> Arc<Plan> {
        self.inner.planner.get_plan(&self.inner.catalog, implementation)
    }

    pub(crate) fn score(&self, context: &Arc<Context>, directive: &ConstructorDirective) -> i64 {
        self.inner.scorer.score(self, context, directive)
    }

    pub(crate) fn resolve_request(&self, request: Arc<Request>) -> Result<Resolution<'_>, ResolveErrorKind> {
        let bindings = self.select_bindings(&request).inspect_err(|err| error!("{}", err))?;
        debug!(service = %request.service, count = bindings.len(), "Bindings selected");

        Ok(Resolution {
            kernel: self,
            request,
            bindings: bindings.into_iter(),
        })
    }

    /// Coerces an activated instance into a value of `service`.
    pub(crate) fn service_value(&self, activated: &Activated, service: &TypeInfo) -> Result<ServiceValue, ResolveErrorKind> {
        let context = &activated.context;
        let implementation = context.implementation;
        context
            .binding
            .caster(&implementation, service)
            .or_else(|| self.inner.catalog.caster(&implementation, service))
            .and_then(|caster| caster.cast(activated.instance.clone()))
            .ok_or_else(|| {
                let err = ResolveErrorKind::IncorrectType {
                    expected: *service,
                    actual: implementation,
                    path: context.request.path(),
                };
                error!("{}", err);
                err
            })
    }

    fn downcast<S: ?Sized + Send + Sync + 'static>(&self, activated: &Activated) -> Result<Arc<S>, ResolveErrorKind> {
        let service = TypeInfo::of::<S>();
        let value = self.service_value(activated, &service)?;
        downcast_service::<S>(&value).ok_or_else(|| ResolveErrorKind::IncorrectType {
            expected: service,
            actual: activated.context.implementation,
            path: activated.context.request.path(),
        })
    }

    fn select_bindings(&self, request: &Request) -> Result<Vec<Arc<Binding>>, ResolveErrorKind> {
        let mut bindings: Vec<Arc<Binding>> = self
            .inner
            .chain
            .resolve(&self.inner.registry, &self.inner.catalog, request, true)
            .into_iter()
            .filter(|binding| request.matches(binding))
            .collect();

        if request.unique && bindings.len() > 1 {
            if bindings.iter().any(|binding| binding.is_conditional()) {
                bindings.retain(|binding| binding.is_conditional());
            }
            if bindings.len() > 1 {
                let explicit: Vec<Arc<Binding>> = bindings.iter().filter(|binding| !binding.implicit).cloned().collect();
                if explicit.len() != 1 {
                    return Err(ResolveErrorKind::AmbiguousBinding {
                        service: request.service,
                        candidates: bindings.iter().map(|binding| binding.describe()).collect(),
                        path: request.path(),
                    });
                }
                bindings = explicit;
            }
        }

        if bindings.is_empty() && !request.optional {
            return Err(ResolveErrorKind::NotResolvable {
                service: request.service,
                path: request.path(),
            });
        }
        Ok(bindings)
    }

    fn scope_of(&self, context: &Context) -> Option<ScopeKey> {
        match &context.binding.scope {
            ScopeCallback::Transient => None,
            ScopeCallback::Singleton => Some(self.inner.singleton.clone()),
            ScopeCallback::Thread => Some(thread_scope()),
            ScopeCallback::Activation => context.request.activation_scope.as_ref().and_then(|scope| scope.upgrade()),
            ScopeCallback::Custom(scope) => scope(context),
        }
    }

    fn activate(&self, request: &Arc<Request>, binding: Arc<Binding>) -> Result<Option<Activated>, ResolveErrorKind> {
        self.activate_binding(request, binding).inspect_err(|err| error!("{}", err))
    }

    fn activate_binding(&self, request: &Arc<Request>, binding: Arc<Binding>) -> Result<Option<Activated>, ResolveErrorKind> {
        let implementation = binding.provider.implementation(&self.inner.catalog, request)?;
        let context = Arc::new(Context::new(request.clone(), binding, implementation)?);

        let scope = self.scope_of(&context);
        let _ = context.scope.set(scope.as_ref().map(ScopeKey::downgrade));

        if context.is_cyclical() {
            return Err(ResolveErrorKind::CyclicDependency {
                service: request.service,
                path: request.path(),
            });
        }

        let Some(scope) = scope else {
            return self.create_and_activate(context);
        };

        // An ancestor on this call chain holds the lock already
        let reentered = context.has_scoped_ancestor();
        let lock = (self.inner.settings.serialize_scoped_construction && !reentered)
            .then(|| self.inner.locks.get((implementation, scope.id())));
        let _construction = lock.as_ref().map(|lock| lock.lock());

        if let Some(reference) = self.inner.cache.try_get(&implementation, &scope) {
            let _ = context.instance.set(reference.instance.clone());
            return Ok(Some(Activated {
                context,
                instance: reference.instance,
            }));
        }
        if reentered {
            return Err(ResolveErrorKind::CyclicDependency {
                service: request.service,
                path: request.path(),
            });
        }
        debug!(implementation = %implementation, scope = scope.label(), "Not found in cache");

        let Some(reference) = self.create(&context)? else {
            return Ok(None);
        };
        self.inner.cache.remember(&context, reference.clone(), &scope);
        debug!("Cached");
        self.inner.pipeline.activate(&context, &reference)?;

        Ok(Some(Activated {
            context,
            instance: reference.instance,
        }))
    }

    fn create_and_activate(&self, context: Arc<Context>) -> Result<Option<Activated>, ResolveErrorKind> {
        let Some(reference) = self.create(&context)? else {
            return Ok(None);
        };
        self.inner.pipeline.activate(&context, &reference)?;

        Ok(Some(Activated {
            context,
            instance: reference.instance,
        }))
    }

    fn create(&self, context: &Arc<Context>) -> Result<Option<InstanceReference>, ResolveErrorKind> {
        let Some(instance) = context.binding.provider.create(self, context)? else {
            if self.inner.settings.allow_null_injection {
                debug!("Provider returned nothing");
                return Ok(None);
            }
            return Err(ResolveErrorKind::ProviderReturnedNothing {
                service: context.request.service,
                path: context.request.path(),
            });
        };

        let _ = context.instance.set(instance.clone());
        let descriptor = self.inner.catalog.get(&context.implementation).cloned();
        Ok(Some(InstanceReference::new(instance, descriptor)))
    }
}

fn check_service<S: ?Sized + 'static>(request: &Request) -> Result<(), ResolveErrorKind> {
    if request.service == TypeInfo::of::<S>() {
        return Ok(());
    }
    let err = ResolveErrorKind::ArgumentInvalid {
        argument: "request",
        reason: format!("request is for {}, but {} was asked for", request.service, TypeInfo::of::<S>()),
    };
    error!("{}", err);
    Err(err)
}

/// Composes a [`Kernel`]
#[derive(Default)]
pub struct KernelBuilder {
    settings: Settings,
    catalog: Catalog,
    bindings: Vec<Binding>,
    heuristics: Vec<Box<dyn InjectionHeuristic>>,
    scorer: Option<Box<dyn ConstructorScorer>>,
    strategies: Vec<Box<dyn ActivationStrategy>>,
    chain: Option<ResolutionChain>,
}

impl KernelBuilder {
    #[inline]
    #[must_use]
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    #[inline]
    #[must_use]
    pub fn describe(mut self, descriptor: TypeDescriptor) -> Self {
        self.catalog.describe(descriptor);
        self
    }

    #[inline]
    #[must_use]
    pub fn describe_type<T: Injectable>(self) -> Self {
        self.describe(T::describe())
    }

    #[inline]
    #[must_use]
    pub fn bind(mut self, binding: impl Into<Binding>) -> Self {
        self.bindings.push(binding.into());
        self
    }

    /// Adds a heuristic next to the standard one.
    #[inline]
    #[must_use]
    pub fn heuristic(mut self, heuristic: impl InjectionHeuristic + 'static) -> Self {
        self.heuristics.push(Box::new(heuristic));
        self
    }

    #[inline]
    #[must_use]
    pub fn scorer(mut self, scorer: impl ConstructorScorer + 'static) -> Self {
        self.scorer = Some(Box::new(scorer));
        self
    }

    /// Appends a strategy after the built-in ones.
    #[inline]
    #[must_use]
    pub fn strategy(mut self, strategy: impl ActivationStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    #[inline]
    #[must_use]
    pub fn resolution_chain(mut self, chain: ResolutionChain) -> Self {
        self.chain = Some(chain);
        self
    }

    #[must_use]
    pub fn build(self) -> Kernel {
        let Self {
            settings,
            catalog,
            bindings,
            heuristics,
            scorer,
            strategies,
            chain,
        } = self;

        let mut all_heuristics: Vec<Box<dyn InjectionHeuristic>> = vec![Box::new(StandardInjectionHeuristic::new(&settings))];
        all_heuristics.extend(heuristics);
        let planner = Planner::new(&settings, Selector::new(&settings, all_heuristics));

        let mut all_strategies = default_strategies();
        all_strategies.extend(strategies);
        let activation_cache = Arc::new(ActivationCache::new());
        let pipeline = Arc::new(Pipeline::new(
            all_strategies,
            activation_cache.clone(),
            settings.activation_cache_disabled,
        ));
        let cache = ScopeCache::new(pipeline.clone());

        let pruner = CachePruner::new(settings.cache_pruning_interval);
        pruner.register(Arc::downgrade(&cache) as Weak<dyn Prunable>);
        pruner.register(Arc::downgrade(&activation_cache) as Weak<dyn Prunable>);

        let registry = Registry::new();
        for binding in bindings {
            registry.add(binding);
        }

        let scorer = scorer.unwrap_or_else(|| Box::new(StandardConstructorScorer::new(settings.inject_marker)));
        let kernel = Kernel {
            inner: Arc::new(KernelInner {
                registry,
                catalog,
                chain: chain.unwrap_or_default(),
                planner,
                scorer,
                pipeline,
                cache,
                activation_cache,
                pruner,
                locks: KeyedLocks::new(),
                singleton: ScopeKey::new("singleton"),
                settings,
            }),
        };
        kernel.inner.pruner.start();
        debug!(bindings = kernel.inner.registry.len(), "Kernel built");

        kernel
    }
}
