use std::sync::Arc;
use tracing::debug;

use crate::{binding::Binding, descriptor::Catalog, registry::Registry, request::Request};

/// Source of candidate bindings for a request.
pub trait BindingResolver: Send + Sync {
    fn resolve(&self, registry: &Registry, catalog: &Catalog, request: &Request) -> Vec<Arc<Binding>>;
}

/// Fallback creating bindings when no resolver found any.
pub trait MissingBindingResolver: Send + Sync {
    fn resolve(&self, catalog: &Catalog, request: &Request) -> Vec<Binding>;

    /// Whether created bindings are registered for later requests.
    fn persist(&self) -> bool {
        true
    }
}

/// Bindings registered for the requested service.
pub struct StandardBindingResolver;

impl BindingResolver for StandardBindingResolver {
    fn resolve(&self, registry: &Registry, _catalog: &Catalog, request: &Request) -> Vec<Arc<Binding>> {
        registry.get(&request.service)
    }
}

/// Bindings registered for the open generic definition of a closed requested service.
pub struct OpenGenericBindingResolver;

impl BindingResolver for OpenGenericBindingResolver {
    fn resolve(&self, registry: &Registry, catalog: &Catalog, request: &Request) -> Vec<Arc<Binding>> {
        match catalog.get(&request.service).and_then(|descriptor| descriptor.generic()) {
            Some(generic) if !generic.is_open() && generic.definition != request.service => registry.get(&generic.definition),
            _ => Vec::new(),
        }
    }
}

/// Auto-bindable bindings of other services whose implementation is assignable to the requested one.
pub struct ImpliedBindingResolver;

impl BindingResolver for ImpliedBindingResolver {
    fn resolve(&self, registry: &Registry, catalog: &Catalog, request: &Request) -> Vec<Arc<Binding>> {
        registry
            .auto_bindable()
            .into_iter()
            .filter(|binding| binding.service != request.service)
            .filter(|binding| {
                binding
                    .provider
                    .implementation(catalog, request)
                    .is_ok_and(|implementation| catalog.is_assignable(&implementation, &request.service))
            })
            .collect()
    }
}

/// Binds a self-bindable concrete type to itself.
pub struct SelfBindingResolver;

impl MissingBindingResolver for SelfBindingResolver {
    fn resolve(&self, catalog: &Catalog, request: &Request) -> Vec<Binding> {
        if catalog.is_self_bindable(&request.service) {
            vec![Binding::self_binding(request.service)]
        } else {
            Vec::new()
        }
    }
}

/// Yields the declared default of the target. Tied to the target, so never registered.
pub struct DefaultValueBindingResolver;

impl MissingBindingResolver for DefaultValueBindingResolver {
    fn resolve(&self, _catalog: &Catalog, request: &Request) -> Vec<Binding> {
        request
            .target()
            .and_then(|target| target.default())
            .map(|default| vec![Binding::default_value(request.service, default)])
            .unwrap_or_default()
    }

    fn persist(&self) -> bool {
        false
    }
}

/// Ordered resolvers consulted for candidate bindings, with fallbacks for when none are found.
pub struct ResolutionChain {
    resolvers: Vec<Box<dyn BindingResolver>>,
    missing: Vec<Box<dyn MissingBindingResolver>>,
}

impl Default for ResolutionChain {
    fn default() -> Self {
        Self {
            resolvers: vec![
                Box::new(StandardBindingResolver),
                Box::new(OpenGenericBindingResolver),
                Box::new(ImpliedBindingResolver),
            ],
            missing: vec![Box::new(SelfBindingResolver), Box::new(DefaultValueBindingResolver)],
        }
    }
}

impl ResolutionChain {
    #[inline]
    #[must_use]
    pub fn new(resolvers: Vec<Box<dyn BindingResolver>>, missing: Vec<Box<dyn MissingBindingResolver>>) -> Self {
        Self { resolvers, missing }
    }

    /// Candidate bindings for a request, in resolver order then registration order.
    /// When `persist` is `false` fallback bindings are created but not registered.
    #[must_use]
    pub fn resolve(&self, registry: &Registry, catalog: &Catalog, request: &Request, persist: bool) -> Vec<Arc<Binding>> {
        let mut bindings: Vec<Arc<Binding>> = Vec::new();
        for resolver in &self.resolvers {
            for binding in resolver.resolve(registry, catalog, request) {
                if !bindings.iter().any(|existing| Arc::ptr_eq(existing, &binding)) {
                    bindings.push(binding);
                }
            }
        }
        if !bindings.is_empty() {
            return bindings;
        }

        for resolver in &self.missing {
            let created = resolver.resolve(catalog, request);
            if created.is_empty() {
                continue;
            }
            return if persist && resolver.persist() {
                debug!(service = %request.service, "Implicit binding registered");
                registry.add_missing(request.service, created)
            } else {
                created.into_iter().map(Arc::new).collect()
            };
        }
        Vec::new()
    }
}
