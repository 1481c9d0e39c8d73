use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    activation_cache::ActivationCache,
    any::{Instance, TypeInfo},
    context::Context,
    descriptor::{Hook, TypeDescriptor},
    errors::{ActivationErrorKind, ResolveErrorKind},
};

/// Hook run once right after an instance is created.
pub trait Initializable {
    #[allow(clippy::missing_errors_doc)]
    fn initialize(&self) -> anyhow::Result<()>;
}

/// Hooks run after initialization and on deactivation.
pub trait Startable {
    #[allow(clippy::missing_errors_doc)]
    fn start(&self) -> anyhow::Result<()>;

    #[allow(clippy::missing_errors_doc)]
    fn stop(&self) -> anyhow::Result<()>;
}

/// Hook run when an instance leaves its scope.
pub trait Disposable {
    #[allow(clippy::missing_errors_doc)]
    fn dispose(&self) -> anyhow::Result<()>;
}

/// An instance paired with the descriptor of its implementation type.
#[derive(Clone)]
pub struct InstanceReference {
    pub(crate) instance: Instance,
    pub(crate) descriptor: Option<Arc<TypeDescriptor>>,
}

impl InstanceReference {
    #[inline]
    #[must_use]
    pub fn new(instance: Instance, descriptor: Option<Arc<TypeDescriptor>>) -> Self {
        Self { instance, descriptor }
    }

    #[inline]
    #[must_use]
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    #[inline]
    #[must_use]
    pub fn is<T: 'static>(&self) -> bool {
        self.instance.is::<T>()
    }

    #[inline]
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.instance.downcast_ref::<T>()
    }
}

/// A step of activation and deactivation.
pub trait ActivationStrategy: Send + Sync {
    #[allow(clippy::missing_errors_doc)]
    fn activate(&self, _context: &Context, _reference: &InstanceReference) -> Result<(), ActivationErrorKind> {
        Ok(())
    }

    #[allow(clippy::missing_errors_doc)]
    fn deactivate(&self, _context: &Context, _reference: &InstanceReference) -> Result<(), ActivationErrorKind> {
        Ok(())
    }
}

fn run_hook(hook: Option<&Hook>, reference: &InstanceReference, error: fn(anyhow::Error) -> ActivationErrorKind) -> Result<(), ActivationErrorKind> {
    match hook {
        Some(hook) => hook(&reference.instance).map_err(error),
        None => Ok(()),
    }
}

pub struct InitializableStrategy;

impl ActivationStrategy for InitializableStrategy {
    fn activate(&self, _context: &Context, reference: &InstanceReference) -> Result<(), ActivationErrorKind> {
        let hook = reference.descriptor.as_ref().and_then(|descriptor| descriptor.hooks.initialize.as_ref());
        run_hook(hook, reference, ActivationErrorKind::Initialize)
    }
}

pub struct StartableStrategy;

impl ActivationStrategy for StartableStrategy {
    fn activate(&self, _context: &Context, reference: &InstanceReference) -> Result<(), ActivationErrorKind> {
        let hook = reference.descriptor.as_ref().and_then(|descriptor| descriptor.hooks.start.as_ref());
        run_hook(hook, reference, ActivationErrorKind::Start)
    }

    fn deactivate(&self, _context: &Context, reference: &InstanceReference) -> Result<(), ActivationErrorKind> {
        let hook = reference.descriptor.as_ref().and_then(|descriptor| descriptor.hooks.stop.as_ref());
        run_hook(hook, reference, ActivationErrorKind::Stop)
    }
}

/// Runs the activation and deactivation actions of the binding.
pub struct BindingActionStrategy;

impl ActivationStrategy for BindingActionStrategy {
    fn activate(&self, context: &Context, reference: &InstanceReference) -> Result<(), ActivationErrorKind> {
        for action in &context.binding.on_activation {
            action(context, &reference.instance).map_err(ActivationErrorKind::Action)?;
        }
        Ok(())
    }

    fn deactivate(&self, context: &Context, reference: &InstanceReference) -> Result<(), ActivationErrorKind> {
        for action in &context.binding.on_deactivation {
            action(context, &reference.instance).map_err(ActivationErrorKind::Action)?;
        }
        Ok(())
    }
}

pub struct DisposableStrategy;

impl ActivationStrategy for DisposableStrategy {
    fn deactivate(&self, _context: &Context, reference: &InstanceReference) -> Result<(), ActivationErrorKind> {
        let hook = reference.descriptor.as_ref().and_then(|descriptor| descriptor.hooks.dispose.as_ref());
        run_hook(hook, reference, ActivationErrorKind::Dispose)
    }
}

/// Built-in strategies in the order they run.
#[must_use]
pub fn default_strategies() -> Vec<Box<dyn ActivationStrategy>> {
    vec![
        Box::new(InitializableStrategy),
        Box::new(StartableStrategy),
        Box::new(BindingActionStrategy),
        Box::new(DisposableStrategy),
    ]
}

/// Runs activation strategies on new instances and deactivation strategies on released ones,
/// each at most once per instance unless the activation cache is disabled.
pub struct Pipeline {
    strategies: Vec<Box<dyn ActivationStrategy>>,
    activation_cache: Arc<ActivationCache>,
    cache_disabled: bool,
}

impl Pipeline {
    #[must_use]
    pub fn new(strategies: Vec<Box<dyn ActivationStrategy>>, activation_cache: Arc<ActivationCache>, cache_disabled: bool) -> Self {
        Self {
            strategies,
            activation_cache,
            cache_disabled,
        }
    }

    #[inline]
    #[must_use]
    pub fn activation_cache(&self) -> &Arc<ActivationCache> {
        &self.activation_cache
    }

    /// # Errors
    /// Returns [`ResolveErrorKind::Activation`] if a strategy fails, remaining strategies don't run
    pub fn activate(&self, context: &Context, reference: &InstanceReference) -> Result<(), ResolveErrorKind> {
        if !self.cache_disabled && self.activation_cache.is_activated(&reference.instance) {
            debug!("Already activated");
            return Ok(());
        }

        for strategy in &self.strategies {
            strategy
                .activate(context, reference)
                .map_err(|source| activation_error(context.implementation, context, source))?;
        }

        if !self.cache_disabled {
            self.activation_cache.add_activated(&reference.instance);
        }
        Ok(())
    }

    /// Runs every strategy even if some fail.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::Activation`] with the first failure
    pub fn deactivate(&self, context: &Context, reference: &InstanceReference) -> Result<(), ResolveErrorKind> {
        if !self.cache_disabled && self.activation_cache.is_deactivated(&reference.instance) {
            debug!("Already deactivated");
            return Ok(());
        }

        let mut first_error = None;
        for strategy in &self.strategies {
            if let Err(source) = strategy.deactivate(context, reference) {
                warn!(implementation = %context.implementation, "{}", source);
                first_error.get_or_insert(source);
            }
        }

        if !self.cache_disabled {
            self.activation_cache.add_deactivated(&reference.instance);
        }
        match first_error {
            Some(source) => Err(activation_error(context.implementation, context, source)),
            None => Ok(()),
        }
    }
}

fn activation_error(implementation: TypeInfo, context: &Context, source: ActivationErrorKind) -> ResolveErrorKind {
    ResolveErrorKind::Activation {
        implementation,
        source,
        path: context.request.path(),
    }
}

#[cfg(test)]
mod tests {
    use super::{default_strategies, Disposable, Initializable, InstanceReference, Pipeline, Startable};
    use crate::{
        activation_cache::ActivationCache,
        any::{Instance, TypeInfo},
        binding::Binding,
        context::Context,
        descriptor::TypeDescriptor,
        errors::{ActivationErrorKind, ResolveErrorKind},
        request::Request,
    };

    use core::sync::atomic::{AtomicU8, Ordering};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tracing_test::traced_test;

    #[derive(Default)]
    struct Service {
        events: Mutex<Vec<&'static str>>,
    }

    impl Initializable for Service {
        fn initialize(&self) -> anyhow::Result<()> {
            self.events.lock().push("initialize");
            Ok(())
        }
    }

    impl Startable for Service {
        fn start(&self) -> anyhow::Result<()> {
            self.events.lock().push("start");
            Ok(())
        }

        fn stop(&self) -> anyhow::Result<()> {
            self.events.lock().push("stop");
            Ok(())
        }
    }

    impl Disposable for Service {
        fn dispose(&self) -> anyhow::Result<()> {
            self.events.lock().push("dispose");
            anyhow::bail!("already disposed")
        }
    }

    fn descriptor() -> Arc<TypeDescriptor> {
        Arc::new(
            TypeDescriptor::concrete::<Service>()
                .initializable()
                .startable()
                .disposable()
                .build(),
        )
    }

    fn context(binding: Binding) -> Context {
        Context::new(Arc::new(Request::of::<Service>()), Arc::new(binding), TypeInfo::of::<Service>()).unwrap()
    }

    #[test]
    #[traced_test]
    fn test_strategy_order() {
        let actions = Arc::new(AtomicU8::new(0));
        let binding = Binding::bind::<Service>()
            .to_self()
            .on_activation({
                let actions = actions.clone();
                move |_: &Context, service: &Service| {
                    actions.fetch_add(1, Ordering::SeqCst);
                    service.events.lock().push("action");
                    Ok(())
                }
            })
            .build();
        let context = context(binding);
        let pipeline = Pipeline::new(default_strategies(), Arc::new(ActivationCache::new()), false);
        let instance: Instance = Arc::new(Service::default());
        let reference = InstanceReference::new(instance.clone(), Some(descriptor()));

        pipeline.activate(&context, &reference).unwrap();
        pipeline.activate(&context, &reference).unwrap();

        assert_eq!(actions.load(Ordering::SeqCst), 1);

        let result = pipeline.deactivate(&context, &reference);
        assert!(matches!(
            result,
            Err(ResolveErrorKind::Activation {
                source: ActivationErrorKind::Dispose(_),
                ..
            })
        ));
        assert!(pipeline.deactivate(&context, &reference).is_ok());

        let service = reference.downcast_ref::<Service>().unwrap();
        assert_eq!(*service.events.lock(), vec!["initialize", "start", "action", "stop", "dispose"]);
    }

    #[test]
    #[traced_test]
    fn test_disabled_cache_activates_every_time() {
        let context = context(Binding::bind::<Service>().to_self().build());
        let pipeline = Pipeline::new(default_strategies(), Arc::new(ActivationCache::new()), true);
        let reference = InstanceReference::new(Arc::new(Service::default()), Some(descriptor()));

        pipeline.activate(&context, &reference).unwrap();
        pipeline.activate(&context, &reference).unwrap();

        let service = reference.downcast_ref::<Service>().unwrap();
        assert_eq!(*service.events.lock(), vec!["initialize", "start", "initialize", "start"]);
        assert!(pipeline.activation_cache().is_empty());
    }
}
