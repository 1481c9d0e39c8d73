use core::{
    fmt::{self, Debug, Formatter},
    marker::PhantomData,
};
use std::{collections::BTreeMap, sync::Arc};

use crate::{
    any::{Caster, Instance, TypeInfo},
    context::Context,
    errors::InstantiateErrorKind,
    kernel::Kernel,
    member::DefaultValue,
    parameter::Parameter,
    provider::{CallbackProvider, ConstantProvider, DefaultValueProvider, Provider, StandardProvider},
    request::Request,
    scope::ScopeKey,
};

pub(crate) type Condition = Arc<dyn Fn(&Request) -> bool + Send + Sync>;
pub(crate) type BindingAction = Arc<dyn Fn(&Context, &Instance) -> anyhow::Result<()> + Send + Sync>;
pub type ScopeResolver = Arc<dyn Fn(&Context) -> Option<ScopeKey> + Send + Sync>;

/// Decides the scope key an activation is cached under. No key means transient.
#[derive(Clone)]
pub enum ScopeCallback {
    Transient,
    /// The kernel's own key, released when the kernel is dropped
    Singleton,
    Thread,
    /// Key of the activation scope the root request was issued through
    Activation,
    Custom(ScopeResolver),
}

impl Debug for ScopeCallback {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ScopeCallback::Transient => f.write_str("Transient"),
            ScopeCallback::Singleton => f.write_str("Singleton"),
            ScopeCallback::Thread => f.write_str("Thread"),
            ScopeCallback::Activation => f.write_str("Activation"),
            ScopeCallback::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// What a binding resolves to, used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingTarget {
    SelfType,
    Type,
    OpenGeneric,
    Method,
    Constant,
    Provider,
    DefaultValue,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingMetadata {
    name: Option<String>,
    values: BTreeMap<String, String>,
}

impl BindingMetadata {
    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    #[inline]
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

/// A registration mapping a service to a way of producing it.
pub struct Binding {
    pub(crate) service: TypeInfo,
    pub(crate) provider: Arc<dyn Provider>,
    pub(crate) target: BindingTarget,
    pub(crate) condition: Option<Condition>,
    pub(crate) scope: ScopeCallback,
    pub(crate) metadata: BindingMetadata,
    pub(crate) parameters: Vec<Parameter>,
    pub(crate) on_activation: Vec<BindingAction>,
    pub(crate) on_deactivation: Vec<BindingAction>,
    pub(crate) casters: Vec<Caster>,
    pub(crate) implicit: bool,
    pub(crate) auto_bindable: bool,
}

impl Binding {
    #[inline]
    #[must_use]
    pub fn bind<S: ?Sized + Send + Sync + 'static>() -> BindingBuilder<S> {
        BindingBuilder { _phantom: PhantomData }
    }

    /// Binds every closed form of the open generic `Definition`.
    #[inline]
    #[must_use]
    pub fn bind_open_generic<Definition: ?Sized + 'static>() -> OpenGenericBindingBuilder {
        OpenGenericBindingBuilder {
            definition: TypeInfo::of::<Definition>(),
        }
    }

    fn new(service: TypeInfo, provider: Arc<dyn Provider>, target: BindingTarget) -> Self {
        Self {
            service,
            provider,
            target,
            condition: None,
            scope: ScopeCallback::Transient,
            metadata: BindingMetadata::default(),
            parameters: Vec::new(),
            on_activation: Vec::new(),
            on_deactivation: Vec::new(),
            casters: Vec::new(),
            implicit: false,
            auto_bindable: false,
        }
    }

    /// Implicit binding of a concrete type to itself.
    #[must_use]
    pub(crate) fn self_binding(service: TypeInfo) -> Self {
        let mut binding = Self::new(service, Arc::new(StandardProvider::new(service)), BindingTarget::SelfType);
        binding.implicit = true;
        binding
    }

    /// Implicit binding yielding a target's declared default value.
    #[must_use]
    pub(crate) fn default_value(service: TypeInfo, default: &DefaultValue) -> Self {
        let mut binding = Self::new(
            service,
            Arc::new(DefaultValueProvider::new(default.instance.clone(), default.implementation())),
            BindingTarget::DefaultValue,
        );
        binding.casters.push(default.caster.clone());
        binding.implicit = true;
        binding
    }

    #[inline]
    #[must_use]
    pub fn service(&self) -> TypeInfo {
        self.service
    }

    #[inline]
    #[must_use]
    pub fn target(&self) -> BindingTarget {
        self.target
    }

    #[inline]
    #[must_use]
    pub fn scope(&self) -> &ScopeCallback {
        &self.scope
    }

    #[inline]
    #[must_use]
    pub fn metadata(&self) -> &BindingMetadata {
        &self.metadata
    }

    #[inline]
    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    #[inline]
    #[must_use]
    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    #[inline]
    #[must_use]
    pub fn is_implicit(&self) -> bool {
        self.implicit
    }

    #[inline]
    #[must_use]
    pub fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }

    #[inline]
    #[must_use]
    pub fn is_auto_bindable(&self) -> bool {
        self.auto_bindable
    }

    #[inline]
    #[must_use]
    pub(crate) fn matches(&self, request: &Request) -> bool {
        self.condition.as_ref().map_or(true, |condition| condition(request))
    }

    #[inline]
    #[must_use]
    pub(crate) fn caster(&self, implementation: &TypeInfo, service: &TypeInfo) -> Option<&Caster> {
        self.casters.iter().find(|caster| caster.matches(implementation, service))
    }

    /// Short human readable form, e.g. `Weapon to Type named sharp`
    #[must_use]
    pub fn describe(&self) -> String {
        let mut description = format!("{} to {:?}", self.service, self.target);
        if let Some(name) = self.metadata.name() {
            description.push_str(" named ");
            description.push_str(name);
        }
        if self.condition.is_some() {
            description.push_str(" (conditional)");
        }
        if self.implicit {
            description.push_str(" (implicit)");
        }
        description
    }
}

impl Debug for Binding {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("service", &self.service)
            .field("target", &self.target)
            .field("scope", &self.scope)
            .field("metadata", &self.metadata)
            .field("implicit", &self.implicit)
            .finish_non_exhaustive()
    }
}

/// First step of declaring a binding: choose what the service resolves to.
pub struct BindingBuilder<S: ?Sized> {
    _phantom: PhantomData<fn() -> Box<S>>,
}

impl<S: ?Sized + Send + Sync + 'static> BindingBuilder<S> {
    fn config(service: TypeInfo, provider: Arc<dyn Provider>, target: BindingTarget) -> BindingConfig<S> {
        BindingConfig {
            binding: Binding::new(service, provider, target),
            _phantom: PhantomData,
        }
    }

    /// Resolves the service to an instance of the described type `T`.
    #[must_use]
    pub fn to<T: Send + Sync + 'static>(self) -> BindingConfig<S> {
        let service = TypeInfo::of::<S>();
        let implementation = TypeInfo::of::<T>();
        let target = if service == implementation {
            BindingTarget::SelfType
        } else {
            BindingTarget::Type
        };
        let mut config = Self::config(service, Arc::new(StandardProvider::new(implementation)), target);
        config.binding.casters.push(Caster::identity::<T>());
        config
    }

    /// Like [`BindingBuilder::to`], with the coercion from `T` to the service given inline.
    #[must_use]
    pub fn to_cast<T: Send + Sync + 'static>(self, cast: fn(Arc<T>) -> Arc<S>) -> BindingConfig<S> {
        self.to::<T>().with_cast(cast)
    }

    /// Resolves the service by calling `method`.
    #[must_use]
    pub fn to_method<T, F>(self, method: F) -> BindingConfig<S>
    where
        T: Send + Sync + 'static,
        F: Fn(&Kernel, &Context) -> Result<T, InstantiateErrorKind> + Send + Sync + 'static,
    {
        self.to_optional_method(move |kernel, context| method(kernel, context).map(Some))
    }

    /// Resolves the service by calling `method`, which may produce nothing.
    #[must_use]
    pub fn to_optional_method<T, F>(self, method: F) -> BindingConfig<S>
    where
        T: Send + Sync + 'static,
        F: Fn(&Kernel, &Context) -> Result<Option<T>, InstantiateErrorKind> + Send + Sync + 'static,
    {
        let provider = CallbackProvider::new(TypeInfo::of::<T>(), move |kernel, context| {
            method(kernel, context).map(|value| value.map(|value| Arc::new(value) as Instance))
        });
        let mut config = Self::config(TypeInfo::of::<S>(), Arc::new(provider), BindingTarget::Method);
        config.binding.casters.push(Caster::identity::<T>());
        config
    }

    /// Resolves the service to `value`. Constants live in singleton scope.
    #[must_use]
    pub fn to_constant<T: Send + Sync + 'static>(self, value: T) -> BindingConfig<S> {
        self.to_shared(Arc::new(value))
    }

    /// Resolves the service to an already shared `value`.
    #[must_use]
    pub fn to_shared<T: Send + Sync + 'static>(self, value: Arc<T>) -> BindingConfig<S> {
        let provider = ConstantProvider::new(value as Instance, TypeInfo::of::<T>());
        let mut config = Self::config(TypeInfo::of::<S>(), Arc::new(provider), BindingTarget::Constant);
        config.binding.casters.push(Caster::identity::<T>());
        config.in_singleton_scope()
    }

    /// Resolves the service through a custom provider.
    #[must_use]
    pub fn to_provider<P: Provider + 'static>(self, provider: P) -> BindingConfig<S> {
        Self::config(TypeInfo::of::<S>(), Arc::new(provider), BindingTarget::Provider)
    }
}

impl<S: Send + Sync + 'static> BindingBuilder<S> {
    #[inline]
    #[must_use]
    pub fn to_self(self) -> BindingConfig<S> {
        self.to::<S>()
    }
}

pub struct OpenGenericBindingBuilder {
    definition: TypeInfo,
}

impl OpenGenericBindingBuilder {
    /// Resolves each closed form of the service definition to the same closed form of `Definition`.
    #[must_use]
    pub fn to<Definition: ?Sized + 'static>(self) -> BindingConfig<Definition> {
        BindingConfig {
            binding: Binding::new(
                self.definition,
                Arc::new(StandardProvider::open_generic(TypeInfo::of::<Definition>())),
                BindingTarget::OpenGeneric,
            ),
            _phantom: PhantomData,
        }
    }
}

/// Second step of declaring a binding: scope, metadata, conditions, parameters and actions.
pub struct BindingConfig<S: ?Sized> {
    binding: Binding,
    _phantom: PhantomData<fn() -> Box<S>>,
}

impl<S: ?Sized + 'static> BindingConfig<S> {
    #[inline]
    #[must_use]
    pub fn in_transient_scope(self) -> Self {
        self.in_scope_callback(ScopeCallback::Transient)
    }

    #[inline]
    #[must_use]
    pub fn in_singleton_scope(self) -> Self {
        self.in_scope_callback(ScopeCallback::Singleton)
    }

    #[inline]
    #[must_use]
    pub fn in_thread_scope(self) -> Self {
        self.in_scope_callback(ScopeCallback::Thread)
    }

    #[inline]
    #[must_use]
    pub fn in_activation_scope(self) -> Self {
        self.in_scope_callback(ScopeCallback::Activation)
    }

    /// Caches activations under the key returned by `scope`, transient when it returns `None`.
    #[inline]
    #[must_use]
    pub fn in_scope<F>(self, scope: F) -> Self
    where
        F: Fn(&Context) -> Option<ScopeKey> + Send + Sync + 'static,
    {
        self.in_scope_callback(ScopeCallback::Custom(Arc::new(scope)))
    }

    /// Caches activations under `key` for as long as the caller keeps it alive.
    #[must_use]
    pub fn in_scope_of(self, key: &ScopeKey) -> Self {
        let key = key.downgrade();
        self.in_scope(move |_| key.upgrade())
    }

    #[inline]
    #[must_use]
    pub fn in_scope_callback(mut self, scope: ScopeCallback) -> Self {
        self.binding.scope = scope;
        self
    }

    #[inline]
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.binding.metadata = self.binding.metadata.with_name(name);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.binding.metadata = self.binding.metadata.with_value(key, value);
        self
    }

    #[inline]
    #[must_use]
    pub fn when<F>(mut self, condition: F) -> Self
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        self.binding.condition = Some(Arc::new(condition));
        self
    }

    /// Applies only to dependencies of instances of `T`.
    #[must_use]
    pub fn when_injected_into<T: ?Sized + 'static>(self) -> Self {
        let parent = TypeInfo::of::<T>();
        self.when(move |request| {
            request
                .parent_context()
                .is_some_and(|context| context.implementation() == parent)
        })
    }

    /// Applies only to requests made for a target constrained by name.
    #[must_use]
    pub fn when_target_named(self, name: &'static str) -> Self {
        self.when(move |request| request.target().and_then(|target| target.constraint()) == Some(name))
    }

    #[inline]
    #[must_use]
    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.binding.parameters.push(parameter);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_constructor_argument<T: Send + Sync + 'static>(self, name: impl Into<String>, value: T) -> Self {
        self.with_parameter(Parameter::constructor_argument(name, value))
    }

    #[must_use]
    pub fn on_activation<T, F>(mut self, action: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Context, &T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.binding.on_activation.push(typed_action(action));
        self
    }

    #[must_use]
    pub fn on_deactivation<T, F>(mut self, action: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Context, &T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.binding.on_deactivation.push(typed_action(action));
        self
    }

    /// Lets the binding also satisfy requests for services its implementation is assignable to.
    #[inline]
    #[must_use]
    pub fn auto_bindable(mut self) -> Self {
        self.binding.auto_bindable = true;
        self
    }

    #[inline]
    #[must_use]
    pub fn build(self) -> Binding {
        self.binding
    }
}

impl<S: ?Sized + Send + Sync + 'static> BindingConfig<S> {
    /// Registers how an implementation `T` of this binding is coerced into the service.
    #[must_use]
    pub fn with_cast<T: Send + Sync + 'static>(mut self, cast: fn(Arc<T>) -> Arc<S>) -> Self {
        self.binding.casters.push(Caster::new(cast));
        self
    }
}

impl<S: ?Sized> From<BindingConfig<S>> for Binding {
    fn from(config: BindingConfig<S>) -> Self {
        config.binding
    }
}

fn typed_action<T, F>(action: F) -> BindingAction
where
    T: Send + Sync + 'static,
    F: Fn(&Context, &T) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(move |context, instance| match instance.downcast_ref::<T>() {
        Some(value) => action(context, value),
        None => Ok(()),
    })
}

#[cfg(test)]
mod tests {
    use super::{Binding, BindingMetadata, BindingTarget, ScopeCallback};
    use crate::{any::TypeInfo, request::Request, scope::ScopeKey};

    use std::sync::Arc;

    trait Weapon: Send + Sync {}

    struct Sword;

    impl Weapon for Sword {}

    #[test]
    fn test_binding_targets() {
        let binding = Binding::bind::<dyn Weapon>().to_cast::<Sword>(|sword| sword).build();
        assert_eq!(binding.target(), BindingTarget::Type);
        assert!(binding
            .caster(&TypeInfo::of::<Sword>(), &TypeInfo::of::<dyn Weapon>())
            .is_some());

        let binding = Binding::bind::<Sword>().to_self().build();
        assert_eq!(binding.target(), BindingTarget::SelfType);
        assert!(matches!(binding.scope(), ScopeCallback::Transient));

        let binding = Binding::bind::<Sword>().to_constant(Sword).build();
        assert_eq!(binding.target(), BindingTarget::Constant);
        assert!(matches!(binding.scope(), ScopeCallback::Singleton));
    }

    #[test]
    fn test_describe() {
        let binding = Binding::bind::<dyn Weapon>()
            .to_cast::<Sword>(|sword| sword)
            .named("sharp")
            .when(|_| true)
            .build();

        assert_eq!(binding.describe(), "Weapon to Type named sharp (conditional)");
        assert!(binding.is_conditional());
        assert!(!binding.is_implicit());
    }

    #[test]
    fn test_condition() {
        let binding = Binding::bind::<Sword>()
            .to_self()
            .when(|request| request.is_optional())
            .build();

        assert!(!binding.matches(&Request::of::<Sword>()));
        assert!(binding.matches(&Request::of::<Sword>().optional()));
    }

    #[test]
    fn test_metadata() {
        let metadata = BindingMetadata::default().with_name("sharp").with_value("length", "long");

        assert_eq!(metadata.name(), Some("sharp"));
        assert_eq!(metadata.get("length"), Some("long"));
        assert!(metadata.has("length"));
        assert!(!metadata.has("weight"));
    }

    #[test]
    fn test_scope_of_key() {
        let key = ScopeKey::new("custom");
        let binding = Arc::new(Binding::bind::<Sword>().to_self().in_scope_of(&key).build());

        assert!(matches!(binding.scope(), ScopeCallback::Custom(_)));
    }
}
