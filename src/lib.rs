pub(crate) mod activation;
pub(crate) mod activation_cache;
pub(crate) mod any;
pub(crate) mod arguments;
pub(crate) mod binding;
pub(crate) mod binding_resolver;
pub(crate) mod cache;
pub(crate) mod context;
pub(crate) mod descriptor;
pub(crate) mod errors;
pub(crate) mod kernel;
pub(crate) mod lock;
pub(crate) mod member;
pub(crate) mod parameter;
pub(crate) mod planner;
pub(crate) mod provider;
pub(crate) mod pruner;
pub(crate) mod registry;
pub(crate) mod request;
pub(crate) mod scope;
pub(crate) mod scorer;
pub(crate) mod selector;
pub(crate) mod settings;
pub(crate) mod target;

pub use activation::{
    default_strategies, ActivationStrategy, BindingActionStrategy, Disposable, DisposableStrategy, Initializable,
    InitializableStrategy, InstanceReference, Pipeline, Startable, StartableStrategy,
};
pub use activation_cache::ActivationCache;
pub use any::{Caster, Instance, ServiceValue, TypeInfo};
pub use arguments::{Argument, Arguments};
pub use binding::{
    Binding, BindingBuilder, BindingConfig, BindingMetadata, BindingTarget, OpenGenericBindingBuilder, ScopeCallback,
    ScopeResolver,
};
pub use binding_resolver::{
    BindingResolver, DefaultValueBindingResolver, ImpliedBindingResolver, MissingBindingResolver, OpenGenericBindingResolver,
    ResolutionChain, SelfBindingResolver, StandardBindingResolver,
};
pub use cache::ScopeCache;
pub use context::Context;
pub use descriptor::{
    Catalog, ConstructorDescriptor, GenericInfo, Injectable, MethodDescriptor, PropertyDescriptor, TypeDescriptor,
    TypeDescriptorBuilder, TypeKind,
};
pub use errors::{ActivationErrorKind, ActivationPath, InstantiateErrorKind, ResolveErrorKind};
pub use kernel::{Activated, Kernel, KernelBuilder, Resolution};
pub use member::{DefaultValue, Marker, MemberInfo, MemberOrigin, ParameterDescriptor, Visibility};
pub use parameter::{Parameter, ParameterKind, ParameterMatch};
pub use planner::{ConstructorDirective, MethodDirective, Plan, Planner, PropertyDirective};
pub use provider::{CallbackProvider, ConstantProvider, DefaultValueProvider, Provider, StandardProvider};
pub use pruner::{CachePruner, Prunable};
pub use registry::Registry;
pub use request::{Constraint, Request};
pub use scope::{thread_scope, ActivationScope, ScopeKey, WeakScopeKey};
pub use scorer::{ConstructorScorer, StandardConstructorScorer};
pub use selector::{InjectionHeuristic, Selector, StandardInjectionHeuristic, VisibilityInjectionHeuristic};
pub use settings::Settings;
pub use target::{Target, TargetKind};
