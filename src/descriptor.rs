use core::marker::PhantomData;
use std::{collections::BTreeMap, sync::Arc};

use crate::{
    activation::{Disposable, Initializable, Startable},
    any::{downcast_service, Caster, Instance, ServiceValue, TypeInfo},
    arguments::Arguments,
    errors::InstantiateErrorKind,
    member::{MemberInfo, ParameterDescriptor},
};

pub(crate) type ConstructorInvoker = Arc<dyn Fn(&Arguments) -> Result<Instance, InstantiateErrorKind> + Send + Sync>;
pub(crate) type PropertySetter = Arc<dyn Fn(&Instance, &ServiceValue) -> Result<(), InstantiateErrorKind> + Send + Sync>;
pub(crate) type MethodInvoker = Arc<dyn Fn(&Instance, &Arguments) -> Result<(), InstantiateErrorKind> + Send + Sync>;
pub(crate) type Hook = Arc<dyn Fn(&Instance) -> anyhow::Result<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Concrete,
    /// A concrete type that must never be constructed implicitly.
    Abstract,
    Interface,
}

/// Generic shape of a type: the open definition marker and the arguments closing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericInfo {
    pub definition: TypeInfo,
    pub arguments: Vec<TypeInfo>,
}

impl GenericInfo {
    #[inline]
    #[must_use]
    pub fn new<Definition: ?Sized + 'static>(arguments: Vec<TypeInfo>) -> Self {
        Self {
            definition: TypeInfo::of::<Definition>(),
            arguments,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.arguments.is_empty()
    }
}

#[derive(Clone)]
pub struct ConstructorDescriptor {
    pub member: MemberInfo,
    pub parameters: Vec<ParameterDescriptor>,
    pub(crate) invoker: ConstructorInvoker,
}

impl ConstructorDescriptor {
    /// Signature used in diagnostics, e.g. `new(weapon: Weapon)`
    #[must_use]
    pub fn signature(&self) -> String {
        let parameters: Vec<String> = self
            .parameters
            .iter()
            .map(|parameter| format!("{}: {}", parameter.name, parameter.service))
            .collect();
        format!("{}({})", self.member.name, parameters.join(", "))
    }
}

#[derive(Clone)]
pub struct PropertyDescriptor {
    pub member: MemberInfo,
    pub parameter: ParameterDescriptor,
    pub(crate) setter: PropertySetter,
}

#[derive(Clone)]
pub struct MethodDescriptor {
    pub member: MemberInfo,
    pub parameters: Vec<ParameterDescriptor>,
    pub(crate) invoker: MethodInvoker,
}

#[derive(Clone, Default)]
pub(crate) struct Hooks {
    pub(crate) initialize: Option<Hook>,
    pub(crate) start: Option<Hook>,
    pub(crate) stop: Option<Hook>,
    pub(crate) dispose: Option<Hook>,
}

/// Build-time description of a type: what a code generator emits in place of runtime reflection.
#[derive(Clone)]
pub struct TypeDescriptor {
    pub(crate) type_info: TypeInfo,
    pub(crate) kind: TypeKind,
    pub(crate) generic: Option<GenericInfo>,
    pub(crate) constructors: Vec<ConstructorDescriptor>,
    pub(crate) properties: Vec<PropertyDescriptor>,
    pub(crate) methods: Vec<MethodDescriptor>,
    pub(crate) casters: Vec<Caster>,
    pub(crate) hooks: Hooks,
}

impl TypeDescriptor {
    #[inline]
    #[must_use]
    pub fn concrete<T: Send + Sync + 'static>() -> TypeDescriptorBuilder<T> {
        TypeDescriptorBuilder {
            descriptor: TypeDescriptor::empty(TypeInfo::of::<T>(), TypeKind::Concrete),
            _phantom: PhantomData,
        }
        .implements::<T>(|value| value)
    }

    #[inline]
    #[must_use]
    pub fn interface<S: ?Sized + 'static>() -> TypeDescriptorBuilder<S> {
        TypeDescriptorBuilder {
            descriptor: TypeDescriptor::empty(TypeInfo::of::<S>(), TypeKind::Interface),
            _phantom: PhantomData,
        }
    }

    fn empty(type_info: TypeInfo, kind: TypeKind) -> Self {
        Self {
            type_info,
            kind,
            generic: None,
            constructors: Vec::new(),
            properties: Vec::new(),
            methods: Vec::new(),
            casters: Vec::new(),
            hooks: Hooks::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn generic(&self) -> Option<&GenericInfo> {
        self.generic.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn constructors(&self) -> &[ConstructorDescriptor] {
        &self.constructors
    }

    #[inline]
    #[must_use]
    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    #[inline]
    #[must_use]
    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    #[inline]
    #[must_use]
    pub fn caster(&self, service: &TypeInfo) -> Option<&Caster> {
        self.casters.iter().find(|caster| caster.matches(&self.type_info, service))
    }
}

pub struct TypeDescriptorBuilder<T: ?Sized> {
    descriptor: TypeDescriptor,
    _phantom: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized + 'static> TypeDescriptorBuilder<T> {
    #[inline]
    #[must_use]
    pub fn kind(mut self, kind: TypeKind) -> Self {
        self.descriptor.kind = kind;
        self
    }

    /// Declares the type as closing the open generic `Definition` over `arguments`.
    #[inline]
    #[must_use]
    pub fn generic_of<Definition: ?Sized + 'static>(mut self, arguments: Vec<TypeInfo>) -> Self {
        self.descriptor.generic = Some(GenericInfo::new::<Definition>(arguments));
        self
    }

    #[inline]
    #[must_use]
    pub fn build(self) -> TypeDescriptor {
        self.descriptor
    }
}

impl<T: Send + Sync + 'static> TypeDescriptorBuilder<T> {
    /// Declares `T` assignable to service `S`.
    #[inline]
    #[must_use]
    pub fn implements<S: ?Sized + Send + Sync + 'static>(mut self, cast: fn(Arc<T>) -> Arc<S>) -> Self {
        self.descriptor.casters.push(Caster::new(cast));
        self
    }

    #[must_use]
    pub fn constructor<I, F>(mut self, member: MemberInfo, parameters: I, invoker: F) -> Self
    where
        I: IntoIterator<Item = ParameterDescriptor>,
        F: Fn(&Arguments) -> Result<T, InstantiateErrorKind> + Send + Sync + 'static,
    {
        self.descriptor.constructors.push(ConstructorDescriptor {
            member,
            parameters: parameters.into_iter().collect(),
            invoker: Arc::new(move |arguments| invoker(arguments).map(|value| Arc::new(value) as Instance)),
        });
        self
    }

    #[must_use]
    pub fn property<S, F>(self, member: MemberInfo, setter: F) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&T, Arc<S>) -> Result<(), InstantiateErrorKind> + Send + Sync + 'static,
    {
        let parameter = ParameterDescriptor::of::<S>(member.name);
        self.add_property(member, parameter, setter)
    }

    /// Property left untouched when nothing is bound for it.
    #[must_use]
    pub fn optional_property<S, F>(self, member: MemberInfo, setter: F) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&T, Arc<S>) -> Result<(), InstantiateErrorKind> + Send + Sync + 'static,
    {
        let parameter = ParameterDescriptor::of::<S>(member.name).optional();
        self.add_property(member, parameter, setter)
    }

    fn add_property<S, F>(mut self, member: MemberInfo, parameter: ParameterDescriptor, setter: F) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&T, Arc<S>) -> Result<(), InstantiateErrorKind> + Send + Sync + 'static,
    {
        self.descriptor.properties.push(PropertyDescriptor {
            member,
            parameter,
            setter: Arc::new(move |instance, value| {
                let receiver = receiver::<T>(instance)?;
                let value = downcast_service::<S>(value).ok_or(InstantiateErrorKind::IncorrectArgumentType {
                    index: 0,
                    expected: TypeInfo::of::<S>(),
                })?;
                setter(receiver, value)
            }),
        });
        self
    }

    #[must_use]
    pub fn method<I, F>(mut self, member: MemberInfo, parameters: I, invoker: F) -> Self
    where
        I: IntoIterator<Item = ParameterDescriptor>,
        F: Fn(&T, &Arguments) -> Result<(), InstantiateErrorKind> + Send + Sync + 'static,
    {
        self.descriptor.methods.push(MethodDescriptor {
            member,
            parameters: parameters.into_iter().collect(),
            invoker: Arc::new(move |instance, arguments| invoker(receiver::<T>(instance)?, arguments)),
        });
        self
    }

    #[must_use]
    pub fn initializable(mut self) -> Self
    where
        T: Initializable,
    {
        self.descriptor.hooks.initialize = Some(hook::<T>(T::initialize));
        self
    }

    #[must_use]
    pub fn startable(mut self) -> Self
    where
        T: Startable,
    {
        self.descriptor.hooks.start = Some(hook::<T>(T::start));
        self.descriptor.hooks.stop = Some(hook::<T>(T::stop));
        self
    }

    #[must_use]
    pub fn disposable(mut self) -> Self
    where
        T: Disposable,
    {
        self.descriptor.hooks.dispose = Some(hook::<T>(T::dispose));
        self
    }
}

fn receiver<T: Send + Sync + 'static>(instance: &Instance) -> Result<&T, InstantiateErrorKind> {
    instance
        .downcast_ref::<T>()
        .ok_or_else(|| InstantiateErrorKind::Custom(anyhow::anyhow!("receiver isn't an instance of {}", TypeInfo::of::<T>())))
}

fn hook<T: Send + Sync + 'static>(f: fn(&T) -> anyhow::Result<()>) -> Hook {
    Arc::new(move |instance: &Instance| match instance.downcast_ref::<T>() {
        Some(value) => f(value),
        None => Ok(()),
    })
}

/// A type able to describe itself.
pub trait Injectable: Send + Sync + Sized + 'static {
    fn describe() -> TypeDescriptor;
}

/// Immutable set of type descriptors known to the engine.
#[derive(Clone, Default)]
pub struct Catalog {
    descriptors: BTreeMap<TypeInfo, Arc<TypeDescriptor>>,
    closed: BTreeMap<(TypeInfo, Vec<TypeInfo>), TypeInfo>,
}

impl Catalog {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn describe(&mut self, descriptor: TypeDescriptor) {
        if let Some(GenericInfo { definition, arguments }) = &descriptor.generic {
            if !arguments.is_empty() {
                self.closed.insert((*definition, arguments.clone()), descriptor.type_info);
            }
        }
        self.descriptors.insert(descriptor.type_info, Arc::new(descriptor));
    }

    #[inline]
    #[must_use]
    pub fn get(&self, type_info: &TypeInfo) -> Option<&Arc<TypeDescriptor>> {
        self.descriptors.get(type_info)
    }

    /// Finds the type closing `definition` over `arguments`.
    #[inline]
    #[must_use]
    pub fn close(&self, definition: &TypeInfo, arguments: &[TypeInfo]) -> Option<TypeInfo> {
        self.closed.get(&(*definition, arguments.to_vec())).copied()
    }

    #[inline]
    #[must_use]
    pub fn caster(&self, implementation: &TypeInfo, service: &TypeInfo) -> Option<&Caster> {
        self.get(implementation).and_then(|descriptor| descriptor.caster(service))
    }

    #[inline]
    #[must_use]
    pub fn is_assignable(&self, from: &TypeInfo, to: &TypeInfo) -> bool {
        from == to || self.caster(from, to).is_some()
    }

    /// Concrete, non-abstract, non-interface, closed, non-string types can be bound to themselves.
    #[must_use]
    pub fn is_self_bindable(&self, type_info: &TypeInfo) -> bool {
        if type_info.is_string() {
            return false;
        }
        self.get(type_info).is_some_and(|descriptor| {
            descriptor.kind == TypeKind::Concrete && descriptor.generic.as_ref().map_or(true, |generic| !generic.is_open())
        })
    }
}
