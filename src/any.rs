use core::{
    any::{type_name, Any, TypeId},
    cmp::Ordering,
    fmt::{self, Display, Formatter},
    hash::{Hash, Hasher},
};
use std::sync::{Arc, Weak};

/// A constructed object, type-erased to its concrete implementation type.
pub type Instance = Arc<dyn Any + Send + Sync>;

pub(crate) type WeakInstance = Weak<dyn Any + Send + Sync>;

/// A value shaped for a service type `S`: internally an `Arc<S>` behind `dyn Any`,
/// so trait-object services can travel through the engine unsized.
pub type ServiceValue = Arc<dyn Any + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct TypeInfo {
    pub name: &'static str,
    pub id: TypeId,
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl Hash for TypeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for TypeInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Display for TypeInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl TypeInfo {
    #[inline]
    #[must_use]
    pub fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self {
            name: type_name::<T>(),
            id: TypeId::of::<T>(),
        }
    }

    /// Type name without its module path, keeping generic arguments intact.
    #[inline]
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        let head = self.name.split_once('<').map_or(self.name, |(head, _)| head);
        match head.rfind("::") {
            Some(pos) => &self.name[pos + 2..],
            None => self.name,
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn is_string(&self) -> bool {
        self.id == TypeId::of::<String>() || self.id == TypeId::of::<&'static str>() || self.id == TypeId::of::<str>()
    }
}

#[inline]
#[must_use]
pub(crate) fn service_value<S: ?Sized + Send + Sync + 'static>(value: Arc<S>) -> ServiceValue {
    Arc::new(value)
}

#[inline]
#[must_use]
pub(crate) fn downcast_service<S: ?Sized + Send + Sync + 'static>(value: &ServiceValue) -> Option<Arc<S>> {
    value.downcast_ref::<Arc<S>>().cloned()
}

/// Identity of the allocation behind an instance, stable while any handle (strong or weak) exists.
#[inline]
#[must_use]
pub(crate) fn instance_address(instance: &Instance) -> usize {
    Arc::as_ptr(instance).cast::<()>() as usize
}

/// Coerces an instance of implementation `T` into a value for service `S`.
#[derive(Clone)]
pub struct Caster {
    pub(crate) implementation: TypeInfo,
    pub(crate) service: TypeInfo,
    cast: Arc<dyn Fn(Instance) -> Option<ServiceValue> + Send + Sync>,
}

impl Caster {
    #[must_use]
    pub fn new<T, S>(cast: fn(Arc<T>) -> Arc<S>) -> Self
    where
        T: Send + Sync + 'static,
        S: ?Sized + Send + Sync + 'static,
    {
        Self {
            implementation: TypeInfo::of::<T>(),
            service: TypeInfo::of::<S>(),
            cast: Arc::new(move |instance: Instance| instance.downcast::<T>().ok().map(|value| service_value(cast(value)))),
        }
    }

    #[inline]
    #[must_use]
    pub fn identity<T: Send + Sync + 'static>() -> Self {
        Self::new::<T, T>(|value| value)
    }

    #[inline]
    #[must_use]
    pub(crate) fn matches(&self, implementation: &TypeInfo, service: &TypeInfo) -> bool {
        self.implementation == *implementation && self.service == *service
    }

    #[inline]
    #[must_use]
    pub(crate) fn cast(&self, instance: Instance) -> Option<ServiceValue> {
        (self.cast)(instance)
    }
}
