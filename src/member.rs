use core::fmt::{self, Display, Formatter};
use std::sync::Arc;

use crate::any::{Caster, Instance, TypeInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Visibility {
    Private,
    Crate,
    Public,
}

/// Where a member comes from relative to the type that declares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberOrigin {
    Declared,
    Inherited,
    /// Purely structural member of a base (layout glue, never an injection point).
    Structural,
    /// Built-in object-protocol member (equality, hashing, finalization, cloning).
    ObjectProtocol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Marker(pub &'static str);

impl Marker {
    pub const INJECT: Marker = Marker("inject");
}

/// The descriptor capability heuristics and scorers work with.
#[derive(Debug, Clone)]
pub struct MemberInfo {
    pub name: &'static str,
    pub visibility: Visibility,
    pub origin: MemberOrigin,
    pub is_static: bool,
    pub markers: Vec<Marker>,
}

impl MemberInfo {
    #[inline]
    #[must_use]
    pub fn new(name: &'static str, visibility: Visibility) -> Self {
        Self {
            name,
            visibility,
            origin: MemberOrigin::Declared,
            is_static: false,
            markers: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn public(name: &'static str) -> Self {
        Self::new(name, Visibility::Public)
    }

    #[inline]
    #[must_use]
    pub fn private(name: &'static str) -> Self {
        Self::new(name, Visibility::Private)
    }

    #[inline]
    #[must_use]
    pub fn marked(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }

    #[inline]
    #[must_use]
    pub fn injected(self) -> Self {
        self.marked(Marker::INJECT)
    }

    #[inline]
    #[must_use]
    pub fn with_origin(mut self, origin: MemberOrigin) -> Self {
        self.origin = origin;
        self
    }

    #[inline]
    #[must_use]
    pub fn inherited(self) -> Self {
        self.with_origin(MemberOrigin::Inherited)
    }

    #[inline]
    #[must_use]
    pub fn static_member(mut self) -> Self {
        self.is_static = true;
        self
    }

    #[inline]
    #[must_use]
    pub fn has_marker(&self, marker: Marker) -> bool {
        self.markers.contains(&marker)
    }
}

impl Display for MemberInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Value used for a target when nothing is bound for it.
#[derive(Clone)]
pub struct DefaultValue {
    pub(crate) instance: Instance,
    pub(crate) caster: Caster,
}

impl DefaultValue {
    #[must_use]
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self {
            instance: Arc::new(value),
            caster: Caster::identity::<T>(),
        }
    }

    #[inline]
    #[must_use]
    pub fn implementation(&self) -> TypeInfo {
        self.caster.implementation
    }
}

/// A constructor or method parameter as declared by its type.
#[derive(Clone)]
pub struct ParameterDescriptor {
    pub name: &'static str,
    pub service: TypeInfo,
    pub optional: bool,
    pub many: bool,
    pub named: Option<&'static str>,
    pub default: Option<DefaultValue>,
}

impl ParameterDescriptor {
    #[inline]
    #[must_use]
    pub fn of<S: ?Sized + 'static>(name: &'static str) -> Self {
        Self {
            name,
            service: TypeInfo::of::<S>(),
            optional: false,
            many: false,
            named: None,
            default: None,
        }
    }

    /// A parameter receiving every instance of `S`.
    #[inline]
    #[must_use]
    pub fn all<S: ?Sized + 'static>(name: &'static str) -> Self {
        Self {
            many: true,
            ..Self::of::<S>(name)
        }
    }

    #[inline]
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Restricts the dependency to bindings with the given name.
    #[inline]
    #[must_use]
    pub fn named(mut self, name: &'static str) -> Self {
        self.named = Some(name);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_default<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.default = Some(DefaultValue::new(value));
        self
    }
}
