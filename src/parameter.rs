use core::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use crate::{
    any::{service_value, ServiceValue, TypeInfo},
    context::Context,
    target::Target,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    ConstructorArgument,
    PropertyValue,
    MethodArgument,
}

/// How a parameter finds its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterMatch {
    Name(String),
    /// Matches constructor arguments by their service type
    Type(TypeInfo),
}

type ValueCallback = Arc<dyn Fn(&Context, &Target) -> Option<ServiceValue> + Send + Sync>;

#[derive(Clone)]
enum ParameterValue {
    Fixed(Option<ServiceValue>),
    Callback(ValueCallback),
}

/// Explicit value supplied for a target, bypassing binding resolution for it.
#[derive(Clone)]
pub struct Parameter {
    kind: ParameterKind,
    matcher: ParameterMatch,
    value: ParameterValue,
    inherited: bool,
}

impl Parameter {
    fn named(kind: ParameterKind, name: impl Into<String>, value: ParameterValue) -> Self {
        Self {
            kind,
            matcher: ParameterMatch::Name(name.into()),
            value,
            inherited: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn constructor_argument<T: Send + Sync + 'static>(name: impl Into<String>, value: T) -> Self {
        Self::constructor_argument_shared(name, Arc::new(value))
    }

    /// Constructor argument for a parameter declared with an unsized service, e.g. a trait object.
    #[inline]
    #[must_use]
    pub fn constructor_argument_shared<S: ?Sized + Send + Sync + 'static>(name: impl Into<String>, value: Arc<S>) -> Self {
        Self::named(
            ParameterKind::ConstructorArgument,
            name,
            ParameterValue::Fixed(Some(service_value(value))),
        )
    }

    /// Constructor argument explicitly supplied as absent.
    #[inline]
    #[must_use]
    pub fn constructor_argument_absent(name: impl Into<String>) -> Self {
        Self::named(ParameterKind::ConstructorArgument, name, ParameterValue::Fixed(None))
    }

    /// Constructor argument computed for each target it applies to.
    #[must_use]
    pub fn constructor_argument_with<S, F>(name: impl Into<String>, callback: F) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&Context, &Target) -> Option<Arc<S>> + Send + Sync + 'static,
    {
        Self::named(
            ParameterKind::ConstructorArgument,
            name,
            ParameterValue::Callback(Arc::new(move |context, target| callback(context, target).map(service_value))),
        )
    }

    /// Constructor argument applied to every constructor parameter of service `S`.
    #[inline]
    #[must_use]
    pub fn typed_constructor_argument<S: ?Sized + Send + Sync + 'static>(value: Arc<S>) -> Self {
        Self {
            kind: ParameterKind::ConstructorArgument,
            matcher: ParameterMatch::Type(TypeInfo::of::<S>()),
            value: ParameterValue::Fixed(Some(service_value(value))),
            inherited: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn property_value<T: Send + Sync + 'static>(name: impl Into<String>, value: T) -> Self {
        Self::named(
            ParameterKind::PropertyValue,
            name,
            ParameterValue::Fixed(Some(service_value(Arc::new(value)))),
        )
    }

    #[inline]
    #[must_use]
    pub fn method_argument<T: Send + Sync + 'static>(name: impl Into<String>, value: T) -> Self {
        Self::named(
            ParameterKind::MethodArgument,
            name,
            ParameterValue::Fixed(Some(service_value(Arc::new(value)))),
        )
    }

    /// Makes the parameter flow into the requests resolving the dependencies of its target.
    #[inline]
    #[must_use]
    pub fn inherited(mut self, inherited: bool) -> Self {
        self.inherited = inherited;
        self
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> ParameterKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn matcher(&self) -> &ParameterMatch {
        &self.matcher
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match &self.matcher {
            ParameterMatch::Name(name) => Some(name),
            ParameterMatch::Type(_) => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_inherited(&self) -> bool {
        self.inherited
    }

    /// Two parameters of the same kind with the same matcher can't coexist in one context.
    #[inline]
    #[must_use]
    pub(crate) fn conflicts_with(&self, other: &Self) -> bool {
        self.kind == other.kind && self.matcher == other.matcher
    }

    #[must_use]
    pub(crate) fn applies_to(&self, target: &Target) -> bool {
        if self.kind != target.kind().parameter_kind() {
            return false;
        }
        match &self.matcher {
            ParameterMatch::Name(name) => name == target.name(),
            ParameterMatch::Type(service) => *service == target.service(),
        }
    }

    #[must_use]
    pub(crate) fn value(&self, context: &Context, target: &Target) -> Option<ServiceValue> {
        match &self.value {
            ParameterValue::Fixed(value) => value.clone(),
            ParameterValue::Callback(callback) => callback(context, target),
        }
    }

    #[must_use]
    pub(crate) fn describe(&self) -> String {
        match &self.matcher {
            ParameterMatch::Name(name) => name.clone(),
            ParameterMatch::Type(service) => service.to_string(),
        }
    }
}

impl Debug for Parameter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("kind", &self.kind)
            .field("matcher", &self.matcher)
            .field("inherited", &self.inherited)
            .finish_non_exhaustive()
    }
}
