use core::fmt::{self, Display, Formatter};

use crate::{
    any::TypeInfo,
    member::{DefaultValue, MemberInfo, ParameterDescriptor},
    parameter::ParameterKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    ConstructorParameter,
    Property,
    MethodParameter,
}

impl TargetKind {
    /// Kind of explicit parameter able to supply this target.
    #[inline]
    #[must_use]
    pub fn parameter_kind(self) -> ParameterKind {
        match self {
            TargetKind::ConstructorParameter => ParameterKind::ConstructorArgument,
            TargetKind::Property => ParameterKind::PropertyValue,
            TargetKind::MethodParameter => ParameterKind::MethodArgument,
        }
    }
}

/// A site receiving an injected value: a constructor or method parameter, or a property.
#[derive(Clone)]
pub struct Target {
    pub(crate) kind: TargetKind,
    pub(crate) member: &'static str,
    pub(crate) declaring: TypeInfo,
    pub(crate) parameter: ParameterDescriptor,
}

impl Target {
    #[inline]
    #[must_use]
    pub(crate) fn constructor_parameter(declaring: TypeInfo, member: &MemberInfo, parameter: &ParameterDescriptor) -> Self {
        Self {
            kind: TargetKind::ConstructorParameter,
            member: member.name,
            declaring,
            parameter: parameter.clone(),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn method_parameter(declaring: TypeInfo, member: &MemberInfo, parameter: &ParameterDescriptor) -> Self {
        Self {
            kind: TargetKind::MethodParameter,
            member: member.name,
            declaring,
            parameter: parameter.clone(),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn property(declaring: TypeInfo, member: &MemberInfo, parameter: &ParameterDescriptor) -> Self {
        Self {
            kind: TargetKind::Property,
            member: member.name,
            declaring,
            parameter: parameter.clone(),
        }
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.parameter.name
    }

    #[inline]
    #[must_use]
    pub fn member(&self) -> &'static str {
        self.member
    }

    #[inline]
    #[must_use]
    pub fn declaring_type(&self) -> TypeInfo {
        self.declaring
    }

    #[inline]
    #[must_use]
    pub fn service(&self) -> TypeInfo {
        self.parameter.service
    }

    #[inline]
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.parameter.optional
    }

    #[inline]
    #[must_use]
    pub fn is_many(&self) -> bool {
        self.parameter.many
    }

    /// Binding name the target is restricted to
    #[inline]
    #[must_use]
    pub fn constraint(&self) -> Option<&'static str> {
        self.parameter.named
    }

    #[inline]
    #[must_use]
    pub fn default(&self) -> Option<&DefaultValue> {
        self.parameter.default.as_ref()
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.kind {
            TargetKind::ConstructorParameter => write!(
                f,
                "parameter {} of constructor {} of type {}",
                self.parameter.name, self.member, self.declaring
            ),
            TargetKind::MethodParameter => write!(
                f,
                "parameter {} of method {} of type {}",
                self.parameter.name, self.member, self.declaring
            ),
            TargetKind::Property => write!(f, "property {} of type {}", self.member, self.declaring),
        }
    }
}
