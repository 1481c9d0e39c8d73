use crate::{
    descriptor::{ConstructorDescriptor, MethodDescriptor, PropertyDescriptor, TypeDescriptor},
    member::{Marker, MemberInfo, MemberOrigin, Visibility},
    settings::Settings,
};

/// Decides whether a property or method is an injection point.
pub trait InjectionHeuristic: Send + Sync {
    fn should_inject(&self, member: &MemberInfo) -> bool;
}

/// Members carrying the inject marker, restricted to public ones unless non-public injection is enabled.
pub struct StandardInjectionHeuristic {
    marker: Marker,
    inject_non_public: bool,
}

impl StandardInjectionHeuristic {
    #[inline]
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        Self {
            marker: settings.inject_marker,
            inject_non_public: settings.inject_non_public,
        }
    }
}

impl InjectionHeuristic for StandardInjectionHeuristic {
    fn should_inject(&self, member: &MemberInfo) -> bool {
        member.has_marker(self.marker) && (self.inject_non_public || member.visibility == Visibility::Public)
    }
}

/// Every member at or above a visibility, marked or not.
pub struct VisibilityInjectionHeuristic {
    minimum: Visibility,
}

impl VisibilityInjectionHeuristic {
    #[inline]
    #[must_use]
    pub fn new(minimum: Visibility) -> Self {
        Self { minimum }
    }
}

impl InjectionHeuristic for VisibilityInjectionHeuristic {
    fn should_inject(&self, member: &MemberInfo) -> bool {
        member.visibility >= self.minimum
    }
}

/// Picks the constructors, properties and methods of a type eligible for injection, in declaration order.
pub struct Selector {
    heuristics: Vec<Box<dyn InjectionHeuristic>>,
    inject_non_public: bool,
    inject_parent_private_members: bool,
}

impl Selector {
    #[must_use]
    pub fn new(settings: &Settings, heuristics: Vec<Box<dyn InjectionHeuristic>>) -> Self {
        Self {
            heuristics,
            inject_non_public: settings.inject_non_public,
            inject_parent_private_members: settings.inject_parent_private_members,
        }
    }

    #[inline]
    fn is_visible(&self, member: &MemberInfo) -> bool {
        self.inject_non_public || member.visibility == Visibility::Public
    }

    fn is_candidate(&self, member: &MemberInfo) -> bool {
        if member.is_static {
            return false;
        }
        match member.origin {
            MemberOrigin::Structural | MemberOrigin::ObjectProtocol => false,
            MemberOrigin::Inherited if member.visibility == Visibility::Private => self.inject_parent_private_members,
            MemberOrigin::Declared | MemberOrigin::Inherited => true,
        }
    }

    fn is_injected(&self, member: &MemberInfo) -> bool {
        self.is_candidate(member)
            && self.is_visible(member)
            && self.heuristics.iter().any(|heuristic| heuristic.should_inject(member))
    }

    #[must_use]
    pub fn select_constructors<'a>(&self, descriptor: &'a TypeDescriptor) -> Vec<&'a ConstructorDescriptor> {
        descriptor
            .constructors()
            .iter()
            .filter(|constructor| !constructor.member.is_static && self.is_visible(&constructor.member))
            .collect()
    }

    #[must_use]
    pub fn select_properties<'a>(&self, descriptor: &'a TypeDescriptor) -> Vec<&'a PropertyDescriptor> {
        descriptor
            .properties()
            .iter()
            .filter(|property| self.is_injected(&property.member))
            .collect()
    }

    #[must_use]
    pub fn select_methods<'a>(&self, descriptor: &'a TypeDescriptor) -> Vec<&'a MethodDescriptor> {
        descriptor
            .methods()
            .iter()
            .filter(|method| self.is_injected(&method.member))
            .collect()
    }
}
