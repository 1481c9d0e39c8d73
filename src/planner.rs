use core::sync::atomic::{AtomicUsize, Ordering};
use parking_lot::RwLock;
use std::{collections::BTreeMap, sync::Arc};
use tracing::debug;

use crate::{
    any::TypeInfo,
    descriptor::{Catalog, ConstructorInvoker, MethodInvoker, PropertySetter, TypeDescriptor},
    member::MemberInfo,
    selector::Selector,
    settings::Settings,
    target::Target,
};

pub struct ConstructorDirective {
    pub member: MemberInfo,
    pub targets: Vec<Target>,
    pub(crate) signature: String,
    pub(crate) invoker: ConstructorInvoker,
}

impl ConstructorDirective {
    #[inline]
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }
}

pub struct PropertyDirective {
    pub member: MemberInfo,
    pub target: Target,
    pub(crate) setter: PropertySetter,
}

pub struct MethodDirective {
    pub member: MemberInfo,
    pub targets: Vec<Target>,
    pub(crate) invoker: MethodInvoker,
}

/// Injection plan of a type, built once and shared by every activation of it.
pub struct Plan {
    pub(crate) type_info: TypeInfo,
    pub(crate) constructors: Vec<ConstructorDirective>,
    pub(crate) properties: Vec<PropertyDirective>,
    pub(crate) methods: Vec<MethodDirective>,
}

impl Plan {
    #[inline]
    #[must_use]
    pub fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    #[inline]
    #[must_use]
    pub fn constructors(&self) -> &[ConstructorDirective] {
        &self.constructors
    }

    #[inline]
    #[must_use]
    pub fn properties(&self) -> &[PropertyDirective] {
        &self.properties
    }

    #[inline]
    #[must_use]
    pub fn methods(&self) -> &[MethodDirective] {
        &self.methods
    }
}

pub struct Planner {
    selector: Selector,
    property_injection: bool,
    method_injection: bool,
    plans: RwLock<BTreeMap<TypeInfo, Arc<Plan>>>,
    builds: AtomicUsize,
}

impl Planner {
    #[must_use]
    pub fn new(settings: &Settings, selector: Selector) -> Self {
        Self {
            selector,
            property_injection: settings.property_injection,
            method_injection: settings.method_injection,
            plans: RwLock::new(BTreeMap::new()),
            builds: AtomicUsize::new(0),
        }
    }

    /// Gets the plan of a type, building it on first use.
    /// Concurrent first calls for the same type build it once.
    pub fn get_plan(&self, catalog: &Catalog, type_info: &TypeInfo) -> Arc<Plan> {
        if let Some(plan) = self.plans.read().get(type_info) {
            return plan.clone();
        }

        let mut plans = self.plans.write();
        if let Some(plan) = plans.get(type_info) {
            return plan.clone();
        }

        let plan = Arc::new(match catalog.get(type_info) {
            Some(descriptor) => self.build(descriptor),
            None => Plan {
                type_info: *type_info,
                constructors: Vec::new(),
                properties: Vec::new(),
                methods: Vec::new(),
            },
        });
        self.builds.fetch_add(1, Ordering::Relaxed);
        plans.insert(*type_info, plan.clone());

        debug!(
            type_info = %type_info,
            constructors = plan.constructors.len(),
            properties = plan.properties.len(),
            methods = plan.methods.len(),
            "Plan built"
        );

        plan
    }

    /// Number of plans built so far
    #[inline]
    #[must_use]
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    fn build(&self, descriptor: &TypeDescriptor) -> Plan {
        let declaring = descriptor.type_info();

        let constructors = self
            .selector
            .select_constructors(descriptor)
            .into_iter()
            .map(|constructor| ConstructorDirective {
                member: constructor.member.clone(),
                targets: constructor
                    .parameters
                    .iter()
                    .map(|parameter| Target::constructor_parameter(declaring, &constructor.member, parameter))
                    .collect(),
                signature: constructor.signature(),
                invoker: constructor.invoker.clone(),
            })
            .collect();

        let properties = if self.property_injection {
            self.selector
                .select_properties(descriptor)
                .into_iter()
                .map(|property| PropertyDirective {
                    member: property.member.clone(),
                    target: Target::property(declaring, &property.member, &property.parameter),
                    setter: property.setter.clone(),
                })
                .collect()
        } else {
            Vec::new()
        };

        let methods = if self.method_injection {
            self.selector
                .select_methods(descriptor)
                .into_iter()
                .map(|method| MethodDirective {
                    member: method.member.clone(),
                    targets: method
                        .parameters
                        .iter()
                        .map(|parameter| Target::method_parameter(declaring, &method.member, parameter))
                        .collect(),
                    invoker: method.invoker.clone(),
                })
                .collect()
        } else {
            Vec::new()
        };

        Plan {
            type_info: declaring,
            constructors,
            properties,
            methods,
        }
    }
}
