use std::sync::{Arc, Weak};

use crate::{
    any::TypeInfo,
    binding::{Binding, BindingMetadata},
    context::Context,
    errors::ActivationPath,
    parameter::Parameter,
    scope::WeakScopeKey,
    target::Target,
};

type ConstraintPredicate = Arc<dyn Fn(&BindingMetadata) -> bool + Send + Sync>;

/// Predicate over binding metadata restricting which bindings may satisfy a request.
#[derive(Clone)]
pub struct Constraint {
    description: String,
    predicate: ConstraintPredicate,
}

impl Constraint {
    #[must_use]
    pub fn new<F>(description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&BindingMetadata) -> bool + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            predicate: Arc::new(predicate),
        }
    }

    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(format!("named {name}"), move |metadata| metadata.name() == Some(name.as_str()))
    }

    #[inline]
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[inline]
    #[must_use]
    pub fn matches(&self, metadata: &BindingMetadata) -> bool {
        (self.predicate)(metadata)
    }
}

/// A demand for instances of a service, either from a caller or for a target of a parent context.
#[derive(Clone)]
pub struct Request {
    pub(crate) service: TypeInfo,
    pub(crate) constraint: Option<Constraint>,
    pub(crate) parameters: Vec<Parameter>,
    pub(crate) parent: Option<Weak<Context>>,
    pub(crate) target: Option<Target>,
    pub(crate) active_bindings: Vec<Arc<Binding>>,
    pub(crate) activation_scope: Option<WeakScopeKey>,
    pub(crate) depth: usize,
    pub(crate) optional: bool,
    pub(crate) unique: bool,
}

impl Request {
    #[inline]
    #[must_use]
    pub fn new(service: TypeInfo) -> Self {
        Self {
            service,
            constraint: None,
            parameters: Vec::new(),
            parent: None,
            target: None,
            active_bindings: Vec::new(),
            activation_scope: None,
            depth: 0,
            optional: false,
            unique: true,
        }
    }

    #[inline]
    #[must_use]
    pub fn of<S: ?Sized + 'static>() -> Self {
        Self::new(TypeInfo::of::<S>())
    }

    #[inline]
    #[must_use]
    pub fn named(self, name: impl Into<String>) -> Self {
        self.with_constraint(Constraint::named(name))
    }

    #[inline]
    #[must_use]
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraint = Some(constraint);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_parameters(mut self, parameters: impl IntoIterator<Item = Parameter>) -> Self {
        self.parameters.extend(parameters);
        self
    }

    /// Resolving to nothing yields an empty result instead of an error.
    #[inline]
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Every matching binding is activated instead of exactly one.
    #[inline]
    #[must_use]
    pub fn multiple(mut self) -> Self {
        self.unique = false;
        self
    }

    #[inline]
    #[must_use]
    pub(crate) fn in_activation_scope(mut self, scope: WeakScopeKey) -> Self {
        self.activation_scope = Some(scope);
        self
    }

    /// Request resolving `target` of `parent`.
    #[must_use]
    pub(crate) fn child(parent: &Arc<Context>, target: &Target) -> Self {
        let mut active_bindings = Vec::with_capacity(parent.request.active_bindings.len() + 1);
        active_bindings.extend(parent.request.active_bindings.iter().cloned());
        active_bindings.push(parent.binding.clone());

        Self {
            service: target.service(),
            constraint: target.constraint().map(Constraint::named),
            parameters: parent
                .parameters
                .iter()
                .filter(|parameter| parameter.is_inherited())
                .cloned()
                .collect(),
            parent: Some(Arc::downgrade(parent)),
            target: Some(target.clone()),
            active_bindings,
            activation_scope: parent.request.activation_scope.clone(),
            depth: parent.request.depth + 1,
            optional: target.is_optional() || target.is_many(),
            unique: !target.is_many(),
        }
    }

    #[inline]
    #[must_use]
    pub fn service(&self) -> TypeInfo {
        self.service
    }

    #[inline]
    #[must_use]
    pub fn constraint(&self) -> Option<&Constraint> {
        self.constraint.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    #[inline]
    #[must_use]
    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    #[inline]
    #[must_use]
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    #[inline]
    #[must_use]
    pub fn parent_context(&self) -> Option<Arc<Context>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Whether the binding's condition and the request's constraint both accept it.
    #[must_use]
    pub(crate) fn matches(&self, binding: &Binding) -> bool {
        binding.matches(self)
            && self
                .constraint
                .as_ref()
                .map_or(true, |constraint| constraint.matches(binding.metadata()))
    }

    /// Chain of requests from this one up to the root, innermost first.
    #[must_use]
    pub fn path(&self) -> ActivationPath {
        let mut steps = vec![self.describe()];
        let mut parent = self.parent_context();
        while let Some(context) = parent {
            steps.push(context.request.describe());
            parent = context.request.parent_context();
        }
        ActivationPath(steps)
    }

    fn describe(&self) -> String {
        match &self.target {
            Some(target) => format!("Injection of dependency {} into {}", self.service, target),
            None => format!("Request for {}", self.service),
        }
    }
}
