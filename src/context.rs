use std::sync::{Arc, OnceLock};

use crate::{
    any::{Instance, TypeInfo},
    binding::Binding,
    errors::ResolveErrorKind,
    parameter::Parameter,
    planner::Plan,
    request::Request,
    scope::WeakScopeKey,
};

/// State of activating one binding for one request.
pub struct Context {
    pub(crate) request: Arc<Request>,
    pub(crate) binding: Arc<Binding>,
    pub(crate) implementation: TypeInfo,
    pub(crate) parameters: Vec<Parameter>,
    pub(crate) plan: OnceLock<Arc<Plan>>,
    pub(crate) scope: OnceLock<Option<WeakScopeKey>>,
    pub(crate) instance: OnceLock<Instance>,
}

impl Context {
    /// # Errors
    /// Returns [`ResolveErrorKind::DuplicateParameter`] if the request and the binding
    /// supply two parameters of the same kind for the same target
    pub(crate) fn new(request: Arc<Request>, binding: Arc<Binding>, implementation: TypeInfo) -> Result<Self, ResolveErrorKind> {
        let mut parameters: Vec<Parameter> = Vec::with_capacity(request.parameters.len() + binding.parameters.len());
        for parameter in request.parameters.iter().chain(binding.parameters.iter()) {
            if parameters.iter().any(|existing| existing.conflicts_with(parameter)) {
                return Err(ResolveErrorKind::DuplicateParameter {
                    name: parameter.describe(),
                    path: request.path(),
                });
            }
            parameters.push(parameter.clone());
        }

        Ok(Self {
            request,
            binding,
            implementation,
            parameters,
            plan: OnceLock::new(),
            scope: OnceLock::new(),
            instance: OnceLock::new(),
        })
    }

    #[inline]
    #[must_use]
    pub fn request(&self) -> &Arc<Request> {
        &self.request
    }

    #[inline]
    #[must_use]
    pub fn binding(&self) -> &Arc<Binding> {
        &self.binding
    }

    #[inline]
    #[must_use]
    pub fn implementation(&self) -> TypeInfo {
        self.implementation
    }

    #[inline]
    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    #[inline]
    #[must_use]
    pub fn plan(&self) -> Option<&Arc<Plan>> {
        self.plan.get()
    }

    #[inline]
    #[must_use]
    pub fn instance(&self) -> Option<&Instance> {
        self.instance.get()
    }

    /// Id of the scope the context resolved to, `None` while unresolved or for transient bindings.
    #[inline]
    #[must_use]
    pub(crate) fn scope_id(&self) -> Option<usize> {
        self.scope.get().and_then(|scope| scope.as_ref().map(WeakScopeKey::id))
    }

    /// A context is cyclical if an ancestor activates the same binding within the same scope.
    #[must_use]
    pub(crate) fn is_cyclical(&self) -> bool {
        if !self
            .request
            .active_bindings
            .iter()
            .any(|binding| Arc::ptr_eq(binding, &self.binding))
        {
            return false;
        }

        let scope_id = self.scope_id();
        let mut parent = self.request.parent_context();
        while let Some(context) = parent {
            if Arc::ptr_eq(&context.binding, &self.binding) && context.scope_id() == scope_id {
                return true;
            }
            parent = context.request.parent_context();
        }
        false
    }

    /// Whether an ancestor is constructing or activating the same implementation within the same scope.
    /// Such an ancestor already holds the construction lock of that pair.
    #[must_use]
    pub(crate) fn has_scoped_ancestor(&self) -> bool {
        let Some(scope_id) = self.scope_id() else {
            return false;
        };

        let mut parent = self.request.parent_context();
        while let Some(context) = parent {
            if context.implementation == self.implementation && context.scope_id() == Some(scope_id) {
                return true;
            }
            parent = context.request.parent_context();
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::Context;
    use crate::{
        any::TypeInfo,
        binding::Binding,
        errors::ResolveErrorKind,
        member::{MemberInfo, ParameterDescriptor},
        parameter::Parameter,
        request::Request,
        scope::ScopeKey,
        target::Target,
    };

    use std::sync::Arc;

    struct Samurai;

    fn binding() -> Arc<Binding> {
        Arc::new(Binding::bind::<Samurai>().to_self().build())
    }

    #[test]
    fn test_duplicate_parameters() {
        let request = Arc::new(Request::of::<Samurai>().with_parameter(Parameter::constructor_argument("name", 1u8)));
        let binding = Arc::new(
            Binding::bind::<Samurai>()
                .to_self()
                .with_parameter(Parameter::constructor_argument("name", 2u8))
                .build(),
        );

        assert!(matches!(
            Context::new(request, binding, TypeInfo::of::<Samurai>()),
            Err(ResolveErrorKind::DuplicateParameter { name, .. }) if name == "name"
        ));
    }

    #[test]
    fn test_cycle_requires_same_scope() {
        let binding = binding();
        let implementation = TypeInfo::of::<Samurai>();
        let target = Target::constructor_parameter(
            implementation,
            &MemberInfo::public("new"),
            &ParameterDescriptor::of::<Samurai>("other"),
        );

        let root = Arc::new(Context::new(Arc::new(Request::of::<Samurai>()), binding.clone(), implementation).unwrap());
        root.scope.set(None).unwrap();

        let child = Context::new(Arc::new(Request::child(&root, &target)), binding.clone(), implementation).unwrap();
        child.scope.set(None).unwrap();
        assert!(child.is_cyclical());

        let key = ScopeKey::new("custom");
        let scoped = Context::new(Arc::new(Request::child(&root, &target)), binding, implementation).unwrap();
        scoped.scope.set(Some(key.downgrade())).unwrap();
        assert!(!scoped.is_cyclical());
    }

    #[test]
    fn test_child_inherits_only_inherited_parameters() {
        let binding = binding();
        let implementation = TypeInfo::of::<Samurai>();
        let request = Request::of::<Samurai>()
            .with_parameter(Parameter::constructor_argument("kept", 1u8).inherited(true))
            .with_parameter(Parameter::constructor_argument("dropped", 2u8));
        let root = Arc::new(Context::new(Arc::new(request), binding, implementation).unwrap());
        let target = Target::constructor_parameter(
            implementation,
            &MemberInfo::public("new"),
            &ParameterDescriptor::of::<u8>("kept"),
        );

        let child = Request::child(&root, &target);

        assert_eq!(child.parameters().len(), 1);
        assert_eq!(child.parameters()[0].name(), Some("kept"));
        assert_eq!(child.depth(), 1);
        assert_eq!(
            child.path().0,
            vec![
                String::from("Injection of dependency u8 into parameter kept of constructor new of type Samurai"),
                String::from("Request for Samurai"),
            ]
        );
    }
}
