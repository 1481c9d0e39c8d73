use std::sync::Arc;
use tracing::debug;

use crate::{
    any::{Instance, TypeInfo},
    arguments::{Argument, Arguments},
    context::Context,
    descriptor::Catalog,
    errors::{InstantiateErrorKind, ResolveErrorKind},
    kernel::Kernel,
    planner::{ConstructorDirective, Plan},
    request::Request,
    target::Target,
};

/// Produces instances for a binding.
pub trait Provider: Send + Sync {
    /// Concrete type the provider yields for `request`.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::OpenGenericNotClosed`] if an open generic implementation can't be closed
    fn implementation(&self, catalog: &Catalog, request: &Request) -> Result<TypeInfo, ResolveErrorKind>;

    /// Creates an instance. `None` means the provider produced nothing.
    ///
    /// # Errors
    /// Returns any error raised while resolving dependencies or creating the instance
    fn create(&self, kernel: &Kernel, context: &Arc<Context>) -> Result<Option<Instance>, ResolveErrorKind>;
}

/// Builds instances of described types through their injection plan.
pub struct StandardProvider {
    implementation: TypeInfo,
    open_generic: bool,
}

impl StandardProvider {
    #[inline]
    #[must_use]
    pub fn new(implementation: TypeInfo) -> Self {
        Self {
            implementation,
            open_generic: false,
        }
    }

    /// Provider closing the open generic `definition` over the generic arguments of each request.
    #[inline]
    #[must_use]
    pub fn open_generic(definition: TypeInfo) -> Self {
        Self {
            implementation: definition,
            open_generic: true,
        }
    }
}

impl Provider for StandardProvider {
    fn implementation(&self, catalog: &Catalog, request: &Request) -> Result<TypeInfo, ResolveErrorKind> {
        if !self.open_generic {
            return Ok(self.implementation);
        }

        let arguments = catalog
            .get(&request.service)
            .and_then(|descriptor| descriptor.generic())
            .map(|generic| generic.arguments.clone())
            .unwrap_or_default();
        catalog
            .close(&self.implementation, &arguments)
            .ok_or_else(|| ResolveErrorKind::OpenGenericNotClosed {
                definition: self.implementation,
                arguments,
                path: request.path(),
            })
    }

    fn create(&self, kernel: &Kernel, context: &Arc<Context>) -> Result<Option<Instance>, ResolveErrorKind> {
        let plan = context.plan.get_or_init(|| kernel.plan(&context.implementation)).clone();
        let directive = select_constructor(kernel, context, &plan)?;

        let arguments = resolve_targets(kernel, context, &directive.targets)?;
        let instance = (directive.invoker)(&arguments).map_err(|source| instantiate_error(context, source))?;

        for property in &plan.properties {
            match resolve_target(kernel, context, &property.target)? {
                Argument::Value(value) => {
                    (property.setter)(&instance, &value).map_err(|source| instantiate_error(context, source))?;
                }
                Argument::Absent | Argument::Many(_) => {
                    debug!(property = property.member.name, "Property left untouched");
                }
            }
        }

        for method in &plan.methods {
            let arguments = resolve_targets(kernel, context, &method.targets)?;
            (method.invoker)(&instance, &arguments).map_err(|source| instantiate_error(context, source))?;
        }

        Ok(Some(instance))
    }
}

fn instantiate_error(context: &Context, source: InstantiateErrorKind) -> ResolveErrorKind {
    ResolveErrorKind::Instantiate {
        implementation: context.implementation,
        source,
        path: context.request.path(),
    }
}

fn select_constructor<'a>(kernel: &Kernel, context: &Arc<Context>, plan: &'a Plan) -> Result<&'a ConstructorDirective, ResolveErrorKind> {
    let mut best: Vec<&ConstructorDirective> = Vec::new();
    let mut best_score = i64::MIN;

    for directive in &plan.constructors {
        let score = kernel.score(context, directive);
        debug!(constructor = directive.signature(), score, "Constructor scored");

        if best.is_empty() || score > best_score {
            best.clear();
            best.push(directive);
            best_score = score;
        } else if score == best_score {
            best.push(directive);
        }
    }

    match best.as_slice() {
        [] => Err(ResolveErrorKind::NoConstructorsAvailable {
            implementation: context.implementation,
            path: context.request.path(),
        }),
        [directive] => Ok(*directive),
        directives => Err(ResolveErrorKind::AmbiguousConstructor {
            implementation: context.implementation,
            constructors: directives.iter().map(|directive| directive.signature.clone()).collect(),
            score: best_score,
            path: context.request.path(),
        }),
    }
}

fn resolve_targets(kernel: &Kernel, context: &Arc<Context>, targets: &[Target]) -> Result<Arguments, ResolveErrorKind> {
    targets
        .iter()
        .map(|target| resolve_target(kernel, context, target))
        .collect::<Result<Vec<_>, _>>()
        .map(Arguments::new)
}

/// Resolves the value of one target: an applicable explicit parameter wins, otherwise a child request is resolved.
pub(crate) fn resolve_target(kernel: &Kernel, context: &Arc<Context>, target: &Target) -> Result<Argument, ResolveErrorKind> {
    let mut parameters = context.parameters.iter().filter(|parameter| parameter.applies_to(target));
    if let Some(parameter) = parameters.next() {
        if parameters.next().is_some() {
            return Err(ResolveErrorKind::DuplicateParameter {
                name: target.name().to_owned(),
                path: context.request.path(),
            });
        }
        return Ok(parameter.value(context, target).map_or(Argument::Absent, Argument::Value));
    }

    let request = Arc::new(Request::child(context, target));
    let service = target.service();
    let mut values = Vec::new();
    for activated in kernel.resolve_request(request.clone())? {
        if let Some(activated) = activated? {
            values.push(kernel.service_value(&activated, &service)?);
        }
    }

    if target.is_many() {
        return Ok(Argument::Many(values));
    }
    match values.len() {
        0 => Ok(Argument::Absent),
        1 => Ok(values.pop().map_or(Argument::Absent, Argument::Value)),
        count => Err(ResolveErrorKind::AmbiguousDependency {
            service,
            target: target.to_string(),
            count,
            path: request.path(),
        }),
    }
}

type Callback = Arc<dyn Fn(&Kernel, &Context) -> Result<Option<Instance>, InstantiateErrorKind> + Send + Sync>;

/// Provider delegating to a user function.
pub struct CallbackProvider {
    implementation: TypeInfo,
    callback: Callback,
}

impl CallbackProvider {
    #[must_use]
    pub fn new<F>(implementation: TypeInfo, callback: F) -> Self
    where
        F: Fn(&Kernel, &Context) -> Result<Option<Instance>, InstantiateErrorKind> + Send + Sync + 'static,
    {
        Self {
            implementation,
            callback: Arc::new(callback),
        }
    }
}

impl Provider for CallbackProvider {
    fn implementation(&self, _catalog: &Catalog, _request: &Request) -> Result<TypeInfo, ResolveErrorKind> {
        Ok(self.implementation)
    }

    fn create(&self, kernel: &Kernel, context: &Arc<Context>) -> Result<Option<Instance>, ResolveErrorKind> {
        (self.callback)(kernel, context).map_err(|source| instantiate_error(context, source))
    }
}

/// Provider returning the same instance every time.
pub struct ConstantProvider {
    instance: Instance,
    implementation: TypeInfo,
}

impl ConstantProvider {
    #[inline]
    #[must_use]
    pub fn new(instance: Instance, implementation: TypeInfo) -> Self {
        Self { instance, implementation }
    }
}

impl Provider for ConstantProvider {
    fn implementation(&self, _catalog: &Catalog, _request: &Request) -> Result<TypeInfo, ResolveErrorKind> {
        Ok(self.implementation)
    }

    fn create(&self, _kernel: &Kernel, _context: &Arc<Context>) -> Result<Option<Instance>, ResolveErrorKind> {
        Ok(Some(self.instance.clone()))
    }
}

/// Provider yielding the declared default value of a target nothing is bound for.
pub struct DefaultValueProvider {
    value: Instance,
    implementation: TypeInfo,
}

impl DefaultValueProvider {
    #[inline]
    #[must_use]
    pub fn new(value: Instance, implementation: TypeInfo) -> Self {
        Self { value, implementation }
    }
}

impl Provider for DefaultValueProvider {
    fn implementation(&self, _catalog: &Catalog, _request: &Request) -> Result<TypeInfo, ResolveErrorKind> {
        Ok(self.implementation)
    }

    fn create(&self, _kernel: &Kernel, _context: &Arc<Context>) -> Result<Option<Instance>, ResolveErrorKind> {
        Ok(Some(self.value.clone()))
    }
}
