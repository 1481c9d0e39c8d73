use core::fmt::{self, Display, Formatter};

use super::{activation::ActivationErrorKind, instantiate::InstantiateErrorKind};
use crate::any::TypeInfo;

/// Rendered chain of requests leading to a failure, innermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationPath(pub Vec<String>);

impl ActivationPath {
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for ActivationPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Activation path:")?;
        let depth = self.0.len();
        for (index, step) in self.0.iter().enumerate() {
            write!(f, "\n  {}) {}", depth - index, step)?;
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ResolveErrorKind {
    #[error("No matching bindings are available, and the type {service} isn't self-bindable.\n{path}")]
    NotResolvable { service: TypeInfo, path: ActivationPath },
    #[error("More than one matching binding is available for {service}: {}.\n{path}", .candidates.join(", "))]
    AmbiguousBinding {
        service: TypeInfo,
        candidates: Vec<String>,
        path: ActivationPath,
    },
    #[error("No constructors are available to create an instance of {implementation}.\n{path}")]
    NoConstructorsAvailable { implementation: TypeInfo, path: ActivationPath },
    #[error(
        "Several constructors of {implementation} have the same score ({score}): {}.\n{path}",
        .constructors.join(", ")
    )]
    AmbiguousConstructor {
        implementation: TypeInfo,
        constructors: Vec<String>,
        score: i64,
        path: ActivationPath,
    },
    #[error("{count} instances of {service} were resolved for {target}, but only one was expected.\n{path}")]
    AmbiguousDependency {
        service: TypeInfo,
        target: String,
        count: usize,
        path: ActivationPath,
    },
    #[error("Parameter {name} was supplied more than once.\n{path}")]
    DuplicateParameter { name: String, path: ActivationPath },
    #[error("Cyclic dependency detected while activating {service}.\n{path}")]
    CyclicDependency { service: TypeInfo, path: ActivationPath },
    #[error("Provider of {service} returned nothing and null injection is disabled.\n{path}")]
    ProviderReturnedNothing { service: TypeInfo, path: ActivationPath },
    #[error("Invalid argument {argument}: {reason}")]
    ArgumentInvalid { argument: &'static str, reason: String },
    #[error("Incorrect type. Actual: {actual}, expected: {expected}.\n{path}")]
    IncorrectType {
        expected: TypeInfo,
        actual: TypeInfo,
        path: ActivationPath,
    },
    #[error("Open generic {definition} has no implementation closed over [{}].\n{path}", .arguments.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    OpenGenericNotClosed {
        definition: TypeInfo,
        arguments: Vec<TypeInfo>,
        path: ActivationPath,
    },
    #[error("Failed to create {implementation}: {source}\n{path}")]
    Instantiate {
        implementation: TypeInfo,
        #[source]
        source: InstantiateErrorKind,
        path: ActivationPath,
    },
    #[error("Failed to activate {implementation}: {source}\n{path}")]
    Activation {
        implementation: TypeInfo,
        #[source]
        source: ActivationErrorKind,
        path: ActivationPath,
    },
}

impl ResolveErrorKind {
    /// Activation path attached to the failure, if it was raised during resolution.
    #[must_use]
    pub fn path(&self) -> Option<&ActivationPath> {
        match self {
            Self::NotResolvable { path, .. }
            | Self::AmbiguousBinding { path, .. }
            | Self::NoConstructorsAvailable { path, .. }
            | Self::AmbiguousConstructor { path, .. }
            | Self::AmbiguousDependency { path, .. }
            | Self::DuplicateParameter { path, .. }
            | Self::CyclicDependency { path, .. }
            | Self::ProviderReturnedNothing { path, .. }
            | Self::IncorrectType { path, .. }
            | Self::OpenGenericNotClosed { path, .. }
            | Self::Instantiate { path, .. }
            | Self::Activation { path, .. } => Some(path),
            Self::ArgumentInvalid { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ActivationPath, ResolveErrorKind};
    use crate::any::TypeInfo;

    struct Samurai;

    #[test]
    fn test_path_display() {
        let path = ActivationPath(vec![
            "Injection of dependency Weapon into parameter weapon of constructor new of type Samurai".to_string(),
            "Request for Samurai".to_string(),
        ]);

        assert_eq!(
            path.to_string(),
            "Activation path:\n  2) Injection of dependency Weapon into parameter weapon of constructor new of type Samurai\n  1) Request for Samurai"
        );
    }

    #[test]
    fn test_error_carries_path() {
        let err = ResolveErrorKind::NotResolvable {
            service: TypeInfo::of::<Samurai>(),
            path: ActivationPath(vec!["Request for Samurai".to_string()]),
        };

        assert_eq!(err.path().map(ActivationPath::len), Some(1));
        assert!(err.to_string().contains("Samurai"));
    }
}
