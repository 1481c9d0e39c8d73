use std::sync::Arc;

use crate::{
    any::{downcast_service, ServiceValue, TypeInfo},
    errors::InstantiateErrorKind,
};

/// Resolved value for a single target.
#[derive(Clone)]
pub enum Argument {
    Absent,
    Value(ServiceValue),
    Many(Vec<ServiceValue>),
}

impl Argument {
    #[inline]
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Argument::Absent)
    }
}

/// Arguments handed to a constructor or method invoker, in parameter declaration order.
#[derive(Clone, Default)]
pub struct Arguments {
    values: Vec<Argument>,
}

impl Arguments {
    #[inline]
    #[must_use]
    pub(crate) fn new(values: Vec<Argument>) -> Self {
        Self { values }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Gets a required argument
    ///
    /// # Errors
    /// - Returns [`InstantiateErrorKind::MissingArgument`] if the argument is absent or out of range
    /// - Returns [`InstantiateErrorKind::IncorrectArgumentType`] if the argument isn't an `Arc<S>`
    pub fn get<S: ?Sized + Send + Sync + 'static>(&self, index: usize) -> Result<Arc<S>, InstantiateErrorKind> {
        self.optional(index)?.ok_or(InstantiateErrorKind::MissingArgument { index })
    }

    /// Gets an argument that may be absent
    ///
    /// # Errors
    /// - Returns [`InstantiateErrorKind::MissingArgument`] if the index is out of range
    /// - Returns [`InstantiateErrorKind::IncorrectArgumentType`] if the argument isn't an `Arc<S>`
    pub fn optional<S: ?Sized + Send + Sync + 'static>(&self, index: usize) -> Result<Option<Arc<S>>, InstantiateErrorKind> {
        match self.values.get(index) {
            None => Err(InstantiateErrorKind::MissingArgument { index }),
            Some(Argument::Absent) => Ok(None),
            Some(Argument::Value(value)) => downcast(value, index).map(Some),
            Some(Argument::Many(_)) => Err(InstantiateErrorKind::IncorrectArgumentType {
                index,
                expected: TypeInfo::of::<S>(),
            }),
        }
    }

    /// Gets a collection argument
    ///
    /// # Errors
    /// - Returns [`InstantiateErrorKind::MissingArgument`] if the index is out of range
    /// - Returns [`InstantiateErrorKind::IncorrectArgumentType`] if an element isn't an `Arc<S>`
    pub fn all<S: ?Sized + Send + Sync + 'static>(&self, index: usize) -> Result<Vec<Arc<S>>, InstantiateErrorKind> {
        match self.values.get(index) {
            None => Err(InstantiateErrorKind::MissingArgument { index }),
            Some(Argument::Absent) => Ok(Vec::new()),
            Some(Argument::Value(value)) => downcast(value, index).map(|value| vec![value]),
            Some(Argument::Many(values)) => values.iter().map(|value| downcast(value, index)).collect(),
        }
    }
}

fn downcast<S: ?Sized + Send + Sync + 'static>(value: &ServiceValue, index: usize) -> Result<Arc<S>, InstantiateErrorKind> {
    downcast_service(value).ok_or(InstantiateErrorKind::IncorrectArgumentType {
        index,
        expected: TypeInfo::of::<S>(),
    })
}
