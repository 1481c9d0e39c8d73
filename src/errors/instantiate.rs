use crate::any::TypeInfo;

/// Failure raised by a constructor, property setter, method invoker or callback provider.
#[derive(thiserror::Error, Debug)]
pub enum InstantiateErrorKind {
    #[error("Argument {index} wasn't supplied")]
    MissingArgument { index: usize },
    #[error("Argument {index} has incorrect type, expected: {expected}")]
    IncorrectArgumentType { index: usize, expected: TypeInfo },
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}
