mod activation;
mod instantiate;
mod resolve;

pub use activation::ActivationErrorKind;
pub use instantiate::InstantiateErrorKind;
pub use resolve::{ActivationPath, ResolveErrorKind};
