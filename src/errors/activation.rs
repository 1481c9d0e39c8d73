/// Failure raised by an activation or deactivation hook.
#[derive(thiserror::Error, Debug)]
pub enum ActivationErrorKind {
    #[error("Initialization failed: {0}")]
    Initialize(anyhow::Error),
    #[error("Start failed: {0}")]
    Start(anyhow::Error),
    #[error("Stop failed: {0}")]
    Stop(anyhow::Error),
    #[error("Dispose failed: {0}")]
    Dispose(anyhow::Error),
    #[error("Binding action failed: {0}")]
    Action(anyhow::Error),
}
