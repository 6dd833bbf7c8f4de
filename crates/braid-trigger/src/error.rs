/// Error type for trigger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TriggerError {
  #[error("trigger already registered: {0}")]
  AlreadyRegistered(String),

  #[error("trigger not found: {0}")]
  NotFound(String),

  #[error("unknown workflow: {0}")]
  UnknownWorkflow(String),

  #[error("failed to launch workflow: {0}")]
  Launch(String),

  #[error("trigger '{0}' is not attached to a trigger service")]
  NotAttached(String),

  #[error("no tokio runtime available to drive the trigger")]
  NoRuntime,
}
