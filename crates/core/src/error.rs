use thiserror::Error;

/// Error taxonomy shared across every crate in the pipeline. Kinds map
/// directly to the ERROR HANDLING DESIGN table: most are non-fatal by
/// construction (the pipeline decides what to do with them), `PipelineFatal`
/// is the only one that always fails a task.
#[derive(Error, Debug)]
pub enum Error {
  /// Broker envelope failed validation. Never touches a task; the delivery
  /// is rejected without requeue.
  #[error("bad message: {0}")]
  BadMessage(String),

  #[error("registry unavailable: {0}")]
  RegistryUnavailable(String),

  #[error("object store unavailable: {0}")]
  ObjectStoreUnavailable(String),

  #[error("broker disconnected: {0}")]
  BrokerDisconnected(String),

  #[error("not found: {entity} {id}")]
  NotFound { entity: &'static str, id: String },

  #[error("validation: {0}")]
  Validation(String),

  /// Any uncaught failure that reaches the top of a pipeline run. Carries
  /// the one-line message written to the task's `errorMessage` field.
  #[error("pipeline failed: {0}")]
  PipelineFatal(String),

  #[error("io: {0}")]
  Io(#[from] std::io::Error),
}

impl From<crate::validation::ValidationError> for Error {
  fn from(err: crate::validation::ValidationError) -> Self {
    Error::Validation(err.to_string())
  }
}

pub type Result<T> = std::result::Result<T, Error>;
