// stepflow/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
  #[error("Step not found: {step_name}")]
  StepNotFound { step_name: String },

  #[error("Step already defined: {step_name}")]
  DuplicateStep { step_name: String },

  #[error("Handler missing for non-optional step: {step_name}")]
  HandlerMissing { step_name: String },

  #[error("No pipeline registered for context type {type_name}")]
  NotRegistered { type_name: String },

  #[error("Type mismatch during context dispatch (expected {expected_type})")]
  TypeMismatch { expected_type: String },

  #[error("Error in handler or external operation. Source: {source}")]
  HandlerError {
    #[source]
    source: AnyhowError,
  },
}

impl From<AnyhowError> for FlowError {
  fn from(err: AnyhowError) -> Self {
    // Unwrap a FlowError that travelled through anyhow instead of nesting it.
    match err.downcast::<FlowError>() {
      Ok(flow_err) => flow_err,
      Err(source) => FlowError::HandlerError { source },
    }
  }
}

pub type FlowResult<T, E = FlowError> = std::result::Result<T, E>;
