// storefront/src/pipelines/common_steps.rs

//! Helpers shared by the pipeline definitions.

use crate::errors::{AppError, Result as AppResult};
use crate::state::AppState;
use std::sync::Arc;
use stepflow::{ContextData, PipelineResult, SkipCondition};
use tracing::warn;

/// Skip condition from a predicate over the context data.
pub fn skip_when<T>(predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Option<SkipCondition<T>>
where
  T: Send + Sync + 'static,
{
  Some(Arc::new(move |ctx: ContextData<T>| ctx.with(|data| predicate(data))))
}

/// Runs the pipeline registered for `T` and unwraps engine-wrapped app errors.
pub async fn run_registered<T>(app_state: &AppState, ctx: &ContextData<T>) -> AppResult<PipelineResult>
where
  T: Send + Sync + 'static,
{
  app_state.registry.run(ctx.clone()).await.map_err(AppError::flatten)
}

/// For pipelines where no handler is expected to stop early.
pub fn require_completed(result: PipelineResult, pipeline: &str) -> AppResult<()> {
  if result.is_completed() {
    Ok(())
  } else {
    warn!(%pipeline, "Pipeline was halted by a handler.");
    Err(AppError::Internal(format!("{} pipeline stopped before completion", pipeline)))
  }
}

/// Missing context state means an earlier step did not do its job.
pub fn missing(field: &str) -> AppError {
  AppError::Internal(format!("pipeline context is missing {}", field))
}
