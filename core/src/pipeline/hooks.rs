// stepflow/src/pipeline/hooks.rs

//! Registration of `before`, `on` and `after` handlers.

use crate::core::context::Handler;
use crate::core::context_data::ContextData;
use crate::core::control::PipelineControl;
use crate::error::FlowError;
use crate::pipeline::definition::Pipeline;
use std::future::Future;
use tracing::{event, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
  Before,
  On,
  After,
}

impl Phase {
  pub(crate) fn as_str(self) -> &'static str {
    match self {
      Phase::Before => "before",
      Phase::On => "on",
      Phase::After => "after",
    }
  }
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  fn push_handler<F, UserErr>(
    &mut self,
    phase: Phase,
    step_name: &str,
    handler_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static,
  ) where
    F: Future<Output = Result<PipelineControl, UserErr>> + Send + 'static,
    UserErr: Into<Err> + Send + Sync + 'static,
  {
    if !self.has_step(step_name) {
      // Not fatal here: `run` rejects the pipeline with StepNotFound.
      event!(Level::WARN, %step_name, phase = phase.as_str(), "Handler attached to an undefined step.");
    }
    let handler: Handler<TData, Err> = Box::new(move |ctx_data| {
      let user_fut = handler_fn(ctx_data);
      Box::pin(async move { user_fut.await.map_err(Into::into) })
    });
    let slot = match phase {
      Phase::Before => &mut self.before,
      Phase::On => &mut self.on,
      Phase::After => &mut self.after,
    };
    slot.entry(step_name.to_string()).or_default().push(handler);
  }

  /// Registers a handler that runs before the step's `on` handlers.
  ///
  /// The handler's own error type only needs to convert into the pipeline's `Err`.
  pub fn before_root<F, UserErr>(
    &mut self,
    step_name: &str,
    handler_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static,
  ) where
    F: Future<Output = Result<PipelineControl, UserErr>> + Send + 'static,
    UserErr: Into<Err> + Send + Sync + 'static,
  {
    self.push_handler(Phase::Before, step_name, handler_fn);
  }

  pub fn on_root<F, UserErr>(
    &mut self,
    step_name: &str,
    handler_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static,
  ) where
    F: Future<Output = Result<PipelineControl, UserErr>> + Send + 'static,
    UserErr: Into<Err> + Send + Sync + 'static,
  {
    self.push_handler(Phase::On, step_name, handler_fn);
  }

  pub fn after_root<F, UserErr>(
    &mut self,
    step_name: &str,
    handler_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static,
  ) where
    F: Future<Output = Result<PipelineControl, UserErr>> + Send + 'static,
    UserErr: Into<Err> + Send + Sync + 'static,
  {
    self.push_handler(Phase::After, step_name, handler_fn);
  }

  pub(crate) fn handlers(&self, phase: Phase, step_name: &str) -> &[Handler<TData, Err>] {
    let slot = match phase {
      Phase::Before => &self.before,
      Phase::On => &self.on,
      Phase::After => &self.after,
    };
    slot.get(step_name).map(Vec::as_slice).unwrap_or(&[])
  }
}
