// stepflow/src/pipeline/execution.rs

//! `Pipeline::run()`: walks the steps and their handler phases in order.

use crate::core::context_data::ContextData;
use crate::core::control::{PipelineControl, PipelineResult};
use crate::core::step::StepDef;
use crate::error::FlowError;
use crate::pipeline::definition::Pipeline;
use crate::pipeline::hooks::Phase;
use tracing::{event, info_span, instrument, Instrument, Level};

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Executes every step against `ctx_data`.
  ///
  /// Engine failures (a handler bound to an unknown step, a non-optional step
  /// without handlers) are reported as `Err::from(FlowError)`.
  #[instrument(
    name = "Pipeline::run",
    skip_all,
    fields(
      context_type = %std::any::type_name::<TData>(),
      num_steps = self.steps.len(),
    ),
    err(Display)
  )]
  pub async fn run(&self, ctx_data: ContextData<TData>) -> Result<PipelineResult, Err> {
    if let Some(step_name) = self.orphaned_handler_step() {
      event!(Level::ERROR, %step_name, "Handlers registered for a step that is not defined.");
      return Err(Err::from(FlowError::StepNotFound {
        step_name: step_name.to_string(),
      }));
    }

    event!(Level::DEBUG, "Pipeline execution starting.");
    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_span = info_span!(
        "pipeline_step",
        step_name = step_def.name.as_str(),
        step_index = step_idx,
        optional = step_def.optional
      );
      if let Some(result) = self.run_step(step_def, &ctx_data).instrument(step_span).await? {
        return Ok(result);
      }
    }

    event!(Level::DEBUG, "Pipeline execution completed.");
    Ok(PipelineResult::Completed)
  }

  /// `Ok(Some(Stopped))` when a handler halted the run, `Ok(None)` to move on.
  async fn run_step(&self, step_def: &StepDef<TData>, ctx_data: &ContextData<TData>) -> Result<Option<PipelineResult>, Err> {
    if step_def.should_skip(ctx_data) {
      event!(Level::INFO, "Step skipped by its skip condition.");
      return Ok(None);
    }

    let step_name = step_def.name.as_str();
    let handler_count: usize = [Phase::Before, Phase::On, Phase::After]
      .iter()
      .map(|phase| self.handlers(*phase, step_name).len())
      .sum();

    if handler_count == 0 {
      if step_def.optional {
        event!(Level::DEBUG, "Optional step has no handlers, passing over.");
        return Ok(None);
      }
      event!(Level::ERROR, "Non-optional step has no handlers.");
      return Err(Err::from(FlowError::HandlerMissing {
        step_name: step_def.name.clone(),
      }));
    }

    for phase in [Phase::Before, Phase::On, Phase::After] {
      if self.run_phase(phase, step_name, ctx_data).await? == PipelineControl::Stop {
        event!(Level::INFO, phase = phase.as_str(), "Pipeline stopped by a handler.");
        return Ok(Some(PipelineResult::Stopped));
      }
    }
    event!(Level::DEBUG, "Step finished.");
    Ok(None)
  }

  async fn run_phase(&self, phase: Phase, step_name: &str, ctx_data: &ContextData<TData>) -> Result<PipelineControl, Err> {
    for (handler_idx, handler_fn) in self.handlers(phase, step_name).iter().enumerate() {
      let handler_span = tracing::debug_span!("handler", phase = phase.as_str(), handler_index = handler_idx);
      match handler_fn(ctx_data.clone()).instrument(handler_span).await {
        Ok(PipelineControl::Continue) => {}
        Ok(PipelineControl::Stop) => return Ok(PipelineControl::Stop),
        Err(e) => {
          event!(Level::ERROR, error = %e, phase = phase.as_str(), "Handler failed.");
          return Err(e);
        }
      }
    }
    Ok(PipelineControl::Continue)
  }
}
