// stepflow/src/registry.rs

//! `Registry<E>`: pipelines keyed by their context type.
//!
//! Each registered `Pipeline<TData, HandlerErr>` is stored behind a type-erased
//! runner. `Registry::run(ContextData<TData>)` finds the runner for `TData` and
//! returns results in the application's error type `E`.

use crate::core::context_data::ContextData;
use crate::core::control::PipelineResult;
use crate::error::FlowError;
use crate::pipeline::definition::Pipeline;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{event, instrument, Level};

#[async_trait]
trait ErasedRunner<AppErr>: Send + Sync
where
  AppErr: std::error::Error + Send + Sync + 'static,
{
  /// `ctx_obj` must box a `ContextData<TData>` for the runner's `TData`.
  async fn run_erased(&self, ctx_obj: Box<dyn Any + Send>) -> Result<PipelineResult, AppErr>;
}

struct TypedRunner<TData, HandlerErr, AppErr>
where
  TData: 'static + Send + Sync,
  HandlerErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
  AppErr: std::error::Error + From<HandlerErr> + From<FlowError> + Send + Sync + 'static,
{
  pipeline: Arc<Pipeline<TData, HandlerErr>>,
  _app_err: PhantomData<fn() -> AppErr>,
}

#[async_trait]
impl<TData, HandlerErr, AppErr> ErasedRunner<AppErr> for TypedRunner<TData, HandlerErr, AppErr>
where
  TData: 'static + Send + Sync,
  HandlerErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
  AppErr: std::error::Error + From<HandlerErr> + From<FlowError> + Send + Sync + 'static,
  Pipeline<TData, HandlerErr>: Send + Sync,
{
  #[instrument(
    name = "Registry::dispatch",
    skip_all,
    fields(context_type = %std::any::type_name::<TData>()),
    err(Display)
  )]
  async fn run_erased(&self, ctx_obj: Box<dyn Any + Send>) -> Result<PipelineResult, AppErr> {
    let ctx_data = match ctx_obj.downcast::<ContextData<TData>>() {
      Ok(boxed) => *boxed,
      Err(_) => {
        let expected_type = std::any::type_name::<ContextData<TData>>().to_string();
        event!(Level::ERROR, %expected_type, "Context object type mismatch.");
        return Err(AppErr::from(FlowError::TypeMismatch { expected_type }));
      }
    };
    self.pipeline.run(ctx_data).await.map_err(AppErr::from)
  }
}

/// Type-keyed pipeline registry. `AppErr` is the error type returned by [`Registry::run`].
pub struct Registry<AppErr = FlowError>
where
  AppErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  runners: RwLock<HashMap<TypeId, Arc<dyn ErasedRunner<AppErr>>>>,
}

impl<AppErr> Registry<AppErr>
where
  AppErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self {
      runners: RwLock::new(HashMap::new()),
    }
  }

  /// Registers `pipeline` for contexts of type `TData`, replacing any earlier one.
  pub fn register_pipeline<TData, HandlerErr>(&self, pipeline: Pipeline<TData, HandlerErr>)
  where
    TData: 'static + Send + Sync,
    HandlerErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
    AppErr: From<HandlerErr>,
    Pipeline<TData, HandlerErr>: Send + Sync,
  {
    event!(
      Level::DEBUG,
      context_type = %std::any::type_name::<TData>(),
      steps = ?pipeline.step_names(),
      "Registering pipeline."
    );
    let runner = TypedRunner::<TData, HandlerErr, AppErr> {
      pipeline: Arc::new(pipeline),
      _app_err: PhantomData,
    };
    self.runners.write().insert(TypeId::of::<TData>(), Arc::new(runner));
  }

  pub fn is_registered<TData: 'static>(&self) -> bool {
    self.runners.read().contains_key(&TypeId::of::<TData>())
  }

  pub async fn run<TData>(&self, ctx_data: ContextData<TData>) -> Result<PipelineResult, AppErr>
  where
    TData: 'static + Send + Sync,
  {
    // Clone the runner out so the lock is released before awaiting.
    let runner = self.runners.read().get(&TypeId::of::<TData>()).cloned();
    let runner = runner.ok_or_else(|| {
      let type_name = std::any::type_name::<TData>().to_string();
      event!(Level::ERROR, %type_name, "No pipeline registered for context type.");
      AppErr::from(FlowError::NotRegistered { type_name })
    })?;
    runner.run_erased(Box::new(ctx_data)).await
  }
}

impl<AppErr> Default for Registry<AppErr>
where
  AppErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}
