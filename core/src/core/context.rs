// stepflow/src/core/context.rs

//! The boxed handler type stored by pipelines.

use crate::core::context_data::ContextData;
use crate::core::control::PipelineControl;
use std::future::Future;
use std::pin::Pin;

/// A pipeline step handler.
///
/// A handler receives its own clone of the shared `ContextData<TData>` and
/// returns a boxed future resolving to `Result<PipelineControl, Err>`.
///
/// Handlers lock the context with `.read()` / `.write()` and must drop every
/// guard before the next `.await`. Returning `PipelineControl::Stop` halts the
/// pipeline with `PipelineResult::Stopped`.
pub type Handler<TData, Err> = Box<
  dyn Fn(ContextData<TData>) -> Pin<Box<dyn Future<Output = Result<PipelineControl, Err>> + Send>>
    + Send
    + Sync,
>;
