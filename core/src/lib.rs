// stepflow/src/lib.rs

//! Stepflow: a small asynchronous pipeline engine.
//!
//! A pipeline is an ordered list of named steps. Each step may carry
//! `before`, `on` and `after` handlers that operate on a shared
//! [`ContextData<T>`]. Handlers return [`PipelineControl`] to continue or halt
//! the run; steps can be optional or skipped by a predicate over the context.
//! A [`Registry`] keyed by the context type dispatches a context to the
//! pipeline registered for it.
//!
//! Typical usage:
//!  1. Define a context struct `MyCtx` for one unit of work.
//!  2. Build a `Pipeline<MyCtx, MyError>` with `Pipeline::new(&[("step", optional, skip_if)])`.
//!  3. Attach handlers with `on_root`, `before_root` and `after_root`.
//!  4. Register the pipeline with a `Registry<MyError>` and call `registry.run(ctx)`.

pub mod core;
pub mod error;
pub mod pipeline;
pub mod registry;

pub use crate::core::context::Handler;
pub use crate::core::context_data::ContextData;
pub use crate::core::control::{PipelineControl, PipelineResult};
pub use crate::core::step::{SkipCondition, StepDef};

pub use crate::pipeline::definition::Pipeline;

pub use crate::error::{FlowError, FlowResult};

pub use crate::registry::Registry;
