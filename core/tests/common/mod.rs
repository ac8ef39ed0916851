// tests/common/mod.rs
#![allow(dead_code)]

use once_cell::sync::Lazy;
use stepflow::{ContextData, FlowError, PipelineControl};
use tracing::Level;

#[derive(Clone, Debug, Default)]
pub struct TestContext {
  pub counter: i32,
  pub message: String,
  pub steps_executed: Vec<String>,
  pub should_stop_at: Option<String>,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TestError {
  /// Engine error, stored as its Debug rendering so tests can compare.
  #[error("Flow error: {0}")]
  Flow(String),

  #[error("Test handler failed: {0}")]
  Handler(String),
}

impl From<FlowError> for TestError {
  fn from(fe: FlowError) -> Self {
    TestError::Flow(format!("{:?}", fe))
  }
}

pub fn create_simple_handler(step_name: &'static str, message_to_append: &'static str) -> stepflow::Handler<TestContext, TestError> {
  Box::new(move |ctx: ContextData<TestContext>| {
    Box::pin(async move {
      let mut guard = ctx.write();
      guard.counter += 1;
      guard.message.push_str(message_to_append);
      guard.steps_executed.push(step_name.to_string());
      tracing::debug!(target: "test_handlers", step = %step_name, counter = guard.counter, "executed");
      if guard.should_stop_at.as_deref() == Some(step_name) {
        return Ok(PipelineControl::Stop);
      }
      Ok(PipelineControl::Continue)
    })
  })
}

pub fn create_failing_handler(step_name: &'static str, error_message: &'static str) -> stepflow::Handler<TestContext, TestError> {
  Box::new(move |ctx: ContextData<TestContext>| {
    Box::pin(async move {
      ctx.write().steps_executed.push(step_name.to_string());
      Err(TestError::Handler(error_message.to_string()))
    })
  })
}

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
