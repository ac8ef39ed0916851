// tests/pipeline_execution_tests.rs
mod common;

use common::*;
use serial_test::serial;
use std::sync::Arc;
use stepflow::{ContextData, FlowError, Pipeline, PipelineControl, PipelineResult};

#[tokio::test]
#[serial]
async fn test_pipeline_runs_steps_in_order() {
  setup_tracing();
  let mut pipeline =
    Pipeline::<TestContext, TestError>::new(&[("step1", false, None), ("step2", false, None), ("step3", false, None)]);

  pipeline.on_root("step1", create_simple_handler("step1", " S1"));
  pipeline.on_root("step2", create_simple_handler("step2", " S2"));
  pipeline.on_root("step3", create_simple_handler("step3", " S3"));

  let ctx = ContextData::new(TestContext::default());
  let result = pipeline.run(ctx.clone()).await;

  assert_eq!(result.unwrap(), PipelineResult::Completed);
  let guard = ctx.read();
  assert_eq!(guard.counter, 3);
  assert_eq!(guard.message, " S1 S2 S3");
  assert_eq!(guard.steps_executed, vec!["step1", "step2", "step3"]);
}

#[tokio::test]
#[serial]
async fn test_pipeline_stops_on_pipeline_control_stop() {
  setup_tracing();
  let mut pipeline =
    Pipeline::<TestContext, TestError>::new(&[("stepA", false, None), ("stopStep", false, None), ("stepC", false, None)]);

  pipeline.on_root("stepA", create_simple_handler("stepA", "A"));
  pipeline.on_root("stopStep", |ctx: ContextData<TestContext>| {
    Box::pin(async move {
      ctx.write().steps_executed.push("stopStep".to_string());
      Ok::<PipelineControl, FlowError>(PipelineControl::Stop)
    })
  });
  pipeline.on_root("stepC", create_simple_handler("stepC", "C"));

  let ctx = ContextData::new(TestContext::default());
  let result = pipeline.run(ctx.clone()).await;

  assert_eq!(result.unwrap(), PipelineResult::Stopped);
  let guard = ctx.read();
  assert_eq!(guard.counter, 1);
  assert_eq!(guard.steps_executed, vec!["stepA", "stopStep"]);
}

#[tokio::test]
#[serial]
async fn test_stop_in_before_phase_skips_on_and_after() {
  setup_tracing();
  let mut pipeline = Pipeline::<TestContext, TestError>::new(&[("guarded", false, None)]);
  pipeline.before_root("guarded", create_simple_handler("guard", "G"));
  pipeline.on_root("guarded", create_simple_handler("work", "W"));
  pipeline.after_root("guarded", create_simple_handler("cleanup", "C"));

  let ctx = ContextData::new(TestContext {
    should_stop_at: Some("guard".to_string()),
    ..Default::default()
  });
  let result = pipeline.run(ctx.clone()).await.unwrap();

  assert_eq!(result, PipelineResult::Stopped);
  assert_eq!(ctx.read().steps_executed, vec!["guard"]);
}

#[tokio::test]
#[serial]
async fn test_pipeline_propagates_handler_error() {
  setup_tracing();
  let mut pipeline = Pipeline::<TestContext, TestError>::new(&[
    ("good_step", false, None),
    ("bad_step", false, None),
    ("another_step", false, None),
  ]);

  pipeline.on_root("good_step", create_simple_handler("good_step", "Good"));
  pipeline.on_root("bad_step", create_failing_handler("bad_step", "I am a bad step!"));
  pipeline.on_root("another_step", create_simple_handler("another_step", "NeverRun"));

  let ctx = ContextData::new(TestContext::default());
  let result = pipeline.run(ctx.clone()).await;

  assert_eq!(result.unwrap_err(), TestError::Handler("I am a bad step!".to_string()));
  let guard = ctx.read();
  assert_eq!(guard.message, "Good");
  assert_eq!(guard.steps_executed, vec!["good_step", "bad_step"]);
}

#[tokio::test]
#[serial]
async fn test_pipeline_skips_step_if_condition_met() {
  setup_tracing();
  let mut pipeline = Pipeline::<TestContext, TestError>::new(&[
    ("step1", false, None),
    (
      "step_to_skip",
      false,
      Some(Arc::new(|ctx: ContextData<TestContext>| ctx.read().counter > 0)),
    ),
    ("step3", false, None),
  ]);

  pipeline.on_root("step1", create_simple_handler("step1", " S1"));
  pipeline.on_root("step_to_skip", create_simple_handler("step_to_skip", " SKIPPED"));
  pipeline.on_root("step3", create_simple_handler("step3", " S3"));

  let ctx = ContextData::new(TestContext::default());
  let result = pipeline.run(ctx.clone()).await;

  assert_eq!(result.unwrap(), PipelineResult::Completed);
  assert_eq!(ctx.read().steps_executed, vec!["step1", "step3"]);
}

#[tokio::test]
#[serial]
async fn test_non_optional_step_missing_handler_fails() {
  setup_tracing();
  let pipeline = Pipeline::<TestContext, TestError>::new(&[("step_with_no_handler", false, None)]);

  let result = pipeline.run(ContextData::new(TestContext::default())).await;

  match result {
    Err(TestError::Flow(s)) => {
      assert!(s.contains("HandlerMissing"));
      assert!(s.contains("step_with_no_handler"));
    }
    other => panic!("Expected HandlerMissing, got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn test_optional_step_missing_handler_succeeds() {
  setup_tracing();
  let pipeline = Pipeline::<TestContext, TestError>::new(&[("optional_step_no_handler", true, None)]);

  let result = pipeline.run(ContextData::new(TestContext::default())).await;
  assert_eq!(result.unwrap(), PipelineResult::Completed);
}

#[tokio::test]
#[serial]
async fn test_handler_on_undefined_step_is_rejected_at_run() {
  setup_tracing();
  let mut pipeline = Pipeline::<TestContext, TestError>::new(&[("real", false, None)]);
  pipeline.on_root("real", create_simple_handler("real", "R"));
  pipeline.after_root("typo", create_simple_handler("typo", "T"));

  let ctx = ContextData::new(TestContext::default());
  match pipeline.run(ctx.clone()).await {
    Err(TestError::Flow(s)) => {
      assert!(s.contains("StepNotFound"));
      assert!(s.contains("typo"));
    }
    other => panic!("Expected StepNotFound, got {:?}", other),
  }
  assert!(ctx.read().steps_executed.is_empty());
}

#[tokio::test]
#[serial]
async fn test_before_on_after_execution_order() {
  setup_tracing();
  let mut pipeline = Pipeline::<TestContext, TestError>::new(&[("main_step", false, None)]);

  pipeline.after_root("main_step", create_simple_handler("after_main", "After;"));
  pipeline.on_root("main_step", create_simple_handler("on_main", "On;"));
  pipeline.before_root("main_step", create_simple_handler("before_main", "Before;"));

  let ctx = ContextData::new(TestContext::default());
  pipeline.run(ctx.clone()).await.unwrap();

  let guard = ctx.read();
  assert_eq!(guard.message, "Before;On;After;");
  assert_eq!(guard.steps_executed, vec!["before_main", "on_main", "after_main"]);
}

#[tokio::test]
#[serial]
async fn test_inserted_steps_run_in_position() {
  setup_tracing();
  let mut pipeline = Pipeline::<TestContext, TestError>::new(&[("first", false, None), ("last", false, None)]);
  pipeline.insert_after_step("first", "middle", false, None).unwrap();
  pipeline.insert_before_step("first", "zeroth", true, None).unwrap();
  assert_eq!(pipeline.step_names(), vec!["zeroth", "first", "middle", "last"]);

  pipeline.on_root("first", create_simple_handler("first", "1"));
  pipeline.on_root("middle", create_simple_handler("middle", "2"));
  pipeline.on_root("last", create_simple_handler("last", "3"));

  let ctx = ContextData::new(TestContext::default());
  pipeline.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().message, "123");
}

#[tokio::test]
#[serial]
async fn test_step_edits_report_unknown_and_duplicate_steps() {
  setup_tracing();
  let mut pipeline = Pipeline::<TestContext, TestError>::new(&[("only", false, None)]);

  assert!(matches!(
    pipeline.insert_after_step("missing", "x", false, None),
    Err(FlowError::StepNotFound { .. })
  ));
  assert!(matches!(
    pipeline.insert_after_step("only", "only", false, None),
    Err(FlowError::DuplicateStep { .. })
  ));
  assert!(pipeline.set_optional("missing", true).is_err());

  pipeline.on_root("only", create_simple_handler("only", "O"));
  assert!(pipeline.remove_step("only"));
  assert!(!pipeline.remove_step("only"));
  // Handlers went with the step, so an empty pipeline completes.
  let result = pipeline.run(ContextData::new(TestContext::default())).await;
  assert_eq!(result.unwrap(), PipelineResult::Completed);
}

#[tokio::test]
#[serial]
async fn test_pipeline_with_flow_error_type() {
  setup_tracing();
  let mut failing = Pipeline::<TestContext, FlowError>::new(&[("fail_task", false, None)]);
  failing.on_root("fail_task", |_ctx| {
    Box::pin(async move { Err(FlowError::from(anyhow::anyhow!("Intentional failure"))) })
  });

  match failing.run(ContextData::new(TestContext::default())).await {
    Err(FlowError::HandlerError { source }) => assert_eq!(source.to_string(), "Intentional failure"),
    other => panic!("Expected HandlerError, got {:?}", other),
  }
}
