// stepflow/src/pipeline/definition.rs

//! The `Pipeline<TData, Err>` struct and its structural edits.

use crate::core::context::Handler;
use crate::core::step::{SkipCondition, StepDef};
use crate::error::{FlowError, FlowResult};
use std::collections::HashMap;

/// An ordered set of named steps over a root context `TData`.
///
/// Handlers return `Result<_, Err>`. `Err` must be constructible from
/// [`FlowError`] so engine-level failures (missing handlers, unknown steps)
/// surface through the same error type as handler failures.
pub struct Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub(crate) steps: Vec<StepDef<TData>>,

  pub(crate) before: HashMap<String, Vec<Handler<TData, Err>>>,
  pub(crate) on: HashMap<String, Vec<Handler<TData, Err>>>,
  pub(crate) after: HashMap<String, Vec<Handler<TData, Err>>>,
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Creates a pipeline from `(name, optional, skip_if)` triples.
  pub fn new(step_defs: &[(&str, bool, Option<SkipCondition<TData>>)]) -> Self {
    let steps = step_defs
      .iter()
      .map(|(name, optional, skip_if)| StepDef::new(*name, *optional, skip_if.clone()))
      .collect();

    Self {
      steps,
      before: HashMap::new(),
      on: HashMap::new(),
      after: HashMap::new(),
    }
  }

  pub fn step_names(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.name.as_str()).collect()
  }

  pub fn has_step(&self, step_name: &str) -> bool {
    self.position(step_name).is_some()
  }

  fn position(&self, step_name: &str) -> Option<usize> {
    self.steps.iter().position(|s| s.name == step_name)
  }

  fn require_position(&self, step_name: &str) -> FlowResult<usize> {
    self.position(step_name).ok_or_else(|| FlowError::StepNotFound {
      step_name: step_name.to_string(),
    })
  }

  fn insert_at(
    &mut self,
    idx: usize,
    new_step_name: String,
    optional: bool,
    skip_if: Option<SkipCondition<TData>>,
  ) -> FlowResult<()> {
    if self.has_step(&new_step_name) {
      return Err(FlowError::DuplicateStep {
        step_name: new_step_name,
      });
    }
    self.steps.insert(idx, StepDef::new(new_step_name, optional, skip_if));
    Ok(())
  }

  pub fn insert_before_step<S: Into<String>>(
    &mut self,
    existing_step_name: &str,
    new_step_name: S,
    optional: bool,
    skip_if: Option<SkipCondition<TData>>,
  ) -> FlowResult<()> {
    let idx = self.require_position(existing_step_name)?;
    self.insert_at(idx, new_step_name.into(), optional, skip_if)
  }

  pub fn insert_after_step<S: Into<String>>(
    &mut self,
    existing_step_name: &str,
    new_step_name: S,
    optional: bool,
    skip_if: Option<SkipCondition<TData>>,
  ) -> FlowResult<()> {
    let idx = self.require_position(existing_step_name)?;
    self.insert_at(idx + 1, new_step_name.into(), optional, skip_if)
  }

  /// Removes a step and every handler attached to it. Returns `false` if the step was unknown.
  pub fn remove_step(&mut self, step_name: &str) -> bool {
    match self.position(step_name) {
      Some(idx) => {
        self.steps.remove(idx);
        self.before.remove(step_name);
        self.on.remove(step_name);
        self.after.remove(step_name);
        true
      }
      None => false,
    }
  }

  pub fn set_optional(&mut self, step_name: &str, optional: bool) -> FlowResult<()> {
    let idx = self.require_position(step_name)?;
    self.steps[idx].optional = optional;
    Ok(())
  }

  pub fn set_skip_condition(&mut self, step_name: &str, skip_if: Option<SkipCondition<TData>>) -> FlowResult<()> {
    let idx = self.require_position(step_name)?;
    self.steps[idx].skip_if = skip_if;
    Ok(())
  }

  /// Handlers may be attached before their step is defined; this reports the
  /// first handler whose step never appeared.
  pub(crate) fn orphaned_handler_step(&self) -> Option<&str> {
    self
      .before
      .keys()
      .chain(self.on.keys())
      .chain(self.after.keys())
      .find(|name| !self.has_step(name))
      .map(String::as_str)
  }
}
