// stepflow/src/core/step.rs

use super::ContextData;

/// Predicate evaluated before a step runs; `true` skips the step.
pub type SkipCondition<TData> = std::sync::Arc<dyn Fn(ContextData<TData>) -> bool + Send + Sync + 'static>;

#[derive(Clone)]
pub struct StepDef<T: 'static + Send + Sync> {
  pub name: String,
  /// An optional step with no handlers is silently passed over.
  pub optional: bool,
  pub skip_if: Option<SkipCondition<T>>,
}

impl<T: 'static + Send + Sync> StepDef<T> {
  pub fn new(name: impl Into<String>, optional: bool, skip_if: Option<SkipCondition<T>>) -> Self {
    Self {
      name: name.into(),
      optional,
      skip_if,
    }
  }

  pub(crate) fn should_skip(&self, ctx: &ContextData<T>) -> bool {
    self.skip_if.as_ref().map_or(false, |cond| cond(ctx.clone()))
  }
}

impl<T: 'static + Send + Sync> std::fmt::Debug for StepDef<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StepDef")
      .field("name", &self.name)
      .field("optional", &self.optional)
      .field("skip_if_present", &self.skip_if.is_some())
      .finish()
  }
}
