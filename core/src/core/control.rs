// stepflow/src/core/control.rs

//! Flow signals returned by handlers and the outcome of a whole run.

/// Returned by every handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineControl {
  Continue,
  /// Halt immediately. Remaining handlers of this step and all later steps are not run.
  Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineResult {
  /// Every step ran or was skipped.
  Completed,
  /// A handler returned `PipelineControl::Stop`.
  Stopped,
}

impl PipelineResult {
  pub fn is_completed(self) -> bool {
    matches!(self, PipelineResult::Completed)
  }
}
