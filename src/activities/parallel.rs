//! Parallel: fans out every child at once; the join algorithm does the rest.

use tracing::instrument;

use super::StepContext;
use crate::error::ActivityError;
use crate::types::ActivityId;

#[derive(Debug)]
pub struct Parallel {
  pub(crate) children: Vec<ActivityId>,
}

impl Parallel {
  pub fn new(children: Vec<ActivityId>) -> Self {
    Self { children }
  }

  /// Schedules every child with no continuation. The frame completes once all child
  /// dependencies have cleared.
  #[instrument(level = "trace", skip(self, ctx))]
  pub(crate) fn execute(&self, ctx: &mut StepContext<'_>) -> Result<(), ActivityError> {
    for child in &self.children {
      ctx.schedule_child(*child, None)?;
    }
    Ok(())
  }
}
