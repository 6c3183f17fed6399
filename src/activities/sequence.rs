//! Sequence: runs its children one after another.

use tracing::{instrument, trace};

use super::StepContext;
use crate::error::ActivityError;
use crate::types::{ActivityId, Continuation, Value};

/// Scoped variable holding the index of the next child to schedule.
pub const POSITION: &str = "position";

#[derive(Debug)]
pub struct Sequence {
  pub(crate) children: Vec<ActivityId>,
}

impl Sequence {
  pub fn new(children: Vec<ActivityId>) -> Self {
    Self { children }
  }

  /// Schedules the child at the stored position and re-enters itself when that child
  /// completes. Once every child has run, leaves the frame to complete.
  #[instrument(level = "trace", skip(self, ctx))]
  pub(crate) fn execute(&self, ctx: &mut StepContext<'_>) -> Result<(), ActivityError> {
    let position = match ctx.local(POSITION) {
      None => 0,
      Some(v) => v.as_integer().ok_or(ActivityError::TypeMismatch {
        name: POSITION.to_string(),
        expected: "integer",
      })?,
    };
    let Some(child) = usize::try_from(position)
      .ok()
      .and_then(|i| self.children.get(i))
    else {
      trace!(position, "sequence exhausted");
      return Ok(());
    };
    let resume = Continuation::entry(ctx.activity_id());
    ctx.schedule_child(*child, Some(resume))?;
    ctx.set_local(POSITION, Value::Integer(position + 1));
    Ok(())
  }
}
