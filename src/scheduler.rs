//! One scheduler step: pick the ready frame, run one continuation, join.

use tracing::{info, instrument};

use crate::activities::Workflow;
use crate::error::EngineError;
use crate::types::{Continuation, ExecutionState, FrameId};

/// What a single step did.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
  pub frame: FrameId,
  pub continuation: Continuation,
  /// Frames pruned by the join after the continuation ran.
  pub removed: Vec<FrameId>,
}

/// Runs one continuation of the most recently activated ready frame, then prunes
/// completed frames. Returns `Ok(None)` when no frame is ready.
///
/// On error the state may hold a partially applied step; callers must not persist it.
#[instrument(level = "trace", skip(state, workflow))]
pub fn run_step(
  state: &mut ExecutionState,
  workflow: &Workflow,
) -> Result<Option<StepOutcome>, EngineError> {
  let Some(frame) = state.ready_frame() else {
    return Ok(None);
  };
  let Some(continuation) = state.pop_continuation(frame) else {
    return Ok(None);
  };
  info!(
    step = state.steps + 1,
    %frame,
    activity = workflow.kind(continuation.activity),
    resume_at = %continuation.resume_at,
    "running continuation"
  );
  workflow.dispatch(state, frame, &continuation)?;
  state.steps += 1;
  let removed = state.prune_completed();
  Ok(Some(StepOutcome {
    frame,
    continuation,
    removed,
  }))
}
