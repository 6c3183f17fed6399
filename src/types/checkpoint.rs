//! Persisted envelope around an [`ExecutionState`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ExecutionState;

/// Format version written by this crate.
pub const CHECKPOINT_VERSION: u32 = 1;

/// Checkpoint for resumable execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
  pub version: u32,
  pub saved_at: DateTime<Utc>,
  pub state: ExecutionState,
}

impl Checkpoint {
  pub fn new(state: ExecutionState) -> Self {
    Self {
      version: CHECKPOINT_VERSION,
      saved_at: Utc::now(),
      state,
    }
  }
}
