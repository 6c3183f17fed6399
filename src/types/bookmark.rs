//! Named placeholder for a pending external event.

use serde::{Deserialize, Serialize};

use super::{FrameId, Value};

/// A bookmark owned by the execution state. `payload` is written once, by resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
  pub name: String,
  pub waiting_frame: FrameId,
  pub payload: Option<Value>,
}

impl Bookmark {
  pub fn new(name: impl Into<String>, waiting_frame: FrameId) -> Self {
    Self {
      name: name.into(),
      waiting_frame,
      payload: None,
    }
  }

  pub fn is_resolved(&self) -> bool {
    self.payload.is_some()
  }
}
