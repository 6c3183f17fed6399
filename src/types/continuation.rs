//! Serializable continuations: which activity to resume, and where.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Resumption label of every activity's entry point.
pub const ENTRY: &str = "execute";

/// Index of an activity in the pre-order flattening of a workflow definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityId(pub u32);

impl fmt::Display for ActivityId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// A pending piece of work: resume `activity` at the label `resume_at`.
///
/// Resolved against the [`Workflow`](crate::activities::Workflow) registry when it runs, so
/// a checkpoint never contains executable code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Continuation {
  pub activity: ActivityId,
  pub resume_at: String,
}

impl Continuation {
  pub fn new(activity: ActivityId, resume_at: impl Into<String>) -> Self {
    Self {
      activity,
      resume_at: resume_at.into(),
    }
  }

  /// The entry continuation of `activity`.
  pub fn entry(activity: ActivityId) -> Self {
    Self::new(activity, ENTRY)
  }

  pub fn is_entry(&self) -> bool {
    self.resume_at == ENTRY
  }
}

impl fmt::Display for Continuation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}@{}", self.activity, self.resume_at)
  }
}
