//! One activation in the execution tree.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Continuation, Value};

/// Identity of a frame within one workflow instance. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameId(pub u64);

impl fmt::Display for FrameId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "frame-{}", self.0)
  }
}

/// What a frame is waiting on: a child frame or an external bookmark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum DependencyKey {
  Frame(FrameId),
  Bookmark(String),
}

impl fmt::Display for DependencyKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      DependencyKey::Frame(id) => write!(f, "{id}"),
      DependencyKey::Bookmark(name) => write!(f, "bookmark '{name}'"),
    }
  }
}

/// A pending dependency and the continuation to push once it clears
/// (`None`: nothing resumes here, the dependency only has to be waited out).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
  pub key: DependencyKey,
  pub on_clear: Option<Continuation>,
}

/// One live activation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
  pub id: FrameId,
  pub parent: Option<FrameId>,
  /// Liveness stamp; larger means more recently made live.
  pub activated: u64,
  /// LIFO stack, top is the last element.
  pub pending_continuations: Vec<Continuation>,
  pub pending_dependencies: Vec<Dependency>,
  pub scoped_variables: BTreeMap<String, Value>,
}

impl Frame {
  pub fn new(id: FrameId, parent: Option<FrameId>, activated: u64) -> Self {
    Self {
      id,
      parent,
      activated,
      pending_continuations: Vec::new(),
      pending_dependencies: Vec::new(),
      scoped_variables: BTreeMap::new(),
    }
  }

  pub fn is_ready(&self) -> bool {
    !self.pending_continuations.is_empty()
  }

  /// No pending continuations and no pending dependencies.
  pub fn is_complete(&self) -> bool {
    self.pending_continuations.is_empty() && self.pending_dependencies.is_empty()
  }

  /// Waiting only on dependencies.
  pub fn is_blocked(&self) -> bool {
    self.pending_continuations.is_empty() && !self.pending_dependencies.is_empty()
  }

  pub fn has_dependency(&self, key: &DependencyKey) -> bool {
    self.pending_dependencies.iter().any(|d| &d.key == key)
  }

  /// Removes the entry for `key`, returning it if present.
  pub fn take_dependency(&mut self, key: &DependencyKey) -> Option<Dependency> {
    let pos = self.pending_dependencies.iter().position(|d| &d.key == key)?;
    Some(self.pending_dependencies.remove(pos))
  }
}
