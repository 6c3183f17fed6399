//! Activity definitions: composites and the leaf trait.

use std::fmt;

use crate::error::ActivityError;
use crate::types::ENTRY;

use super::StepContext;

/// Where a declared variable lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
  /// The scoped variables of the activity's own frame.
  Local,
  /// The workflow-global mapping shared by every frame.
  Workflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
  Read,
  Write,
  ReadWrite,
}

impl Access {
  pub fn can_read(self) -> bool {
    matches!(self, Access::Read | Access::ReadWrite)
  }

  pub fn can_write(self) -> bool {
    matches!(self, Access::Write | Access::ReadWrite)
  }
}

/// One named value an activity reads or writes, and at which scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDecl {
  pub name: String,
  pub scope: Scope,
  pub access: Access,
}

impl VariableDecl {
  pub fn new(name: impl Into<String>, scope: Scope, access: Access) -> Self {
    Self {
      name: name.into(),
      scope,
      access,
    }
  }

  pub fn reads(name: impl Into<String>) -> Self {
    Self::new(name, Scope::Workflow, Access::Read)
  }

  pub fn writes(name: impl Into<String>) -> Self {
    Self::new(name, Scope::Workflow, Access::Write)
  }

  pub fn local(name: impl Into<String>) -> Self {
    Self::new(name, Scope::Local, Access::ReadWrite)
  }
}

/// A user-defined unit of work with no execution state of its own.
///
/// Each continuation of a leaf is identified by a label from [`resume_points`]; the
/// engine calls [`resume`] with that label. The entry point is always [`ENTRY`].
/// A leaf completes by leaving its frame with no pending continuations or
/// dependencies.
///
/// [`resume_points`]: LeafActivity::resume_points
/// [`resume`]: LeafActivity::resume
pub trait LeafActivity: Send + Sync + fmt::Debug {
  /// Short name used in logs and errors.
  fn kind(&self) -> &str;

  /// Variables this activity may touch through [`StepContext::read`] and
  /// [`StepContext::write`].
  fn variables(&self) -> Vec<VariableDecl> {
    Vec::new()
  }

  fn resume_points(&self) -> &[&'static str] {
    &[ENTRY]
  }

  fn resume(&self, at: &str, ctx: &mut StepContext<'_>) -> Result<(), ActivityError>;
}

/// Workflow definition tree.
#[derive(Debug)]
pub enum Activity {
  /// Children run one after another, in order.
  Sequence(Vec<Activity>),
  /// Children run concurrently; the block completes when all of them have.
  Parallel(Vec<Activity>),
  Leaf(Box<dyn LeafActivity>),
}

impl Activity {
  pub fn sequence(children: impl IntoIterator<Item = Activity>) -> Self {
    Activity::Sequence(children.into_iter().collect())
  }

  pub fn parallel(children: impl IntoIterator<Item = Activity>) -> Self {
    Activity::Parallel(children.into_iter().collect())
  }

  pub fn leaf(leaf: impl LeafActivity + 'static) -> Self {
    Activity::Leaf(Box::new(leaf))
  }
}
