//! The handle a continuation runs against.

use crate::error::ActivityError;
use crate::types::{ActivityId, Continuation, ExecutionState, FrameId, Value};

use super::{Scope, VariableDecl};

/// Mutable view of the execution state for one running continuation.
///
/// `read`/`write` resolve a name through the running activity's declared
/// [`VariableDecl`]s; names it did not declare are rejected.
pub struct StepContext<'a> {
  state: &'a mut ExecutionState,
  frame: FrameId,
  activity: ActivityId,
  declared: Vec<VariableDecl>,
}

impl<'a> StepContext<'a> {
  pub(crate) fn new(
    state: &'a mut ExecutionState,
    frame: FrameId,
    activity: ActivityId,
    declared: Vec<VariableDecl>,
  ) -> Self {
    Self {
      state,
      frame,
      activity,
      declared,
    }
  }

  pub fn frame_id(&self) -> FrameId {
    self.frame
  }

  pub fn activity_id(&self) -> ActivityId {
    self.activity
  }

  /// A continuation that resumes the running activity at `label`.
  pub fn continuation(&self, label: &str) -> Continuation {
    Continuation::new(self.activity, label)
  }

  pub(crate) fn schedule_child(
    &mut self,
    child: ActivityId,
    on_complete: Option<Continuation>,
  ) -> Result<FrameId, ActivityError> {
    self.state.schedule_child(self.frame, child, on_complete)
  }

  /// Suspends this frame on bookmark `name`; once resolved, the running activity is
  /// resumed at `on_resolved` (or the frame simply stops waiting when `None`).
  pub fn wait_on_bookmark(
    &mut self,
    name: &str,
    on_resolved: Option<&str>,
  ) -> Result<(), ActivityError> {
    let cont = on_resolved.map(|label| self.continuation(label));
    self.state.wait_on_bookmark(self.frame, name, cont)
  }

  /// Takes the payload of resolved bookmark `name`.
  pub fn take_payload(&mut self, name: &str) -> Result<Value, ActivityError> {
    self
      .state
      .take_payload(name)
      .ok_or_else(|| ActivityError::MissingPayload {
        name: name.to_string(),
      })
  }

  fn declaration(&self, name: &str) -> Option<&VariableDecl> {
    self.declared.iter().find(|d| d.name == name)
  }

  fn undeclared(name: &str) -> ActivityError {
    ActivityError::Undeclared {
      name: name.to_string(),
    }
  }

  /// Reads a declared variable.
  pub fn read(&self, name: &str) -> Result<&Value, ActivityError> {
    let decl = self
      .declaration(name)
      .filter(|d| d.access.can_read())
      .ok_or_else(|| Self::undeclared(name))?;
    let value = match decl.scope {
      Scope::Local => self.local(name),
      Scope::Workflow => self.state.variables.get(name),
    };
    value.ok_or_else(|| ActivityError::MissingVariable {
      name: name.to_string(),
    })
  }

  pub fn read_text(&self, name: &str) -> Result<&str, ActivityError> {
    self
      .read(name)?
      .as_text()
      .ok_or_else(|| ActivityError::TypeMismatch {
        name: name.to_string(),
        expected: "text",
      })
  }

  /// Writes a declared variable.
  pub fn write(&mut self, name: &str, value: Value) -> Result<(), ActivityError> {
    let scope = self
      .declaration(name)
      .filter(|d| d.access.can_write())
      .map(|d| d.scope)
      .ok_or_else(|| Self::undeclared(name))?;
    match scope {
      Scope::Local => self.set_local(name, value),
      Scope::Workflow => {
        self.state.variables.insert(name.to_string(), value);
      }
    }
    Ok(())
  }

  /// Scoped variable of this frame, without declaration checks.
  pub(crate) fn local(&self, name: &str) -> Option<&Value> {
    self
      .state
      .frame(self.frame)
      .and_then(|f| f.scoped_variables.get(name))
  }

  pub(crate) fn set_local(&mut self, name: &str, value: Value) {
    if let Some(f) = self.state.frame_mut(self.frame) {
      f.scoped_variables.insert(name.to_string(), value);
    }
  }
}
