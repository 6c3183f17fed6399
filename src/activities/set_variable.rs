//! Writes a constant into a workflow variable.

use super::{LeafActivity, StepContext, VariableDecl};
use crate::error::ActivityError;
use crate::types::{ENTRY, Value};

#[derive(Debug, Clone)]
pub struct SetVariable {
  pub name: String,
  pub value: Value,
}

impl SetVariable {
  pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
    Self {
      name: name.into(),
      value: value.into(),
    }
  }
}

impl LeafActivity for SetVariable {
  fn kind(&self) -> &str {
    "set_variable"
  }

  fn variables(&self) -> Vec<VariableDecl> {
    vec![VariableDecl::writes(&self.name)]
  }

  fn resume(&self, at: &str, ctx: &mut StepContext<'_>) -> Result<(), ActivityError> {
    if at != ENTRY {
      return Err(ActivityError::UnknownResumePoint {
        label: at.to_string(),
      });
    }
    ctx.write(&self.name, self.value.clone())
  }
}
