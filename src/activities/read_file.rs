//! Reads a text file into a workflow variable.

use std::path::PathBuf;

use tracing::instrument;

use super::{LeafActivity, StepContext, VariableDecl};
use crate::error::ActivityError;
use crate::types::{ENTRY, Value};

#[derive(Debug, Clone)]
pub struct ReadFile {
  pub path: PathBuf,
  pub output: String,
}

impl ReadFile {
  pub fn new(path: impl Into<PathBuf>, output: impl Into<String>) -> Self {
    Self {
      path: path.into(),
      output: output.into(),
    }
  }
}

impl LeafActivity for ReadFile {
  fn kind(&self) -> &str {
    "read_file"
  }

  fn variables(&self) -> Vec<VariableDecl> {
    vec![VariableDecl::writes(&self.output)]
  }

  #[instrument(level = "trace", skip(self, ctx))]
  fn resume(&self, at: &str, ctx: &mut StepContext<'_>) -> Result<(), ActivityError> {
    if at != ENTRY {
      return Err(ActivityError::UnknownResumePoint {
        label: at.to_string(),
      });
    }
    let content = std::fs::read_to_string(&self.path).map_err(|source| ActivityError::Io {
      path: self.path.clone(),
      source,
    })?;
    ctx.write(&self.output, Value::Text(content))
  }
}
