//! Joins text variables into one line and prints it.

use tracing::instrument;

use super::{LeafActivity, StepContext, VariableDecl};
use crate::error::ActivityError;
use crate::types::{ENTRY, Value};

/// Concatenates the workflow variables `inputs` and prints the line to stdout. When
/// `output` is set the line is also stored in that workflow variable.
#[derive(Debug, Clone)]
pub struct WriteLine {
  pub inputs: Vec<String>,
  pub output: Option<String>,
}

impl WriteLine {
  pub fn new<I, S>(inputs: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      inputs: inputs.into_iter().map(Into::into).collect(),
      output: None,
    }
  }

  pub fn with_output(mut self, output: impl Into<String>) -> Self {
    self.output = Some(output.into());
    self
  }

  pub(crate) fn render(&self, ctx: &StepContext<'_>) -> Result<String, ActivityError> {
    let mut line = String::new();
    for name in &self.inputs {
      line.push_str(ctx.read_text(name)?);
    }
    Ok(line)
  }
}

impl LeafActivity for WriteLine {
  fn kind(&self) -> &str {
    "write_line"
  }

  fn variables(&self) -> Vec<VariableDecl> {
    let mut decls: Vec<VariableDecl> = self.inputs.iter().map(VariableDecl::reads).collect();
    if let Some(output) = &self.output {
      decls.push(VariableDecl::writes(output));
    }
    decls
  }

  #[instrument(level = "trace", skip(self, ctx))]
  fn resume(&self, at: &str, ctx: &mut StepContext<'_>) -> Result<(), ActivityError> {
    if at != ENTRY {
      return Err(ActivityError::UnknownResumePoint {
        label: at.to_string(),
      });
    }
    let line = self.render(ctx)?;
    println!("{line}");
    if let Some(output) = &self.output {
      ctx.write(output, Value::Text(line))?;
    }
    Ok(())
  }
}
