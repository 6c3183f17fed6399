//! Waits for an external value delivered through a bookmark.

use tracing::{info, instrument};

use super::{LeafActivity, StepContext, VariableDecl};
use crate::error::ActivityError;
use crate::types::ENTRY;

/// Resumption label run once the bookmark has a payload.
pub const ON_DATA_AVAILABLE: &str = "on_data_available";

/// Blocks on bookmark `bookmark`, then stores its payload in workflow variable `output`.
#[derive(Debug, Clone)]
pub struct WaitForBookmark {
  pub bookmark: String,
  pub output: String,
}

impl WaitForBookmark {
  pub fn new(bookmark: impl Into<String>, output: impl Into<String>) -> Self {
    Self {
      bookmark: bookmark.into(),
      output: output.into(),
    }
  }
}

impl LeafActivity for WaitForBookmark {
  fn kind(&self) -> &str {
    "wait_for_bookmark"
  }

  fn variables(&self) -> Vec<VariableDecl> {
    vec![VariableDecl::writes(&self.output)]
  }

  fn resume_points(&self) -> &[&'static str] {
    &[ENTRY, ON_DATA_AVAILABLE]
  }

  #[instrument(level = "trace", skip(self, ctx))]
  fn resume(&self, at: &str, ctx: &mut StepContext<'_>) -> Result<(), ActivityError> {
    match at {
      ENTRY => ctx.wait_on_bookmark(&self.bookmark, Some(ON_DATA_AVAILABLE)),
      ON_DATA_AVAILABLE => {
        let payload = ctx.take_payload(&self.bookmark)?;
        info!(bookmark = %self.bookmark, output = %self.output, "bookmark data available");
        ctx.write(&self.output, payload)
      }
      other => Err(ActivityError::UnknownResumePoint {
        label: other.to_string(),
      }),
    }
  }
}
