//! Leaves shared by unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::activities::{Access, LeafActivity, Scope, StepContext, VariableDecl};
use crate::error::ActivityError;
use crate::types::{ENTRY, Value};

/// Workflow variable `Record` appends to.
pub(crate) const TRACE: &str = "trace";

/// Appends `label` to the `trace` workflow variable and to a side log that survives
/// simulated restarts, so duplicate executions are visible.
#[derive(Debug, Clone)]
pub(crate) struct Record {
  pub label: String,
  pub log: Arc<Mutex<Vec<String>>>,
}

impl Record {
  pub fn new(label: &str, log: &Arc<Mutex<Vec<String>>>) -> Self {
    Self {
      label: label.to_string(),
      log: Arc::clone(log),
    }
  }
}

impl LeafActivity for Record {
  fn kind(&self) -> &str {
    "record"
  }

  fn variables(&self) -> Vec<VariableDecl> {
    vec![VariableDecl::new(TRACE, Scope::Workflow, Access::ReadWrite)]
  }

  fn resume(&self, at: &str, ctx: &mut StepContext<'_>) -> Result<(), ActivityError> {
    assert_eq!(at, ENTRY);
    self.log.lock().unwrap().push(self.label.clone());
    let mut items = match ctx.read(TRACE) {
      Ok(v) => v.as_list().map(<[Value]>::to_vec).unwrap_or_default(),
      Err(ActivityError::MissingVariable { .. }) => Vec::new(),
      Err(e) => return Err(e),
    };
    items.push(Value::from(self.label.as_str()));
    ctx.write(TRACE, Value::List(items))
  }
}

/// Fails while `armed` is set, otherwise does nothing.
#[derive(Debug, Clone)]
pub(crate) struct Flaky {
  pub armed: Arc<AtomicBool>,
}

impl LeafActivity for Flaky {
  fn kind(&self) -> &str {
    "flaky"
  }

  fn resume(&self, _at: &str, _ctx: &mut StepContext<'_>) -> Result<(), ActivityError> {
    if self.armed.load(Ordering::SeqCst) {
      return Err(ActivityError::failed("flaky activity failed"));
    }
    Ok(())
  }
}

/// Waits on `bookmark` with no continuation: the frame completes once it is resolved
/// and the payload is discarded.
#[derive(Debug, Clone)]
pub(crate) struct Detach {
  pub bookmark: &'static str,
}

impl LeafActivity for Detach {
  fn kind(&self) -> &str {
    "detach"
  }

  fn resume(&self, at: &str, ctx: &mut StepContext<'_>) -> Result<(), ActivityError> {
    assert_eq!(at, ENTRY);
    ctx.wait_on_bookmark(self.bookmark, None)
  }
}

pub(crate) fn trace_of(variables: &std::collections::BTreeMap<String, Value>) -> Vec<String> {
  variables
    .get(TRACE)
    .and_then(Value::as_list)
    .map(|items| {
      items
        .iter()
        .filter_map(|v| v.as_text().map(str::to_string))
        .collect()
    })
    .unwrap_or_default()
}

pub(crate) fn new_log() -> Arc<Mutex<Vec<String>>> {
  Arc::new(Mutex::new(Vec::new()))
}
