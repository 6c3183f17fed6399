//! Registry of a workflow's activities, indexed by [`ActivityId`].

use tracing::instrument;

use super::{Activity, LeafActivity, Parallel, Sequence, StepContext};
use crate::error::EngineError;
use crate::types::{ActivityId, Continuation, ExecutionState, FrameId};

#[derive(Debug)]
enum Definition {
  Sequence(Sequence),
  Parallel(Parallel),
  Leaf(Box<dyn LeafActivity>),
}

/// A workflow definition flattened in pre-order; the root is `ActivityId(0)`.
///
/// Checkpoints refer to activities by id, so a workflow must be rebuilt with the same
/// shape to resume an instance.
#[derive(Debug)]
pub struct Workflow {
  definitions: Vec<Definition>,
}

impl Workflow {
  pub const ROOT: ActivityId = ActivityId(0);

  pub fn new(root: Activity) -> Self {
    let mut definitions = Vec::new();
    register(root, &mut definitions);
    Self { definitions }
  }

  pub fn len(&self) -> usize {
    self.definitions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.definitions.is_empty()
  }

  fn definition(&self, id: ActivityId) -> Option<&Definition> {
    self.definitions.get(id.0 as usize)
  }

  /// Short name of the activity, for logs.
  pub fn kind(&self, id: ActivityId) -> &str {
    match self.definition(id) {
      Some(Definition::Sequence(_)) => "sequence",
      Some(Definition::Parallel(_)) => "parallel",
      Some(Definition::Leaf(leaf)) => leaf.kind(),
      None => "unknown",
    }
  }

  /// Child ids of a composite; empty for leaves.
  pub fn children(&self, id: ActivityId) -> &[ActivityId] {
    match self.definition(id) {
      Some(Definition::Sequence(s)) => &s.children,
      Some(Definition::Parallel(p)) => &p.children,
      _ => &[],
    }
  }

  /// Whether `cont` names a known activity and one of its resumption points.
  pub fn accepts(&self, cont: &Continuation) -> bool {
    match self.definition(cont.activity) {
      Some(Definition::Sequence(_)) | Some(Definition::Parallel(_)) => cont.is_entry(),
      Some(Definition::Leaf(leaf)) => leaf.resume_points().contains(&cont.resume_at.as_str()),
      None => false,
    }
  }

  /// Runs `cont` against `frame`.
  #[instrument(level = "trace", skip(self, state))]
  pub(crate) fn dispatch(
    &self,
    state: &mut ExecutionState,
    frame: FrameId,
    cont: &Continuation,
  ) -> Result<(), EngineError> {
    let definition = self
      .definition(cont.activity)
      .ok_or_else(|| EngineError::corrupt(format!("unknown activity {}", cont.activity)))?;
    let failure = |source| EngineError::ActivityFailure {
      activity: self.kind(cont.activity).to_string(),
      frame,
      source,
    };
    match definition {
      Definition::Sequence(s) if cont.is_entry() => {
        let mut ctx = StepContext::new(state, frame, cont.activity, Vec::new());
        s.execute(&mut ctx).map_err(failure)
      }
      Definition::Parallel(p) if cont.is_entry() => {
        let mut ctx = StepContext::new(state, frame, cont.activity, Vec::new());
        p.execute(&mut ctx).map_err(failure)
      }
      Definition::Leaf(leaf) => {
        let mut ctx = StepContext::new(state, frame, cont.activity, leaf.variables());
        leaf.resume(&cont.resume_at, &mut ctx).map_err(failure)
      }
      _ => Err(EngineError::corrupt(format!("unknown continuation {cont}"))),
    }
  }
}

fn register(activity: Activity, definitions: &mut Vec<Definition>) -> ActivityId {
  let id = ActivityId(definitions.len() as u32);
  match activity {
    Activity::Sequence(children) => {
      definitions.push(Definition::Sequence(Sequence::new(Vec::new())));
      let ids = children
        .into_iter()
        .map(|c| register(c, definitions))
        .collect();
      definitions[id.0 as usize] = Definition::Sequence(Sequence::new(ids));
    }
    Activity::Parallel(children) => {
      definitions.push(Definition::Parallel(Parallel::new(Vec::new())));
      let ids = children
        .into_iter()
        .map(|c| register(c, definitions))
        .collect();
      definitions[id.0 as usize] = Definition::Parallel(Parallel::new(ids));
    }
    Activity::Leaf(leaf) => definitions.push(Definition::Leaf(leaf)),
  }
  id
}
