//! The durable root object of one workflow instance: the frame forest, the
//! bookmark table and the workflow-global variables.
//!
//! Frames live in an arena keyed by [`FrameId`]; parents and dependencies refer to
//! frames by id, so the serialized form is a graph with no duplicated nodes. A frame
//! is live iff it is in the arena.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{ActivityId, Bookmark, Continuation, Dependency, DependencyKey, Frame, FrameId, Value};
use crate::activities::Workflow;
use crate::error::{ActivityError, EngineError};

/// Execution state of one workflow instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionState {
  pub instance_id: Uuid,
  pub root: FrameId,
  pub frames: BTreeMap<FrameId, Frame>,
  pub bookmarks: BTreeMap<String, Bookmark>,
  pub variables: BTreeMap<String, Value>,
  pub next_frame_id: u64,
  pub next_activation: u64,
  /// Number of continuations executed so far.
  pub steps: u64,
}

impl ExecutionState {
  /// Fresh instance: one root frame whose only pending continuation is the entry of
  /// `root_activity`.
  pub fn new(root_activity: ActivityId) -> Self {
    let root = FrameId(0);
    let mut frame = Frame::new(root, None, 0);
    frame
      .pending_continuations
      .push(Continuation::entry(root_activity));
    let mut frames = BTreeMap::new();
    frames.insert(root, frame);
    Self {
      instance_id: Uuid::new_v4(),
      root,
      frames,
      bookmarks: BTreeMap::new(),
      variables: BTreeMap::new(),
      next_frame_id: 1,
      next_activation: 1,
      steps: 0,
    }
  }

  pub fn frame(&self, id: FrameId) -> Option<&Frame> {
    self.frames.get(&id)
  }

  pub fn frame_mut(&mut self, id: FrameId) -> Option<&mut Frame> {
    self.frames.get_mut(&id)
  }

  /// True once the forest is empty.
  pub fn is_finished(&self) -> bool {
    self.frames.is_empty()
  }

  pub fn has_ready_work(&self) -> bool {
    self.frames.values().any(Frame::is_ready)
  }

  /// Non-empty forest with no ready frame: only external bookmarks can make progress.
  pub fn is_blocked(&self) -> bool {
    !self.is_finished() && !self.has_ready_work()
  }

  fn activate(&mut self) -> u64 {
    let stamp = self.next_activation;
    self.next_activation += 1;
    stamp
  }

  /// The ready frame most recently made live.
  pub fn ready_frame(&self) -> Option<FrameId> {
    self
      .frames
      .values()
      .filter(|f| f.is_ready())
      .max_by_key(|f| f.activated)
      .map(|f| f.id)
  }

  /// Pops the top continuation of `frame`.
  pub fn pop_continuation(&mut self, frame: FrameId) -> Option<Continuation> {
    self.frames.get_mut(&frame)?.pending_continuations.pop()
  }

  /// Creates a child of `parent` whose first continuation is the entry of `activity`,
  /// and records `on_complete` as the parent's dependency on it. `parent` must be live.
  #[instrument(level = "trace", skip(self, on_complete))]
  pub fn schedule_child(
    &mut self,
    parent: FrameId,
    activity: ActivityId,
    on_complete: Option<Continuation>,
  ) -> Result<FrameId, ActivityError> {
    if !self.frames.contains_key(&parent) {
      return Err(ActivityError::UnknownFrame { frame: parent });
    }
    let id = FrameId(self.next_frame_id);
    self.next_frame_id += 1;
    let stamp = self.activate();
    let mut child = Frame::new(id, Some(parent), stamp);
    child
      .pending_continuations
      .push(Continuation::entry(activity));
    if let Some(p) = self.frames.get_mut(&parent) {
      p.pending_dependencies.push(Dependency {
        key: DependencyKey::Frame(id),
        on_clear: on_complete,
      });
    }
    self.frames.insert(id, child);
    debug!(%parent, child = %id, %activity, "scheduled child frame");
    Ok(id)
  }

  /// Creates bookmark `name` owned by this state and makes `frame` depend on it.
  /// `frame` must be live.
  #[instrument(level = "trace", skip(self, on_resolved))]
  pub fn wait_on_bookmark(
    &mut self,
    frame: FrameId,
    name: &str,
    on_resolved: Option<Continuation>,
  ) -> Result<(), ActivityError> {
    if !self.frames.contains_key(&frame) {
      return Err(ActivityError::UnknownFrame { frame });
    }
    if self.bookmarks.contains_key(name) {
      return Err(ActivityError::DuplicateBookmark {
        name: name.to_string(),
      });
    }
    self
      .bookmarks
      .insert(name.to_string(), Bookmark::new(name, frame));
    if let Some(f) = self.frames.get_mut(&frame) {
      f.pending_dependencies.push(Dependency {
        key: DependencyKey::Bookmark(name.to_string()),
        on_clear: on_resolved,
      });
    }
    debug!(%frame, bookmark = name, "waiting on bookmark");
    Ok(())
  }

  /// Writes the payload of bookmark `name` and clears the waiting frame's dependency,
  /// pushing its continuation (if any). A name with no live, unresolved bookmark is
  /// `UnknownBookmark`.
  #[instrument(level = "trace", skip(self, payload))]
  pub fn resolve_bookmark(&mut self, name: &str, payload: Value) -> Result<FrameId, EngineError> {
    let unknown = || EngineError::UnknownBookmark {
      name: name.to_string(),
    };
    let bookmark = self.bookmarks.get_mut(name).ok_or_else(unknown)?;
    if bookmark.is_resolved() {
      return Err(unknown());
    }
    bookmark.payload = Some(payload);
    let waiting = bookmark.waiting_frame;

    let key = DependencyKey::Bookmark(name.to_string());
    let on_clear = self
      .frames
      .get_mut(&waiting)
      .and_then(|f| f.take_dependency(&key))
      .and_then(|d| d.on_clear);
    match on_clear {
      Some(cont) => {
        let stamp = self.activate();
        if let Some(f) = self.frames.get_mut(&waiting) {
          f.pending_continuations.push(cont);
          f.activated = stamp;
        }
      }
      // Nothing will read the payload.
      None => {
        self.bookmarks.remove(name);
      }
    }
    debug!(bookmark = name, frame = %waiting, "bookmark resolved");
    Ok(waiting)
  }

  /// Takes the payload of a resolved bookmark, retiring the bookmark.
  pub fn take_payload(&mut self, name: &str) -> Option<Value> {
    if !self.bookmarks.get(name)?.is_resolved() {
      return None;
    }
    self.bookmarks.remove(name).and_then(|b| b.payload)
  }

  /// Join algorithm: removes every complete frame, clearing the parent's dependency on
  /// it and pushing the recorded continuation, and repeats until a pass removes
  /// nothing. Returns the removed frames in removal order.
  #[instrument(level = "trace", skip(self))]
  pub fn prune_completed(&mut self) -> Vec<FrameId> {
    let mut removed = Vec::new();
    loop {
      let complete: Vec<FrameId> = self
        .frames
        .values()
        .filter(|f| f.is_complete())
        .map(|f| f.id)
        .collect();
      if complete.is_empty() {
        break;
      }
      for id in complete {
        let Some(frame) = self.frames.remove(&id) else {
          continue;
        };
        if let Some(parent_id) = frame.parent {
          let key = DependencyKey::Frame(id);
          let on_clear = self
            .frames
            .get_mut(&parent_id)
            .and_then(|p| p.take_dependency(&key))
            .and_then(|d| d.on_clear);
          if let Some(cont) = on_clear {
            let stamp = self.activate();
            if let Some(p) = self.frames.get_mut(&parent_id) {
              p.pending_continuations.push(cont);
              p.activated = stamp;
            }
          }
        }
        self.bookmarks.retain(|_, b| b.waiting_frame != id);
        debug!(frame = %id, parent = ?frame.parent, "frame completed");
        removed.push(id);
      }
    }
    removed
  }

  /// Checks the identity relationships of a loaded state.
  pub fn validate(&self, workflow: &Workflow) -> Result<(), EngineError> {
    if self.frames.is_empty() {
      return Err(EngineError::corrupt("frame forest is empty"));
    }
    let root = self
      .frames
      .get(&self.root)
      .ok_or_else(|| EngineError::corrupt(format!("root {} is missing", self.root)))?;
    if root.parent.is_some() {
      return Err(EngineError::corrupt("root frame has a parent"));
    }

    for (id, frame) in &self.frames {
      if *id != frame.id {
        return Err(EngineError::corrupt(format!(
          "{id} is stored under the wrong key ({})",
          frame.id
        )));
      }
      if id.0 >= self.next_frame_id {
        return Err(EngineError::corrupt(format!("{id} is beyond next_frame_id")));
      }
      if frame.activated >= self.next_activation {
        return Err(EngineError::corrupt(format!(
          "{id} has an activation stamp from the future"
        )));
      }
      match frame.parent {
        None if *id != self.root => {
          return Err(EngineError::corrupt(format!("{id} has no parent")));
        }
        Some(parent) => {
          let p = self
            .frames
            .get(&parent)
            .ok_or_else(|| EngineError::corrupt(format!("{id} has missing parent {parent}")))?;
          if !p.has_dependency(&DependencyKey::Frame(*id)) {
            return Err(EngineError::corrupt(format!(
              "{parent} does not depend on its child {id}"
            )));
          }
        }
        None => {}
      }
      for cont in &frame.pending_continuations {
        if !workflow.accepts(cont) {
          return Err(EngineError::corrupt(format!(
            "{id} holds unknown continuation {cont}"
          )));
        }
      }
      for (i, dep) in frame.pending_dependencies.iter().enumerate() {
        if frame.pending_dependencies[..i].iter().any(|d| d.key == dep.key) {
          return Err(EngineError::corrupt(format!(
            "{id} depends twice on {}",
            dep.key
          )));
        }
        if let Some(cont) = dep.on_clear.as_ref().filter(|c| !workflow.accepts(c)) {
          return Err(EngineError::corrupt(format!(
            "{id} holds unknown continuation {cont}"
          )));
        }
        match &dep.key {
          DependencyKey::Frame(child) => {
            let c = self.frames.get(child).ok_or_else(|| {
              EngineError::corrupt(format!("{id} depends on missing {child}"))
            })?;
            if c.parent != Some(*id) {
              return Err(EngineError::corrupt(format!(
                "{id} depends on {child}, which is not its child"
              )));
            }
          }
          DependencyKey::Bookmark(name) => {
            let b = self.bookmarks.get(name).ok_or_else(|| {
              EngineError::corrupt(format!("{id} waits on missing bookmark '{name}'"))
            })?;
            if b.waiting_frame != *id || b.is_resolved() {
              return Err(EngineError::corrupt(format!(
                "bookmark '{name}' does not belong to {id}"
              )));
            }
          }
        }
      }
    }

    for (name, bookmark) in &self.bookmarks {
      if *name != bookmark.name {
        return Err(EngineError::corrupt(format!(
          "bookmark '{}' is stored under '{name}'",
          bookmark.name
        )));
      }
      let waiting = self.frames.get(&bookmark.waiting_frame).ok_or_else(|| {
        EngineError::corrupt(format!(
          "bookmark '{name}' waits in missing {}",
          bookmark.waiting_frame
        ))
      })?;
      let key = DependencyKey::Bookmark(name.clone());
      if !bookmark.is_resolved() && !waiting.has_dependency(&key) {
        return Err(EngineError::corrupt(format!(
          "pending bookmark '{name}' is not a dependency of {}",
          waiting.id
        )));
      }
    }
    Ok(())
  }
}
