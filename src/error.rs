//! Engine and activity errors.

use std::path::PathBuf;

use crate::types::FrameId;

/// Failure raised by a leaf activity while one of its continuations runs.
#[derive(Debug, thiserror::Error)]
pub enum ActivityError {
  /// The activity touched a variable it did not declare.
  #[error("variable '{name}' is not declared by this activity")]
  Undeclared { name: String },

  /// A declared variable was read before anything wrote it.
  #[error("variable '{name}' has no value")]
  MissingVariable { name: String },

  /// A variable holds a value of another type.
  #[error("variable '{name}' is not {expected}")]
  TypeMismatch { name: String, expected: &'static str },

  /// A live bookmark with the same name already exists.
  #[error("bookmark '{name}' is already pending")]
  DuplicateBookmark { name: String },

  /// The bookmark was never resolved (or its payload was already taken).
  #[error("bookmark '{name}' has no payload")]
  MissingPayload { name: String },

  /// A frame operation named a frame that is not live.
  #[error("{frame} is not live")]
  UnknownFrame { frame: FrameId },

  /// The activity was resumed at a label it does not know.
  #[error("unknown resumption point '{label}'")]
  UnknownResumePoint { label: String },

  #[error("i/o error on {}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// Free-form failure for user-defined activities.
  #[error("{message}")]
  Failed { message: String },
}

impl ActivityError {
  pub fn failed(message: impl Into<String>) -> Self {
    ActivityError::Failed {
      message: message.into(),
    }
  }
}

/// Errors surfaced by the engine. Every variant except `UnknownBookmark` is fatal
/// to the step loop.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
  /// The checkpoint was readable but does not describe a valid execution graph.
  #[error("checkpoint is corrupt: {reason}")]
  CheckpointCorrupt { reason: String },

  /// No live, unresolved bookmark carries this name.
  #[error("no pending bookmark named '{name}'")]
  UnknownBookmark { name: String },

  /// A leaf activity failed during its step.
  #[error("activity '{activity}' failed in frame {frame}")]
  ActivityFailure {
    activity: String,
    frame: FrameId,
    #[source]
    source: ActivityError,
  },

  /// Writing or clearing the checkpoint did not complete.
  #[error("checkpoint persistence failed")]
  PersistenceFailure {
    #[source]
    source: std::io::Error,
  },

  /// The host that owned the workflow instance is no longer running.
  #[error("workflow host has stopped")]
  HostStopped,
}

impl EngineError {
  pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
    EngineError::CheckpointCorrupt {
      reason: reason.into(),
    }
  }
}
