//! Checkpoint stores: atomic save/load/clear of one execution state (JSON).

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, instrument};

use crate::error::EngineError;
use crate::types::{CHECKPOINT_VERSION, Checkpoint, ExecutionState};

/// Default checkpoint filename under a run directory.
pub const CHECKPOINT_FILENAME: &str = "execution.json";

/// Durable home of one workflow instance's execution state.
///
/// `save` must be atomic: after a failed or interrupted save, `load` returns the
/// previously saved state.
pub trait CheckpointStore {
  fn save(&self, state: &ExecutionState) -> Result<(), EngineError>;

  /// `Ok(None)` when no checkpoint exists.
  fn load(&self) -> Result<Option<ExecutionState>, EngineError>;

  /// Deletes the checkpoint; succeeds when there is none.
  fn clear(&self) -> Result<(), EngineError>;
}

impl<S: CheckpointStore + ?Sized> CheckpointStore for &S {
  fn save(&self, state: &ExecutionState) -> Result<(), EngineError> {
    (**self).save(state)
  }

  fn load(&self) -> Result<Option<ExecutionState>, EngineError> {
    (**self).load()
  }

  fn clear(&self) -> Result<(), EngineError> {
    (**self).clear()
  }
}

fn persistence(source: std::io::Error) -> EngineError {
  EngineError::PersistenceFailure { source }
}

/// Serializes `state` into checkpoint JSON.
pub fn encode_checkpoint(state: &ExecutionState) -> Result<Vec<u8>, EngineError> {
  serde_json::to_vec_pretty(&Checkpoint::new(state.clone()))
    .map_err(|e| persistence(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// Parses checkpoint JSON. Unreadable content or an unknown version is corrupt; graph
/// validation is left to the caller, which knows the workflow.
pub fn decode_checkpoint(bytes: &[u8]) -> Result<ExecutionState, EngineError> {
  let cp: Checkpoint = serde_json::from_slice(bytes)
    .map_err(|e| EngineError::corrupt(format!("unreadable checkpoint: {e}")))?;
  if cp.version != CHECKPOINT_VERSION {
    return Err(EngineError::corrupt(format!(
      "unsupported checkpoint version {}",
      cp.version
    )));
  }
  Ok(cp.state)
}

/// Stores the checkpoint in a single file, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
  path: PathBuf,
}

impl FileCheckpointStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  /// Store at `run_dir/execution.json`.
  pub fn in_dir(run_dir: &Path) -> Self {
    Self::new(run_dir.join(CHECKPOINT_FILENAME))
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn exists(&self) -> bool {
    self.path.exists()
  }
}

impl CheckpointStore for FileCheckpointStore {
  /// Writes to a temporary file next to the target, syncs it, then renames it over
  /// the target.
  #[instrument(level = "trace", skip(self, state), fields(path = %self.path.display()))]
  fn save(&self, state: &ExecutionState) -> Result<(), EngineError> {
    let json = encode_checkpoint(state)?;
    let dir = match self.path.parent() {
      Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
      _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(persistence)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(persistence)?;
    tmp.write_all(&json).map_err(persistence)?;
    tmp.as_file().sync_all().map_err(persistence)?;
    tmp.persist(&self.path).map_err(|e| persistence(e.error))?;
    debug!(steps = state.steps, "checkpoint saved");
    Ok(())
  }

  #[instrument(level = "trace", skip(self), fields(path = %self.path.display()))]
  fn load(&self) -> Result<Option<ExecutionState>, EngineError> {
    let bytes = match std::fs::read(&self.path) {
      Ok(b) => b,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(persistence(e)),
    };
    decode_checkpoint(&bytes).map(Some)
  }

  #[instrument(level = "trace", skip(self), fields(path = %self.path.display()))]
  fn clear(&self) -> Result<(), EngineError> {
    match std::fs::remove_file(&self.path) {
      Ok(()) => {
        debug!("checkpoint cleared");
        Ok(())
      }
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(persistence(e)),
    }
  }
}

/// In-memory store holding the serialized checkpoint bytes. Clones share the same
/// slot, so a clone kept by a test survives dropping the host that used it.
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpointStore {
  slot: Arc<Mutex<Option<Vec<u8>>>>,
}

impl MemoryCheckpointStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<Vec<u8>>>, EngineError> {
    self
      .slot
      .lock()
      .map_err(|_| persistence(std::io::Error::other("checkpoint slot poisoned")))
  }

  /// Raw checkpoint bytes, if any.
  pub fn bytes(&self) -> Option<Vec<u8>> {
    self.lock().ok().and_then(|slot| slot.clone())
  }

  /// Replaces the raw checkpoint bytes.
  pub fn set_bytes(&self, bytes: Option<Vec<u8>>) {
    if let Ok(mut slot) = self.lock() {
      *slot = bytes;
    }
  }

  pub fn exists(&self) -> bool {
    self.bytes().is_some()
  }
}

impl CheckpointStore for MemoryCheckpointStore {
  fn save(&self, state: &ExecutionState) -> Result<(), EngineError> {
    let json = encode_checkpoint(state)?;
    *self.lock()? = Some(json);
    Ok(())
  }

  fn load(&self) -> Result<Option<ExecutionState>, EngineError> {
    match self.lock()?.as_deref() {
      Some(bytes) => decode_checkpoint(bytes).map(Some),
      None => Ok(None),
    }
  }

  fn clear(&self) -> Result<(), EngineError> {
    *self.lock()? = None;
    Ok(())
  }
}
