//! Host loop: open or resume an instance, step it, checkpoint after every change, and
//! wait for bookmark resolutions when no work is ready.
//!
//! - [Host::open]: `NoCheckpoint → Running` or `Resuming → Running`.
//! - [Host::step]: one non-blocking iteration.
//! - [Host::run]: step until `Done`, awaiting resolutions while `Blocked`.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::activities::Workflow;
use crate::checkpoint_io::CheckpointStore;
use crate::error::EngineError;
use crate::resolver::{BookmarkResolver, Resolution};
use crate::scheduler;
use crate::types::{ExecutionState, Value};

/// Host state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  NoCheckpoint,
  Resuming,
  Running,
  Blocked,
  Done,
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Phase::NoCheckpoint => write!(f, "no_checkpoint"),
      Phase::Resuming => write!(f, "resuming"),
      Phase::Running => write!(f, "running"),
      Phase::Blocked => write!(f, "blocked"),
      Phase::Done => write!(f, "done"),
    }
  }
}

/// Result of a completed workflow instance.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
  pub instance_id: Uuid,
  /// Continuations executed over the whole life of the instance, across restarts.
  pub steps: u64,
  /// Final workflow-global variables.
  pub variables: BTreeMap<String, Value>,
}

/// Runs one workflow instance against a checkpoint store.
pub struct Host<S: CheckpointStore> {
  workflow: Workflow,
  store: S,
  state: ExecutionState,
  phase: Phase,
  resumed: bool,
  halted: bool,
  tx: mpsc::UnboundedSender<Resolution>,
  rx: mpsc::UnboundedReceiver<Resolution>,
  parked: VecDeque<Resolution>,
}

impl<S: CheckpointStore> Host<S> {
  /// Loads the instance from `store`, or starts a fresh one when there is no
  /// checkpoint. Nothing is written until the first step.
  #[instrument(level = "trace", skip(workflow, store))]
  pub fn open(workflow: Workflow, store: S) -> Result<Self, EngineError> {
    let (state, from) = match store.load()? {
      Some(state) => {
        state.validate(&workflow)?;
        (state, Phase::Resuming)
      }
      None => (ExecutionState::new(Workflow::ROOT), Phase::NoCheckpoint),
    };
    let phase = if state.has_ready_work() {
      Phase::Running
    } else {
      Phase::Blocked
    };
    info!(
      instance = %state.instance_id,
      steps = state.steps,
      from = %from,
      to = %phase,
      "workflow instance opened"
    );
    let (tx, rx) = mpsc::unbounded_channel();
    Ok(Self {
      workflow,
      store,
      state,
      phase,
      resumed: from == Phase::Resuming,
      halted: false,
      tx,
      rx,
      parked: VecDeque::new(),
    })
  }

  /// Handle for delivering bookmark payloads to this host.
  pub fn resolver(&self) -> BookmarkResolver {
    BookmarkResolver::new(self.tx.clone())
  }

  pub fn phase(&self) -> Phase {
    self.phase
  }

  /// Whether this instance was loaded from a checkpoint.
  pub fn resumed(&self) -> bool {
    self.resumed
  }

  pub fn state(&self) -> &ExecutionState {
    &self.state
  }

  pub fn workflow(&self) -> &Workflow {
    &self.workflow
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  pub fn summary(&self) -> RunSummary {
    RunSummary {
      instance_id: self.state.instance_id,
      steps: self.state.steps,
      variables: self.state.variables.clone(),
    }
  }

  fn transition(&mut self, to: Phase) {
    if self.phase != to {
      info!(instance = %self.state.instance_id, from = %self.phase, to = %to, "phase change");
      self.phase = to;
    }
  }

  fn next_resolution(&mut self) -> Option<Resolution> {
    self.parked.pop_front().or_else(|| self.rx.try_recv().ok())
  }

  /// Applies queued resolutions; returns the replies owed once they are durable.
  fn apply_resolutions(&mut self) -> Vec<oneshot::Sender<Result<(), EngineError>>> {
    let mut acks = Vec::new();
    while let Some(Resolution {
      name,
      payload,
      reply,
    }) = self.next_resolution()
    {
      match self.state.resolve_bookmark(&name, payload) {
        Ok(frame) => {
          info!(bookmark = %name, %frame, "bookmark resolution applied");
          acks.push(reply);
        }
        Err(e) => {
          warn!(bookmark = %name, error = %e, "bookmark resolution rejected");
          let _ = reply.send(Err(e));
        }
      }
    }
    acks
  }

  /// One iteration: apply queued resolutions, run at most one continuation, join, then
  /// clear the checkpoint (forest empty) or save it (if anything changed).
  ///
  /// Any error is fatal: the host halts and the store keeps its last good checkpoint.
  pub fn step(&mut self) -> Result<Phase, EngineError> {
    if self.halted {
      return Err(EngineError::HostStopped);
    }
    if self.phase == Phase::Done {
      return Ok(Phase::Done);
    }
    let result = self.try_step();
    if result.is_err() {
      self.halted = true;
    }
    result
  }

  fn try_step(&mut self) -> Result<Phase, EngineError> {
    let acks = self.apply_resolutions();
    let mut changed = !acks.is_empty();
    if changed {
      // A dependency with no continuation leaves its frame complete but not ready.
      let removed = self.state.prune_completed();
      if !removed.is_empty() {
        debug!(?removed, "frames completed by bookmark resolution");
      }
    }
    if scheduler::run_step(&mut self.state, &self.workflow)?.is_some() {
      changed = true;
    }

    if self.state.is_finished() {
      self.store.clear()?;
      info!(instance = %self.state.instance_id, steps = self.state.steps, "workflow complete");
      for ack in acks {
        let _ = ack.send(Ok(()));
      }
      self.transition(Phase::Done);
      return Ok(Phase::Done);
    }

    if changed {
      self.store.save(&self.state)?;
    }
    for ack in acks {
      let _ = ack.send(Ok(()));
    }
    let next = if self.state.has_ready_work() {
      Phase::Running
    } else {
      Phase::Blocked
    };
    self.transition(next);
    Ok(next)
  }

  /// Steps until the instance completes. While blocked, waits for the next bookmark
  /// resolution and re-checks for ready work.
  ///
  /// The host holds a sender of its own, so a blocked `run` waits indefinitely; bound
  /// it with `tokio::time::timeout` or `select!`. Cancel-safe: every applied change is
  /// checkpointed before the next await.
  pub async fn run(&mut self) -> Result<RunSummary, EngineError> {
    loop {
      match self.step()? {
        Phase::Done => return Ok(self.summary()),
        Phase::Blocked => {
          if let Some(resolution) = self.rx.recv().await {
            self.parked.push_back(resolution);
          }
        }
        _ => tokio::task::yield_now().await,
      }
    }
  }
}
