//! Delivery of external events to a running host.
//!
//! Notifiers never touch the execution state: they send a [`Resolution`] to the host,
//! which applies it between steps and replies once the payload is checkpointed.

use tokio::sync::{mpsc, oneshot};
use tracing::instrument;

use crate::error::EngineError;
use crate::types::Value;

/// One `(bookmark, payload)` pair and the channel to report the outcome on.
#[derive(Debug)]
pub(crate) struct Resolution {
  pub(crate) name: String,
  pub(crate) payload: Value,
  pub(crate) reply: oneshot::Sender<Result<(), EngineError>>,
}

/// Cloneable handle for resolving bookmarks of one host, from async tasks or plain
/// threads.
#[derive(Debug, Clone)]
pub struct BookmarkResolver {
  tx: mpsc::UnboundedSender<Resolution>,
}

impl BookmarkResolver {
  pub(crate) fn new(tx: mpsc::UnboundedSender<Resolution>) -> Self {
    Self { tx }
  }

  fn send(
    &self,
    name: &str,
    payload: Value,
  ) -> Result<oneshot::Receiver<Result<(), EngineError>>, EngineError> {
    let (reply, rx) = oneshot::channel();
    self
      .tx
      .send(Resolution {
        name: name.to_string(),
        payload,
        reply,
      })
      .map_err(|_| EngineError::HostStopped)?;
    Ok(rx)
  }

  /// Resolves bookmark `name`. Returns once the host has applied and checkpointed the
  /// payload, or with `UnknownBookmark` when no pending bookmark has that name.
  #[instrument(level = "trace", skip(self, payload))]
  pub async fn resolve(&self, name: &str, payload: impl Into<Value>) -> Result<(), EngineError> {
    let rx = self.send(name, payload.into())?;
    rx.await.map_err(|_| EngineError::HostStopped)?
  }

  /// Blocking form of [`resolve`](Self::resolve) for notifier threads outside the
  /// runtime. Must not be called from within an async context.
  pub fn resolve_blocking(&self, name: &str, payload: impl Into<Value>) -> Result<(), EngineError> {
    let rx = self.send(name, payload.into())?;
    rx.blocking_recv().map_err(|_| EngineError::HostStopped)?
  }

  pub fn is_closed(&self) -> bool {
    self.tx.is_closed()
  }
}
