//! # streamweave-durable
//!
//! Durable workflow execution on an activation-frame tree.
//!
//! ## Architecture
//!
//! A workflow is a tree of [`Activity`] definitions (sequence, parallel, leaves),
//! flattened into a [`Workflow`] registry. Execution happens in frames owned by an
//! [`ExecutionState`]: each frame holds a stack of continuations, named by activity id
//! and resumption label, and the dependencies (child frames, bookmarks) it is waiting
//! on. The [`Host`] runs one continuation per step, prunes completed frames (the join),
//! and checkpoints the whole state through a [`CheckpointStore`] before the next step.
//! External events arrive through a [`BookmarkResolver`].

pub mod activities;
pub mod checkpoint_io;
pub mod error;
pub mod resolver;
pub mod runner;
#[cfg(test)]
mod runner_test;
pub mod scheduler;
#[cfg(test)]
mod test_support;
pub mod types;

pub use activities::{Activity, LeafActivity, StepContext, Workflow};
pub use checkpoint_io::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use error::{ActivityError, EngineError};
pub use resolver::BookmarkResolver;
pub use runner::{Host, Phase, RunSummary};
pub use types::{ExecutionState, Value};
