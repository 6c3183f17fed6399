//! Serializable execution data: frames, bookmarks, continuations, values and the
//! execution state that owns them.

mod bookmark;
mod checkpoint;
mod continuation;
mod execution_state;
mod frame;
mod value;

pub use bookmark::Bookmark;
pub use checkpoint::{CHECKPOINT_VERSION, Checkpoint};
pub use continuation::{ActivityId, Continuation, ENTRY};
pub use execution_state::ExecutionState;
pub use frame::{Dependency, DependencyKey, Frame, FrameId};
pub use value::Value;
