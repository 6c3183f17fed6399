//! Activities: the composites (`Sequence`, `Parallel`), the leaf trait, the built-in
//! leaves and the [`Workflow`] registry that continuations are resolved against.

mod activity;
mod context;
mod parallel;
mod read_file;
mod sequence;
mod set_variable;
mod wait_for_bookmark;
mod workflow;
mod write_line;

pub use activity::{Access, Activity, LeafActivity, Scope, VariableDecl};
pub use context::StepContext;
pub use parallel::Parallel;
pub use read_file::ReadFile;
pub use sequence::{POSITION, Sequence};
pub use set_variable::SetVariable;
pub use wait_for_bookmark::{ON_DATA_AVAILABLE, WaitForBookmark};
pub use workflow::Workflow;
pub use write_line::WriteLine;
