//! File-backed task list used by the `tasks` binary.

mod manager;
mod model;
mod storage;

pub use manager::{ListOptions, NewTask, SortKey, StatusFilter, TaskManager, TaskStats};
pub use model::{Priority, Task, TaskError};
pub use storage::Storage;
