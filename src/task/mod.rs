//! Task module - tracks research runs from submission to a terminal state.
//!
//! - `task`: the per-request record and its state machine
//! - `registry`: the shared store, polling and eviction

pub mod task;
mod registry;

pub use registry::{RegistryConfig, TaskRegistry, DEFAULT_MAX_TASKS, DEFAULT_TASK_TTL};
pub use task::{ChunkView, Task, TaskId, TaskSnapshot, TaskState};
