//! Users, tasks and a repository over them.
//!
//! Independent of the benchmark harness; only the SQLite session and the
//! logging/config plumbing from `bench-core` are shared.

pub mod model;
pub mod repository;

pub use model::{Task, User};
pub use repository::{RepositoryError, SqliteTaskRepository, TaskRepository};
