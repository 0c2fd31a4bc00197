//! Task List Domain
//!
//! The entities managed through the generic data layer in `infra_db`.
//!
//! # Key Concepts
//!
//! - **Task**: a piece of work with an allotted and an elapsed number of days
//! - **TaskList**: a named group of tasks with a store-generated key
//!
//! Each entity exposes its eager-load paths as [`infra_db::Include`]
//! constructors: [`Task::task_list_include`] and [`TaskList::tasks_include`].

pub mod schema;
pub mod task;
pub mod task_list;

pub use schema::{migrate, MIGRATOR};
pub use task::{Task, TaskStatus};
pub use task_list::TaskList;
