//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! task list data layer test suite.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built test data for tasks and task lists
//! - `builders`: Builder patterns for test data construction
//! - `database`: Temporary SQLite databases with the schema applied
//! - `assertions`: Custom assertion helpers for entities and pages
//! - `generators`: Property-based test data generators
//! - `logging`: Tracing subscriber for test output

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;
pub mod logging;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
pub use logging::*;
