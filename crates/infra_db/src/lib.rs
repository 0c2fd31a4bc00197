//! Infrastructure Database Layer
//!
//! This crate provides a generic, entity-agnostic data access layer on top of
//! SQLx (SQLite). Calling code expresses query intent (filter, order, page,
//! eager loads, raw SQL) without bespoke query code per entity type, and
//! commits through a unit of work that spans every repository of a scope.
//!
//! # Architecture
//!
//! - [`Entity`]: the capability an entity type implements (table, columns,
//!   static identity)
//! - [`query`]: the composer (includes, filter, order, page) and lazy [`Query`]
//! - [`Repository`]: per-type façade with [`TrackedReader`] and
//!   [`SnapshotReader`] read capabilities and staged writes
//! - [`UnitOfWork`]: owns one [`DbContext`], caches repositories per type and
//!   commits all staged changes atomically
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, DatabaseConfig, OrderBy, TrackedReader, UnitOfWork};
//!
//! let pool = create_pool(DatabaseConfig::from_env()?).await?;
//! let uow = UnitOfWork::begin(&pool).await?;
//! let tasks = uow.repository::<Task>()?;
//! let page = tasks
//!     .get_paged_list(2, 10, OrderBy::asc(|t: &Task| t.id.clone()), None, vec![])
//!     .await?;
//! ```

pub mod cancel;
pub mod context;
pub mod entity;
pub mod error;
pub mod pool;
pub mod query;
pub mod raw_sql;
pub mod repository;
pub mod unit_of_work;

mod statement;

pub use cancel::CancellationToken;
pub use context::{DbContext, EntityState};
pub use entity::{Entity, EntityKey, Value};
pub use error::DataError;
pub use pool::{create_pool, create_pool_from_url, DatabaseConfig, DatabasePool};
pub use query::composer::{
    apply_filter, apply_includes, apply_order, paginate, Composition, Direction, Filter, OrderBy,
    QueryOptions, Queryable,
};
pub use query::include::{Include, Navigation, RelatedLoader};
pub use query::page::{Page, PagedList};
pub use query::{Query, Tracking};
pub use raw_sql::RawSql;
pub use repository::{Repository, SnapshotReader, TrackedReader};
pub use unit_of_work::UnitOfWork;
