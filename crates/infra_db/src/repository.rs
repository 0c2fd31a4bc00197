//! Generic repository
//!
//! A [`Repository<T>`] is a thin façade over one [`DbContext`]: reads are
//! composed through [`Query`], writes are staged on the context's change
//! tracker and only reach the store when the owning unit of work completes.
//! Store failures are returned to the caller untouched.
//!
//! Reads come in two capability flavours so the tracking mode is explicit at
//! the call site:
//!
//! - [`TrackedReader`]: results are attached to the change tracker
//! - [`SnapshotReader`]: results are detached copies

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::FromRow;
use tracing::debug;

use crate::context::{DbContext, EntityState};
use crate::entity::Entity;
use crate::error::DataError;
use crate::query::composer::{Filter, OrderBy, QueryOptions};
use crate::query::include::Include;
use crate::query::page::PagedList;
use crate::query::{Query, Tracking};
use crate::raw_sql::RawSql;

/// Reads whose results are tracked for later persistence
#[async_trait]
pub trait TrackedReader<T: Entity>: Send + Sync {
    /// A tracked query to compose further
    fn query(&self) -> Query<T>;

    /// Point lookup by primary key
    async fn get(&self, id: &T::Key) -> Result<Option<T>, DataError>;

    /// First entity matching `predicate`
    async fn get_where<F>(&self, predicate: F) -> Result<Option<T>, DataError>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.query().filter(predicate).first().await
    }

    async fn get_first_or_default(
        &self,
        filter: Option<Filter<T>>,
        includes: Vec<Include<T>>,
    ) -> Result<Option<T>, DataError> {
        includes
            .into_iter()
            .fold(self.query(), Query::include)
            .filter_by(filter)
            .first()
            .await
    }

    /// Last matching entity
    ///
    /// Materialises every match and keeps the final one, which is O(n) in
    /// the number of matches.
    async fn get_last_or_default(
        &self,
        filter: Option<Filter<T>>,
        includes: Vec<Include<T>>,
    ) -> Result<Option<T>, DataError> {
        includes
            .into_iter()
            .fold(self.query(), Query::include)
            .filter_by(filter)
            .last()
            .await
    }

    async fn get_all(&self) -> Result<Vec<T>, DataError> {
        self.query().to_list().await
    }

    async fn find<F>(&self, predicate: F) -> Result<Vec<T>, DataError>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.query().filter(predicate).to_list().await
    }

    /// Bulk read driven by [`QueryOptions`]
    async fn filter(&self, options: QueryOptions<T>) -> Result<Vec<T>, DataError> {
        options.apply(self.query())?.to_list().await
    }

    /// One ordered page as a query, not yet executed
    fn get_page(
        &self,
        page_index: u32,
        page_size: u32,
        order: OrderBy<T>,
        filter: Option<Filter<T>>,
        includes: Vec<Include<T>>,
    ) -> Result<Query<T>, DataError> {
        let mut options = QueryOptions::new().order_by(order).page(page_index, page_size);
        if let Some(filter) = filter {
            options = options.filter(filter);
        }
        let options = includes.into_iter().fold(options, QueryOptions::include);
        options.apply(self.query())
    }

    /// One ordered page together with the total number of matches
    async fn get_paged_list(
        &self,
        page_index: u32,
        page_size: u32,
        order: OrderBy<T>,
        filter: Option<Filter<T>>,
        includes: Vec<Include<T>>,
    ) -> Result<PagedList<T>, DataError> {
        self.get_page(page_index, page_size, order, filter, includes)?
            .to_paged_list()
            .await
    }
}

/// Reads that return detached copies
#[async_trait]
pub trait SnapshotReader<T: Entity>: Send + Sync {
    /// An untracked query to compose further
    fn query_no_tracking(&self) -> Query<T>;

    async fn get_no_tracking(&self, id: &T::Key) -> Result<Option<T>, DataError>;

    async fn get_all_no_tracking(&self) -> Result<Vec<T>, DataError> {
        self.query_no_tracking().to_list().await
    }

    async fn find_no_tracking<F>(&self, predicate: F) -> Result<Vec<T>, DataError>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.query_no_tracking().filter(predicate).to_list().await
    }
}

/// Per-entity-type façade over one store context
pub struct Repository<T: Entity> {
    context: Arc<DbContext>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> Repository<T> {
    pub fn new(context: Arc<DbContext>) -> Self {
        Self {
            context,
            _entity: PhantomData,
        }
    }

    pub fn context(&self) -> &Arc<DbContext> {
        &self.context
    }

    /// Returns true if any stored entity matches `predicate`
    pub async fn exist<F>(&self, predicate: F) -> Result<bool, DataError>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.query_no_tracking().filter(predicate).any().await
    }

    pub async fn count(&self, filter: Option<Filter<T>>) -> Result<i64, DataError> {
        self.query_no_tracking().filter_by(filter).count().await
    }

    pub async fn any(
        &self,
        filter: Option<Filter<T>>,
        includes: Vec<Include<T>>,
    ) -> Result<bool, DataError> {
        includes
            .into_iter()
            .fold(self.query_no_tracking(), Query::include)
            .filter_by(filter)
            .any()
            .await
    }

    /// Stages an insert
    pub fn add(&self, entity: T) -> Result<(), DataError> {
        self.context.tracker()?.add(entity)?;
        debug!(context_id = %self.context.id(), entity = T::entity_name(), "Staged insert");
        Ok(())
    }

    /// Stages a batch of inserts; if any entity is rejected none are staged
    pub fn add_range(&self, entities: impl IntoIterator<Item = T>) -> Result<(), DataError> {
        let staged = self
            .context
            .tracker()?
            .add_range(entities.into_iter().collect())?;
        debug!(
            context_id = %self.context.id(),
            entity = T::entity_name(),
            count = staged.len(),
            "Staged inserts"
        );
        Ok(())
    }

    /// Stages an update of every column
    pub fn update(&self, entity: T) -> Result<(), DataError> {
        self.context.tracker()?.update(entity)?;
        debug!(context_id = %self.context.id(), entity = T::entity_name(), "Staged update");
        Ok(())
    }

    /// Stages updates for a batch; if any entity is rejected none are staged
    pub fn update_range(&self, entities: impl IntoIterator<Item = T>) -> Result<(), DataError> {
        let count = self
            .context
            .tracker()?
            .update_range(entities.into_iter().collect())?;
        debug!(context_id = %self.context.id(), entity = T::entity_name(), count, "Staged updates");
        Ok(())
    }

    /// Stages a delete
    pub fn remove(&self, entity: &T) -> Result<(), DataError> {
        self.context.tracker()?.remove(entity)?;
        debug!(context_id = %self.context.id(), entity = T::entity_name(), "Staged delete");
        Ok(())
    }

    /// Stages deletes for a batch; if any entity is rejected none are staged
    pub fn remove_range<'a>(&self, entities: impl IntoIterator<Item = &'a T>) -> Result<(), DataError> {
        let count = self.context.tracker()?.remove_range(entities)?;
        debug!(context_id = %self.context.id(), entity = T::entity_name(), count, "Staged deletes");
        Ok(())
    }

    /// Inserts `entity` right away and returns its key
    ///
    /// Only this entity is written; changes staged elsewhere on the context
    /// stay staged and are not part of this commit. If the insert fails the
    /// entity is not left staged.
    pub async fn add_and_return_id(&self, entity: T) -> Result<T::Key, DataError> {
        let (entry, checkpoint) = {
            let mut tracker = self.context.tracker()?;
            let checkpoint = tracker.checkpoint(&entity);
            (tracker.add(entity)?, checkpoint)
        };
        if let Err(err) = self.context.save_entries(&[entry]).await {
            if let Ok(mut tracker) = self.context.tracker() {
                tracker.restore(checkpoint, Some(entry));
            }
            return Err(err);
        }
        let key = self.context.tracker()?.current_key::<T>(entry);
        key.ok_or_else(|| {
            DataError::Transaction(format!("no key was assigned to {}", T::entity_name()))
        })
    }

    /// Persists only the named columns of `entity`, then stops tracking it
    ///
    /// Other columns keep their stored values and other staged changes on
    /// the context are left alone. On failure the entity is tracked exactly
    /// as it was before the call.
    pub async fn save_changes(&self, entity: T, columns: &[&'static str]) -> Result<u64, DataError> {
        let snapshot = entity.clone();
        let (entry, checkpoint) = {
            let mut tracker = self.context.tracker()?;
            let checkpoint = tracker.checkpoint(&entity);
            (tracker.mark_modified(entity, columns)?, checkpoint)
        };
        let rows = match self.context.save_entries(&[entry]).await {
            Ok(rows) => rows,
            Err(err) => {
                if let Ok(mut tracker) = self.context.tracker() {
                    tracker.restore(checkpoint, Some(entry));
                }
                return Err(err);
            }
        };
        self.context.tracker()?.detach(&snapshot);
        debug!(
            context_id = %self.context.id(),
            entity = T::entity_name(),
            columns = ?columns,
            rows,
            "Saved partial update"
        );
        Ok(rows)
    }

    /// Runs a parameterised query on the shared context and maps every row
    pub async fn execute_sql_query<R>(&self, raw: RawSql) -> Result<Vec<R>, DataError>
    where
        R: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        self.context.raw_query(raw).await
    }

    /// Like [`Repository::execute_sql_query`] but keeps only the first row
    pub async fn execute_sql_query_single<R>(&self, raw: RawSql) -> Result<Option<R>, DataError>
    where
        R: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        Ok(self.context.raw_query(raw).await?.into_iter().next())
    }

    /// Stops tracking `entity` without deleting it
    pub fn detach(&self, entity: &T) -> Result<bool, DataError> {
        Ok(self.context.tracker()?.detach(entity))
    }

    /// Tracking state of `entity` in this context, if tracked
    pub fn state_of(&self, entity: &T) -> Result<Option<EntityState>, DataError> {
        Ok(self.context.tracker()?.state_of(entity))
    }
}

#[async_trait]
impl<T: Entity> TrackedReader<T> for Repository<T> {
    fn query(&self) -> Query<T> {
        Query::new(Arc::clone(&self.context), Tracking::Tracked)
    }

    async fn get(&self, id: &T::Key) -> Result<Option<T>, DataError> {
        self.context.find(id, Tracking::Tracked).await
    }
}

#[async_trait]
impl<T: Entity> SnapshotReader<T> for Repository<T> {
    fn query_no_tracking(&self) -> Query<T> {
        Query::new(Arc::clone(&self.context), Tracking::NoTracking)
    }

    async fn get_no_tracking(&self, id: &T::Key) -> Result<Option<T>, DataError> {
        self.context.find(id, Tracking::NoTracking).await
    }
}

impl<T: Entity> fmt::Debug for Repository<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("entity", &T::entity_name())
            .field("context_id", &self.context.id())
            .finish()
    }
}
