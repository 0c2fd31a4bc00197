//! Lazy, composable queries over one entity type
//!
//! A [`Query`] records composition steps and only reaches the store when a
//! terminal operation (`to_list`, `first`, `last`, `count`, `any`,
//! `to_paged_list`) is awaited.

pub mod composer;
pub mod include;
pub mod page;

use std::fmt;
use std::sync::Arc;

use crate::context::DbContext;
use crate::entity::Entity;
use crate::error::DataError;

use self::composer::{apply_filter, apply_includes, apply_order, paginate, Composition, Filter, OrderBy, Queryable};
use self::include::Include;
use self::page::PagedList;

/// Whether materialised entities are attached to the change tracker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Tracking {
    #[default]
    Tracked,
    NoTracking,
}

/// A composable query bound to a store context
pub struct Query<T: Entity> {
    context: Arc<DbContext>,
    tracking: Tracking,
    composition: Composition<T>,
}

impl<T: Entity> Query<T> {
    pub(crate) fn new(context: Arc<DbContext>, tracking: Tracking) -> Self {
        Self {
            context,
            tracking,
            composition: Composition::new(),
        }
    }

    pub fn tracking(&self) -> Tracking {
        self.tracking
    }

    pub fn include(self, include: Include<T>) -> Self {
        apply_includes(self, [include])
    }

    pub fn filter(self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        apply_filter(self, Some(Filter::new(predicate)))
    }

    pub fn filter_by(self, filter: Option<Filter<T>>) -> Self {
        apply_filter(self, filter)
    }

    pub fn order_by(self, order: OrderBy<T>) -> Self {
        apply_order(self, order)
    }

    /// Restricts the query to one page; an order key must already be set
    pub fn page(self, page_index: u32, page_size: u32) -> Result<Self, DataError> {
        paginate(self, page_index, page_size)
    }

    /// Returns detached snapshots instead of tracked entities
    pub fn as_no_tracking(mut self) -> Self {
        self.tracking = Tracking::NoTracking;
        self
    }

    pub async fn to_list(self) -> Result<Vec<T>, DataError> {
        let (items, _) = self.context.load(&self.composition, self.tracking).await?;
        Ok(items)
    }

    pub async fn first(self) -> Result<Option<T>, DataError> {
        Ok(self.to_list().await?.into_iter().next())
    }

    /// Last element of the composed sequence
    ///
    /// This materialises the whole sequence and keeps the final element, so
    /// it costs as much as `to_list`.
    pub async fn last(self) -> Result<Option<T>, DataError> {
        Ok(self.to_list().await?.pop())
    }

    pub async fn count(self) -> Result<i64, DataError> {
        let (items, _) = self
            .context
            .load(&self.composition, Tracking::NoTracking)
            .await?;
        Ok(items.len() as i64)
    }

    pub async fn any(self) -> Result<bool, DataError> {
        Ok(self.count().await? > 0)
    }

    /// Materialises the page together with the total number of matches
    ///
    /// # Errors
    ///
    /// `DataError::InvalidArgument` if the query has not been paged
    pub async fn to_paged_list(self) -> Result<PagedList<T>, DataError> {
        let Some(page) = self.composition.page() else {
            return Err(DataError::invalid_argument(
                "to_paged_list requires a paged query",
            ));
        };
        let (items, total) = self.context.load(&self.composition, self.tracking).await?;
        Ok(PagedList::new(items, total as u64, page))
    }
}

impl<T: Entity> Queryable<T> for Query<T> {
    fn composition(&self) -> &Composition<T> {
        &self.composition
    }

    fn composition_mut(&mut self) -> &mut Composition<T> {
        &mut self.composition
    }
}

impl<T: Entity> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            context: Arc::clone(&self.context),
            tracking: self.tracking,
            composition: self.composition.clone(),
        }
    }
}

impl<T: Entity> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("entity", &T::entity_name())
            .field("context_id", &self.context.id())
            .field("tracking", &self.tracking)
            .field("composition", &self.composition)
            .finish()
    }
}
