//! Include paths: eager loading of related entities
//!
//! An [`Include`] names a navigation from a parent entity to related data and
//! knows how to load it for a batch of parents with one query per chunk of
//! keys. Paths are independent of each other; the order in which they are
//! attached does not change the result.

use async_trait::async_trait;
use sqlx::SqliteConnection;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::context::tracker::ChangeTracker;
use crate::context::fetch_rows;
use crate::entity::{Entity, EntityKey, Value};
use crate::error::DataError;
use crate::statement;

/// Upper bound on bound values per `IN (...)` query
const MAX_KEYS_PER_QUERY: usize = 500;

/// A navigation that can populate related data on a batch of parents
#[async_trait]
pub trait Navigation<T: Entity>: Send + Sync {
    /// Name of the navigation, e.g. `"tasks"`
    fn path(&self) -> &str;

    /// Loads the related data and attaches it to `parents`
    async fn load(&self, loader: &mut RelatedLoader<'_>, parents: &mut [T]) -> Result<(), DataError>;

    /// Moves the related data loaded on `loaded` over to `tracked`, the
    /// tracked instance of the same entity, resolving each related entity
    /// through [`RelatedLoader::attach`]
    fn track(&self, loader: &RelatedLoader<'_>, loaded: &mut T, tracked: &mut T);
}

/// Access to the store for navigations, bound to the context's connection
pub struct RelatedLoader<'c> {
    connection: &'c mut SqliteConnection,
    tracker: Option<&'c Mutex<ChangeTracker>>,
}

impl<'c> RelatedLoader<'c> {
    pub(crate) fn new(
        connection: &'c mut SqliteConnection,
        tracker: Option<&'c Mutex<ChangeTracker>>,
    ) -> Self {
        Self { connection, tracker }
    }

    /// Loads every `C` whose `column` equals one of `values`; the rows are
    /// not tracked
    pub async fn fetch_where_in<C: Entity>(
        &mut self,
        column: &str,
        values: Vec<Value>,
    ) -> Result<Vec<C>, DataError> {
        let mut distinct: Vec<Value> = Vec::with_capacity(values.len());
        for value in values {
            if !value.is_null() && !distinct.contains(&value) {
                distinct.push(value);
            }
        }

        let mut related = Vec::new();
        for chunk in distinct.chunks(MAX_KEYS_PER_QUERY) {
            let sql = statement::select_where_in(C::TABLE, column, chunk.len());
            let rows: Vec<C> = fetch_rows(&mut *self.connection, &sql, chunk.to_vec()).await?;
            related.extend(rows);
        }

        Ok(related)
    }

    /// Resolves `row` through the change tracker of a tracked query;
    /// untracked queries get `row` back unchanged
    pub fn attach<C: Entity>(&self, row: C) -> C {
        match self.tracker {
            Some(tracker) => tracker
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .attach(row),
            None => row,
        }
    }
}

/// A declared eager load of related data for `T`
pub struct Include<T: Entity> {
    navigation: Arc<dyn Navigation<T>>,
}

impl<T: Entity> Include<T> {
    /// Wraps a custom navigation
    pub fn new(navigation: impl Navigation<T> + 'static) -> Self {
        Self {
            navigation: Arc::new(navigation),
        }
    }

    /// Collection navigation: every `C` whose `foreign_key` column holds the
    /// parent's key, stored in the collection `related` points at
    pub fn has_many<C: Entity>(
        path: &'static str,
        foreign_key: &'static str,
        related: fn(&mut T) -> &mut Vec<C>,
    ) -> Self {
        Self::new(HasMany {
            path,
            foreign_key,
            related,
        })
    }

    /// Single-reference navigation: the `C` whose key the parent points at,
    /// stored in the slot `related` points at
    pub fn belongs_to<C: Entity>(
        path: &'static str,
        foreign_key: fn(&T) -> Option<C::Key>,
        related: fn(&mut T) -> &mut Option<C>,
    ) -> Self {
        Self::new(BelongsTo {
            path,
            foreign_key,
            related,
        })
    }

    pub fn path(&self) -> &str {
        self.navigation.path()
    }

    pub(crate) async fn load(
        &self,
        loader: &mut RelatedLoader<'_>,
        parents: &mut [T],
    ) -> Result<(), DataError> {
        if parents.is_empty() {
            return Ok(());
        }
        self.navigation.load(loader, parents).await
    }

    pub(crate) fn track(&self, loader: &RelatedLoader<'_>, loaded: &mut T, tracked: &mut T) {
        self.navigation.track(loader, loaded, tracked);
    }
}

impl<T: Entity> Clone for Include<T> {
    fn clone(&self) -> Self {
        Self {
            navigation: Arc::clone(&self.navigation),
        }
    }
}

impl<T: Entity> fmt::Debug for Include<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Include").field(&self.path()).finish()
    }
}

struct HasMany<P, C> {
    path: &'static str,
    foreign_key: &'static str,
    related: fn(&mut P) -> &mut Vec<C>,
}

#[async_trait]
impl<P: Entity, C: Entity> Navigation<P> for HasMany<P, C> {
    fn path(&self) -> &str {
        self.path
    }

    async fn load(&self, loader: &mut RelatedLoader<'_>, parents: &mut [P]) -> Result<(), DataError> {
        let keys = parents
            .iter()
            .filter_map(|parent| parent.key())
            .map(|key| key.to_value())
            .collect();
        let children: Vec<C> = loader.fetch_where_in(self.foreign_key, keys).await?;

        for parent in parents.iter_mut() {
            let Some(key) = parent.key().map(|key| key.to_value()) else {
                continue;
            };
            *(self.related)(parent) = children
                .iter()
                .filter(|child| child.value(self.foreign_key) == key)
                .cloned()
                .collect();
        }
        Ok(())
    }

    fn track(&self, loader: &RelatedLoader<'_>, loaded: &mut P, tracked: &mut P) {
        let children = std::mem::take((self.related)(loaded));
        *(self.related)(tracked) = children
            .into_iter()
            .map(|child| loader.attach(child))
            .collect();
    }
}

struct BelongsTo<P: Entity, C: Entity> {
    path: &'static str,
    foreign_key: fn(&P) -> Option<C::Key>,
    related: fn(&mut P) -> &mut Option<C>,
}

#[async_trait]
impl<P: Entity, C: Entity> Navigation<P> for BelongsTo<P, C> {
    fn path(&self) -> &str {
        self.path
    }

    async fn load(&self, loader: &mut RelatedLoader<'_>, parents: &mut [P]) -> Result<(), DataError> {
        let keys = parents
            .iter()
            .filter_map(|parent| (self.foreign_key)(parent))
            .map(|key| key.to_value())
            .collect();
        let targets: Vec<C> = loader.fetch_where_in(C::KEY_COLUMN, keys).await?;

        for parent in parents.iter_mut() {
            let target = (self.foreign_key)(parent).and_then(|key| {
                targets
                    .iter()
                    .find(|candidate| candidate.key().as_ref() == Some(&key))
                    .cloned()
            });
            *(self.related)(parent) = target;
        }
        Ok(())
    }

    fn track(&self, loader: &RelatedLoader<'_>, loaded: &mut P, tracked: &mut P) {
        let target = (self.related)(loaded).take();
        *(self.related)(tracked) = target.map(|target| loader.attach(target));
    }
}
