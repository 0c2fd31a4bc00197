//! Unit of work
//!
//! One [`UnitOfWork`] per logical operation scope. It owns a store context,
//! hands out one cached [`Repository`] per entity type, and commits every
//! staged change of every repository in a single transaction.
//!
//! # Example
//!
//! ```rust,ignore
//! let uow = UnitOfWork::begin(&pool).await?;
//! let tasks = uow.repository::<Task>()?;
//! tasks.add(task)?;
//! uow.complete().await?;
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};
use uuid::Uuid;

use crate::cancel::CancellationToken;
use crate::context::DbContext;
use crate::entity::Entity;
use crate::error::DataError;
use crate::pool::DatabasePool;
use crate::repository::Repository;

type RepositoryCache = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

/// Transaction boundary shared by the repositories it creates
pub struct UnitOfWork {
    context: Arc<DbContext>,
    repositories: Mutex<RepositoryCache>,
}

impl UnitOfWork {
    /// Opens a fresh store context on `pool`
    pub async fn begin(pool: &DatabasePool) -> Result<Self, DataError> {
        let context = DbContext::open(pool).await?;
        Ok(Self::with_context(Arc::new(context)))
    }

    /// Takes ownership of an already open context
    pub fn with_context(context: Arc<DbContext>) -> Self {
        debug!(context_id = %context.id(), "Unit of work started");
        Self {
            context,
            repositories: Mutex::new(HashMap::new()),
        }
    }

    pub fn context(&self) -> &Arc<DbContext> {
        &self.context
    }

    pub fn context_id(&self) -> Uuid {
        self.context.id()
    }

    /// The repository for `T`
    ///
    /// The first call creates it; every later call on this unit of work
    /// returns the same instance.
    ///
    /// # Errors
    ///
    /// `DataError::Disposed` after [`UnitOfWork::dispose`]
    pub fn repository<T: Entity>(&self) -> Result<Arc<Repository<T>>, DataError> {
        if self.context.is_disposed() {
            return Err(DataError::Disposed);
        }
        let mut repositories = self
            .repositories
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let type_id = TypeId::of::<T>();
        if let Some(existing) = repositories.get(&type_id) {
            if let Ok(repository) = Arc::clone(existing).downcast::<Repository<T>>() {
                return Ok(repository);
            }
        }

        let repository = Arc::new(Repository::<T>::new(Arc::clone(&self.context)));
        repositories.insert(type_id, repository.clone());
        debug!(
            context_id = %self.context.id(),
            entity = T::entity_name(),
            "Repository created"
        );
        Ok(repository)
    }

    /// Persists every staged change in one transaction
    ///
    /// Returns whether at least one row was affected.
    pub async fn complete(&self) -> Result<bool, DataError> {
        let rows = self.context.save_changes(None).await?;
        Ok(rows > 0)
    }

    /// Like [`UnitOfWork::complete`], aborting with `DataError::Cancelled`
    /// and a full rollback if `cancel` fires before the commit
    pub async fn complete_with(&self, cancel: &CancellationToken) -> Result<bool, DataError> {
        let rows = self.context.save_changes(Some(cancel)).await?;
        Ok(rows > 0)
    }

    pub fn has_changes(&self) -> bool {
        self.context.has_changes()
    }

    /// Releases the store context; repositories obtained from this unit of
    /// work fail with `DataError::Disposed` from now on
    pub fn dispose(&self) {
        if self.context.is_disposed() {
            return;
        }
        self.context.dispose();
        self.repositories
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        info!(context_id = %self.context.id(), "Unit of work disposed");
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}
