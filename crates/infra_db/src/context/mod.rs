//! Store context
//!
//! A [`DbContext`] owns one pooled connection and one change tracker for its
//! whole lifetime. Reads go through that connection; staged changes are
//! written by [`DbContext::save_changes`] inside a single transaction on the
//! same connection, so raw SQL and repository reads always observe the same
//! session.
//!
//! The context is not meant to be driven from several tasks at once. The
//! internal locks only keep it memory safe if that happens; they do not
//! order concurrent callers.

pub(crate) mod tracker;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use sqlx::pool::PoolConnection;
use sqlx::sqlite::SqliteRow;
use sqlx::{Connection, FromRow, Row, Sqlite, SqliteConnection};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cancel::CancellationToken;
use crate::entity::{Entity, EntityKey, Value};
use crate::error::DataError;
use crate::pool::DatabasePool;
use crate::query::composer::Composition;
use crate::query::include::{Include, RelatedLoader};
use crate::query::Tracking;
use crate::raw_sql::RawSql;
use crate::statement;

use self::tracker::{ChangeTracker, WriteCommand, WriteKind};

pub use self::tracker::EntityState;

/// Runs `sql` with `values` bound in order and decodes every row
pub(crate) async fn fetch_rows<R>(
    connection: &mut SqliteConnection,
    sql: &str,
    values: Vec<Value>,
) -> Result<Vec<R>, DataError>
where
    R: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    let query = values
        .into_iter()
        .fold(sqlx::query(sql), |query, value| value.bind_to(query));
    let rows = query.fetch_all(&mut *connection).await?;
    let decoded = rows
        .iter()
        .map(|row| R::from_row(row))
        .collect::<Result<Vec<R>, sqlx::Error>>()?;
    Ok(decoded)
}

struct Written {
    rows: u64,
    generated: Option<Value>,
}

async fn execute(connection: &mut SqliteConnection, command: &WriteCommand) -> Result<Written, DataError> {
    let query = command
        .values
        .iter()
        .cloned()
        .fold(sqlx::query(&command.sql), |query, value| value.bind_to(query));

    if command.returns_key {
        let row = query.fetch_one(&mut *connection).await?;
        let key: i64 = row.try_get(0)?;
        return Ok(Written {
            rows: 1,
            generated: Some(Value::Integer(key)),
        });
    }

    let result = query.execute(&mut *connection).await?;
    if result.rows_affected() == 0 && command.kind != WriteKind::Insert {
        return Err(DataError::ConcurrencyConflict {
            entity: command.entity,
            key: command.key.clone(),
        });
    }
    Ok(Written {
        rows: result.rows_affected(),
        generated: None,
    })
}

/// One session with the store: a connection plus a change tracker
pub struct DbContext {
    id: Uuid,
    connection: AsyncMutex<Option<PoolConnection<Sqlite>>>,
    tracker: Mutex<ChangeTracker>,
    disposed: AtomicBool,
}

impl DbContext {
    /// Acquires a connection from `pool` for the lifetime of the context
    ///
    /// # Errors
    ///
    /// `DataError::InvalidArgument` if the pool has been closed, or the store
    /// error raised while acquiring.
    pub async fn open(pool: &DatabasePool) -> Result<Self, DataError> {
        if pool.is_closed() {
            return Err(DataError::invalid_argument(
                "cannot open a context on a closed pool",
            ));
        }
        let connection = pool.acquire().await?;
        let id = Uuid::now_v7();
        debug!(context_id = %id, "Store context opened");

        Ok(Self {
            id,
            connection: AsyncMutex::new(Some(connection)),
            tracker: Mutex::new(ChangeTracker::new()),
            disposed: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), DataError> {
        if self.is_disposed() {
            return Err(DataError::Disposed);
        }
        Ok(())
    }

    pub(crate) fn tracker(&self) -> Result<MutexGuard<'_, ChangeTracker>, DataError> {
        self.ensure_open()?;
        Ok(self.tracker.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Returns true if any tracked entity has staged changes
    pub fn has_changes(&self) -> bool {
        self.tracker()
            .map(|tracker| tracker.has_changes())
            .unwrap_or(false)
    }

    /// Materialises a composed query
    ///
    /// Rows are read from the entity table, includes are loaded, then the
    /// composition filters, orders and pages the rows. Returns the page and
    /// the number of rows that matched before paging. Tracked reads resolve
    /// only the returned rows, and their related entities, through the
    /// change tracker after evaluation, so filters always see stored values.
    pub(crate) async fn load<T: Entity>(
        &self,
        composition: &Composition<T>,
        tracking: Tracking,
    ) -> Result<(Vec<T>, usize), DataError> {
        self.ensure_open()?;
        let mut guard = self.connection.lock().await;
        let connection = guard.as_mut().ok_or(DataError::Disposed)?;

        let mut rows: Vec<T> =
            fetch_rows(&mut **connection, &statement::select_all(T::TABLE), Vec::new()).await?;
        load_includes(&mut **connection, composition.includes(), &mut rows).await?;

        let (mut items, total) = composition.evaluate(rows);
        if tracking == Tracking::Tracked {
            let loader = RelatedLoader::new(&mut **connection, Some(&self.tracker));
            items = items
                .into_iter()
                .map(|mut loaded| {
                    let mut tracked = self.tracker()?.attach(loaded.clone());
                    for include in composition.includes() {
                        include.track(&loader, &mut loaded, &mut tracked);
                    }
                    Ok(tracked)
                })
                .collect::<Result<Vec<T>, DataError>>()?;
        }

        debug!(
            context_id = %self.id,
            entity = T::entity_name(),
            rows = items.len(),
            matched = total,
            ?tracking,
            "Query executed"
        );
        Ok((items, total))
    }

    /// Point lookup by primary key
    ///
    /// A tracked lookup returns the tracked instance without a round trip
    /// when the entity is already known to this context.
    pub(crate) async fn find<T: Entity>(
        &self,
        key: &T::Key,
        tracking: Tracking,
    ) -> Result<Option<T>, DataError> {
        if tracking == Tracking::Tracked {
            let tracked = self.tracker()?.tracked::<T>(key);
            if tracked.is_some() {
                return Ok(tracked);
            }
        }

        self.ensure_open()?;
        let mut guard = self.connection.lock().await;
        let connection = guard.as_mut().ok_or(DataError::Disposed)?;
        let sql = statement::select_by_key(T::TABLE, T::KEY_COLUMN);
        let row: Option<T> = fetch_rows(&mut **connection, &sql, vec![key.to_value()])
            .await?
            .into_iter()
            .next();

        match (row, tracking) {
            (Some(row), Tracking::Tracked) => Ok(Some(self.tracker()?.attach(row))),
            (row, _) => Ok(row),
        }
    }

    /// Runs a validated raw query on the context connection; results are not
    /// tracked
    pub(crate) async fn raw_query<R>(&self, raw: RawSql) -> Result<Vec<R>, DataError>
    where
        R: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        raw.validate()?;
        self.ensure_open()?;
        let mut guard = self.connection.lock().await;
        let connection = guard.as_mut().ok_or(DataError::Disposed)?;
        debug!(context_id = %self.id, sql = raw.sql(), "Executing raw query");
        let sql = raw.sql();
        fetch_rows(&mut **connection, sql, raw.into_values()).await
    }

    /// Writes every staged change in one transaction
    ///
    /// Statements run in the order their entities were first staged. Returns
    /// the number of rows affected. On any failure, including cancellation,
    /// the transaction is rolled back and the tracker keeps its staged state.
    ///
    /// # Errors
    ///
    /// - `DataError::Cancelled` if `cancel` fires before the commit
    /// - `DataError::ConcurrencyConflict` if an update or delete matched no row
    /// - `DataError::Store` for any failure reported by the store
    #[tracing::instrument(skip(self, cancel), fields(context_id = %self.id))]
    pub async fn save_changes(&self, cancel: Option<&CancellationToken>) -> Result<u64, DataError> {
        self.persist(None, cancel).await
    }

    /// Writes the staged changes of the listed entries only
    pub(crate) async fn save_entries(&self, entries: &[u64]) -> Result<u64, DataError> {
        self.persist(Some(entries), None).await
    }

    async fn persist(
        &self,
        only: Option<&[u64]>,
        cancel: Option<&CancellationToken>,
    ) -> Result<u64, DataError> {
        self.ensure_open()?;
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            warn!(context_id = %self.id, "Save cancelled before start");
            return Err(DataError::Cancelled);
        }

        let commands = self.tracker()?.pending(only);
        if commands.is_empty() {
            debug!(context_id = %self.id, "No staged changes to save");
            return Ok(0);
        }

        let mut guard = self.connection.lock().await;
        let connection = guard.as_mut().ok_or(DataError::Disposed)?;
        let mut tx = Connection::begin(&mut **connection).await?;

        let mut affected = 0u64;
        let mut generated = HashMap::new();
        for command in &commands {
            let outcome = match cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => None,
                    result = execute(&mut *tx, command) => Some(result),
                },
                None => Some(execute(&mut *tx, command).await),
            };

            let written = match outcome {
                Some(Ok(written)) => written,
                Some(Err(err)) => {
                    if let Err(rollback) = tx.rollback().await {
                        warn!(context_id = %self.id, error = %rollback, "Rollback failed");
                    }
                    return Err(err);
                }
                None => {
                    tx.rollback().await?;
                    warn!(context_id = %self.id, "Save cancelled, transaction rolled back");
                    return Err(DataError::Cancelled);
                }
            };

            affected += written.rows;
            if let Some(key) = written.generated {
                generated.insert(command.entry, key);
            }
        }

        tx.commit().await?;
        let committed: Vec<u64> = commands.iter().map(|command| command.entry).collect();
        self.tracker()?.accept(&committed, generated);

        info!(
            context_id = %self.id,
            statements = commands.len(),
            rows = affected,
            "Changes saved"
        );
        Ok(affected)
    }

    /// Releases the connection and forgets all tracked entities
    ///
    /// Any later operation on this context, or on a repository bound to it,
    /// fails with `DataError::Disposed`.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Ok(mut connection) = self.connection.try_lock() {
            *connection = None;
        }
        let mut tracker = self.tracker.lock().unwrap_or_else(PoisonError::into_inner);
        let forgotten = tracker.len();
        tracker.clear();
        debug!(context_id = %self.id, forgotten, "Store context disposed");
    }
}

async fn load_includes<T: Entity>(
    connection: &mut SqliteConnection,
    includes: &[Include<T>],
    parents: &mut [T],
) -> Result<(), DataError> {
    if includes.is_empty() {
        return Ok(());
    }
    let mut loader = RelatedLoader::new(connection, None);
    for include in includes {
        include.load(&mut loader, parents).await?;
    }
    Ok(())
}

impl std::fmt::Debug for DbContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbContext")
            .field("id", &self.id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
