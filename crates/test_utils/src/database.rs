//! Database Test Utilities
//!
//! Every [`TestDatabase`] is a fresh SQLite file in its own temporary
//! directory with the task schema applied, so tests never share state.

use std::path::{Path, PathBuf};

use infra_db::{create_pool, DataError, DatabaseConfig, DatabasePool, UnitOfWork};
use tempfile::TempDir;

/// Maximum pooled connections per test database
const TEST_POOL_SIZE: u32 = 4;

/// Name of the database file inside the temporary directory
const DATABASE_FILE: &str = "tasks.db";

/// A migrated SQLite database that is deleted when dropped
pub struct TestDatabase {
    _dir: TempDir,
    path: PathBuf,
    pub pool: DatabasePool,
}

impl TestDatabase {
    /// Creates an empty database with the schema applied
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directory, the pool or the
    /// migrations fail
    pub async fn new() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(DATABASE_FILE);

        let config = DatabaseConfig::new(format!("sqlite://{}", path.display()))
            .max_connections(TEST_POOL_SIZE)
            .min_connections(0)
            .create_if_missing(true);
        let pool = create_pool(config).await?;
        domain_task::migrate(&pool).await?;

        Ok(Self {
            _dir: dir,
            path,
            pool,
        })
    }

    /// Returns a reference to the connection pool
    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Location of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens a new unit of work on this database
    pub async fn unit_of_work(&self) -> Result<UnitOfWork, DataError> {
        UnitOfWork::begin(&self.pool).await
    }

    /// Counts the rows of `table`, bypassing the data layer
    pub async fn count_rows(&self, table: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM \"{table}\""))
            .fetch_one(&self.pool)
            .await
    }

    /// Clears all data from the database while preserving the schema
    pub async fn clear_data(&self) -> Result<(), sqlx::Error> {
        for table in ["tasks", "task_lists"] {
            sqlx::query(&format!("DELETE FROM \"{table}\""))
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }
}

/// Helper macro for running database tests
///
/// Expands to a `#[tokio::test]` that receives a fresh [`TestDatabase`].
#[macro_export]
macro_rules! db_test {
    ($name:ident, |$db:ident| $body:block) => {
        #[tokio::test]
        async fn $name() {
            let $db = $crate::database::TestDatabase::new()
                .await
                .expect("Failed to create test database");
            $body
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_starts_empty_with_schema() {
        let db = TestDatabase::new().await.unwrap();
        assert!(db.path().exists());
        assert_eq!(db.count_rows("tasks").await.unwrap(), 0);
        assert_eq!(db.count_rows("task_lists").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear_data_keeps_schema() {
        let db = TestDatabase::new().await.unwrap();
        sqlx::query("INSERT INTO task_lists (name) VALUES ('Inbox')")
            .execute(db.pool())
            .await
            .unwrap();
        assert_eq!(db.count_rows("task_lists").await.unwrap(), 1);

        db.clear_data().await.unwrap();
        assert_eq!(db.count_rows("task_lists").await.unwrap(), 0);
    }
}
