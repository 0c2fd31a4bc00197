//! Table layout for tasks and task lists

use infra_db::{DataError, DatabasePool};
use sqlx::migrate::Migrator;

/// Embedded migrations under `migrations/`
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Brings the database schema up to date
pub async fn migrate(pool: &DatabasePool) -> Result<(), DataError> {
    MIGRATOR
        .run(pool)
        .await
        .map_err(|err| DataError::Store(err.into()))
}
