//! Database connection pool management
//!
//! This module provides connection pool configuration and creation for the
//! SQLite store using SQLx. Every unit of work checks one connection out of
//! this pool and holds it until it is disposed.

use serde::Deserialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::error::DataError;

/// Type alias for the SQLite connection pool
pub type DatabasePool = SqlitePool;

/// Prefix of the environment variables read by [`DatabaseConfig::from_env`]
pub const ENV_PREFIX: &str = "DATABASE";

/// Configuration options for the database connection pool
///
/// # Example
///
/// ```rust
/// use infra_db::DatabaseConfig;
/// use std::time::Duration;
///
/// let config = DatabaseConfig::new("sqlite://tasks.db")
///     .max_connections(20)
///     .min_connections(5)
///     .acquire_timeout(Duration::from_secs(10));
/// assert_eq!(config.max_connections, 20);
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// SQLite connection string
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// How long a unit of work waits for a free connection
    pub acquire_timeout: Duration,
    /// Maximum lifetime of a connection
    pub max_lifetime: Duration,
    /// Idle timeout before closing a connection
    pub idle_timeout: Duration,
    /// How long SQLite waits on a locked database before failing
    pub busy_timeout: Duration,
    /// Create the database file when it does not exist
    pub create_if_missing: bool,
}

/// Flat, environment-friendly form of [`DatabaseConfig`]
#[derive(Debug, Deserialize)]
struct DatabaseSettings {
    url: String,
    #[serde(default = "default_max_connections")]
    max_connections: u32,
    #[serde(default = "default_min_connections")]
    min_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    acquire_timeout_secs: u64,
    #[serde(default = "default_max_lifetime_secs")]
    max_lifetime_secs: u64,
    #[serde(default = "default_idle_timeout_secs")]
    idle_timeout_secs: u64,
    #[serde(default = "default_busy_timeout_ms")]
    busy_timeout_ms: u64,
    #[serde(default = "default_create_if_missing")]
    create_if_missing: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_acquire_timeout_secs() -> u64 {
    30
}

fn default_max_lifetime_secs() -> u64 {
    30 * 60
}

fn default_idle_timeout_secs() -> u64 {
    10 * 60
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_create_if_missing() -> bool {
    true
}

impl From<DatabaseSettings> for DatabaseConfig {
    fn from(settings: DatabaseSettings) -> Self {
        Self {
            url: settings.url,
            max_connections: settings.max_connections,
            min_connections: settings.min_connections,
            acquire_timeout: Duration::from_secs(settings.acquire_timeout_secs),
            max_lifetime: Duration::from_secs(settings.max_lifetime_secs),
            idle_timeout: Duration::from_secs(settings.idle_timeout_secs),
            busy_timeout: Duration::from_millis(settings.busy_timeout_ms),
            create_if_missing: settings.create_if_missing,
        }
    }
}

impl DatabaseConfig {
    /// Creates a new database configuration with the given connection URL
    ///
    /// # Arguments
    ///
    /// * `url` - SQLite connection string (e.g., "sqlite://tasks.db")
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            acquire_timeout: Duration::from_secs(default_acquire_timeout_secs()),
            max_lifetime: Duration::from_secs(default_max_lifetime_secs()),
            idle_timeout: Duration::from_secs(default_idle_timeout_secs()),
            busy_timeout: Duration::from_millis(default_busy_timeout_ms()),
            create_if_missing: default_create_if_missing(),
        }
    }

    /// Loads configuration from `DATABASE_*` environment variables
    ///
    /// A `.env` file in the working directory is read first when present.
    /// `DATABASE_URL` is required; every other setting has a default.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
    }

    /// Loads configuration from any `config` source
    pub fn from_source<S>(source: S) -> Result<Self, config::ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let settings: DatabaseSettings = config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;
        Ok(settings.into())
    }

    /// Sets the maximum number of connections in the pool
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections to maintain
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets how long to wait for a free connection (default: 30s)
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Sets the maximum lifetime of a connection (default: 30 min)
    pub fn max_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_lifetime = lifetime;
        self
    }

    /// Sets the idle timeout before closing a connection (default: 10 min)
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the SQLite busy timeout (default: 5s)
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets whether a missing database file is created
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new("sqlite://tasks.db")
    }
}

/// Creates a database connection pool with the given configuration
///
/// Foreign keys are enforced and the journal runs in WAL mode so readers in
/// one scope do not block a commit in another.
///
/// # Errors
///
/// Returns `DataError::ConnectionFailed` if the URL is malformed or the pool
/// cannot be created
pub async fn create_pool(config: DatabaseConfig) -> Result<DatabasePool, DataError> {
    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Creating database pool"
    );

    let options = SqliteConnectOptions::from_str(&config.url)
        .map_err(|e| DataError::ConnectionFailed(e.to_string()))?
        .create_if_missing(config.create_if_missing)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(config.busy_timeout);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .max_lifetime(config.max_lifetime)
        .idle_timeout(config.idle_timeout)
        .connect_with(options)
        .await
        .map_err(|e| DataError::ConnectionFailed(e.to_string()))?;

    info!("Database pool created successfully");
    Ok(pool)
}

/// Creates a connection pool from a URL string with default settings
pub async fn create_pool_from_url(url: &str) -> Result<DatabasePool, DataError> {
    create_pool(DatabaseConfig::new(url)).await
}
