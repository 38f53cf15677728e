//! Database connection pool management
//!
//! This module provides connection pool setup for the SQLite store using SQLx,
//! plus the embedded schema migrations.

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

/// Default database file
pub const DEFAULT_DATABASE_PATH: &str = "warden.db";

/// Database configuration
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file
    pub database_path: String,
    /// Keep the whole database in memory (tests, ephemeral runs)
    pub in_memory: bool,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// How long a writer waits on a locked database before failing
    pub busy_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            database_path: DEFAULT_DATABASE_PATH.to_string(),
            in_memory: false,
            max_connections: 10,
            connect_timeout_secs: 30,
            busy_timeout_secs: 5,
        }
    }
}

impl DbConfig {
    /// Create config for a database file
    pub fn new(database_path: impl Into<String>) -> Self {
        Self {
            database_path: database_path.into(),
            ..Default::default()
        }
    }

    /// In-memory database. Every connection to `:memory:` opens a fresh
    /// database, so the pool is pinned to a single long-lived connection.
    pub fn in_memory() -> Self {
        Self {
            database_path: ":memory:".to_string(),
            in_memory: true,
            max_connections: 1,
            ..Default::default()
        }
    }

    /// Set max connections
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set connection timeout
    pub fn connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    fn connect_options(&self) -> Result<SqliteConnectOptions, sqlx::Error> {
        let options = if self.in_memory {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else {
            SqliteConnectOptions::new()
                .filename(&self.database_path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        };

        Ok(options
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(self.busy_timeout_secs)))
    }
}

/// Database errors
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Failed to connect to database: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Failed to run migrations: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
}

/// Create a new database connection pool
pub async fn create_pool(config: &DbConfig) -> Result<SqlitePool, DbError> {
    let mut options = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs));

    if config.in_memory {
        options = options
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }

    let pool = options.connect_with(config.connect_options()?).await?;

    Ok(pool)
}

/// Create pool and run migrations
pub async fn create_pool_with_migrations(config: &DbConfig) -> Result<SqlitePool, DbError> {
    let pool = create_pool(config).await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::info!(path = %config.database_path, "Database migrations applied");

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DbConfig::default();
        assert_eq!(config.database_path, DEFAULT_DATABASE_PATH);
        assert_eq!(config.max_connections, 10);
        assert!(!config.in_memory);
    }

    #[test]
    fn test_in_memory_config_pins_single_connection() {
        let config = DbConfig::in_memory();
        assert!(config.in_memory);
        assert_eq!(config.max_connections, 1);
    }

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("/tmp/auth.db")
            .max_connections(4)
            .connect_timeout(5);

        assert_eq!(config.database_path, "/tmp/auth.db");
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.connect_timeout_secs, 5);
    }

    #[tokio::test]
    async fn test_in_memory_pool_runs_migrations() {
        let pool = create_pool_with_migrations(&DbConfig::in_memory())
            .await
            .unwrap();

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM accounts")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 0);
    }
}
