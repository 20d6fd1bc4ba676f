//! Storage layer for the AnnSuraksha ledger.
//!
//! This module provides database operations for:
//! - Users (registration, trust scores, alert debounce)
//! - Deliveries and complaints (lifecycle and dashboards)
//! - Trust-score history and the blockchain audit log (append-only)
//! - Fair Price Shops, DAO votes and dashboard metric snapshots

use alloy::primitives::{Address, B256};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

pub mod complaints;
pub mod dao;
pub mod deliveries;
pub mod fps;
pub mod logs;
pub mod metrics;
pub mod trust;
pub mod types;
pub mod users;

pub use types::*;

/// How long a connection waits for another writer before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Database storage for the ledger.
///
/// Provides async access to SQLite database with connection pooling.
#[derive(Debug, Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    /// Create a new storage instance with the given database URL.
    ///
    /// This will create the database file if it doesn't exist. Call
    /// [`Storage::run_migrations`] before use.
    ///
    /// # Example
    /// ```no_run
    /// # use annsuraksha_ledger::storage::Storage;
    /// # async fn example() -> anyhow::Result<()> {
    /// let storage = Storage::new("sqlite://annsuraksha.db").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::connect(database_url, 5, 1).await
    }

    /// Create a storage instance with explicit pool bounds.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        info!("Connecting to database: {}", database_url);

        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {}", database_url))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        info!("Database connection established");

        Ok(Self { pool })
    }

    /// Create a new storage instance with a specific file path.
    pub async fn new_with_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let database_url = format!("sqlite://{}", path.display());
        Self::new(&database_url).await
    }

    /// Run database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run migrations")?;

        info!("Migrations completed successfully");

        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        info!("Closing database connection");
        self.pool.close().await;
    }

    /// Delete every row from every table (children first).
    pub async fn clear_all(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for table in [
            "dashboard_metrics",
            "dao_votes",
            "blockchain_logs",
            "trust_scores",
            "complaints",
            "deliveries",
            "fps",
            "users",
        ] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to clear {}", table))?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Get database statistics.
    pub async fn stats(&self) -> Result<DatabaseStats> {
        let count = |table: &'static str| {
            let pool = self.pool.clone();
            async move {
                sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
                    .fetch_one(&pool)
                    .await
                    .with_context(|| format!("Failed to count {}", table))
            }
        };

        Ok(DatabaseStats {
            user_count: count("users").await? as u64,
            delivery_count: count("deliveries").await? as u64,
            complaint_count: count("complaints").await? as u64,
            log_count: count("blockchain_logs").await? as u64,
        })
    }

    /// Check database health.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("Database health check failed")?;

        Ok(())
    }
}

/// Database statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Registered users
    pub user_count: u64,

    /// Logged deliveries
    pub delivery_count: u64,

    /// Filed complaints
    pub complaint_count: u64,

    /// Audit log entries
    pub log_count: u64,
}

pub(crate) fn to_datetime(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .with_context(|| format!("Invalid stored timestamp: {}", secs))
}

pub(crate) fn to_datetime_opt(secs: Option<i64>) -> Result<Option<DateTime<Utc>>> {
    secs.map(to_datetime).transpose()
}

pub(crate) fn to_b256_opt(bytes: Option<Vec<u8>>) -> Result<Option<B256>> {
    bytes
        .map(|b| {
            if b.len() != 32 {
                anyhow::bail!("Invalid stored hash length: {}", b.len());
            }
            Ok(B256::from_slice(&b))
        })
        .transpose()
}

pub(crate) fn to_address_opt(bytes: Option<Vec<u8>>) -> Result<Option<Address>> {
    bytes
        .map(|b| {
            if b.len() != 20 {
                anyhow::bail!("Invalid stored address length: {}", b.len());
            }
            Ok(Address::from_slice(&b))
        })
        .transpose()
}


#[cfg(test)]
mod tests {
    use super::test_support::storage;

    #[tokio::test]
    async fn test_storage_creation() {
        let (storage, _temp_db) = storage().await;
        storage.health_check().await.unwrap();
        storage.close().await;
    }

    #[tokio::test]
    async fn test_database_stats() {
        let (storage, _temp_db) = storage().await;

        let stats = storage.stats().await.unwrap();
        assert_eq!(stats.user_count, 0);
        assert_eq!(stats.delivery_count, 0);
        assert_eq!(stats.complaint_count, 0);
        assert_eq!(stats.log_count, 0);

        storage.close().await;
    }
}
