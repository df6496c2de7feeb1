//! SQLite persistence
//!
//! One database file holds the usage ledger's key-value rows and the saved
//! conversations. The schema is a single idempotent script applied on every
//! open, so there is no migration history table.

use anyhow::{Context, Result};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::ConnectOptions;
use std::path::Path;
use tracing::{debug, info};

pub mod kv;
pub mod records;

pub use kv::SqliteStore;
pub use records::SessionRecordRepository;

const SCHEMA: &str = include_str!("../../migrations/001_initial.sql");

/// Haven's on-disk state
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database at `db_path` and apply the schema
    ///
    /// The parent directory is created when missing. A WAL left behind by an
    /// unclean shutdown is replayed by SQLite on open.
    pub async fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .disable_statement_logging();

        // The CLI runs one conversation at a time
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;

        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .context("Failed to apply schema")?;

        info!("Database ready at {}", db_path.display());
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Checkpoint the WAL into the main file
    pub async fn flush_wal(&self) -> Result<()> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await
            .context("Failed to flush WAL")?;

        debug!("WAL checkpointed");
        Ok(())
    }

    /// Flush pending writes and close every pooled connection
    pub async fn close(self) -> Result<()> {
        self.flush_wal().await?;
        self.pool.close().await;

        debug!("Database closed");
        Ok(())
    }

    /// Usage-ledger storage over the `kv_store` table
    pub fn kv_store(&self) -> SqliteStore {
        SqliteStore::new(self.pool.clone())
    }

    /// Saved conversations over the `session_records` table
    pub fn records(&self) -> SessionRecordRepository {
        SessionRecordRepository::new(self.pool.clone())
    }
}
