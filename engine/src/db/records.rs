//! Saved conversation persistence
//!
//! The message center keeps every saved chat as one row. Messages are stored
//! as a JSON array; rows are never updated after insertion. `saved_at` is
//! kept as nanoseconds since the epoch so a record reads back unchanged.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sdk::{Message, SessionRecord, SummaryText};
use sqlx::{Row, SqlitePool};
use tracing::debug;

/// Repository for saved session records
pub struct SessionRecordRepository {
    pool: SqlitePool,
}

impl SessionRecordRepository {
    /// Create a new session record repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a record
    ///
    /// Saving the same session twice is rejected by the primary key.
    pub async fn save(&self, record: &SessionRecord) -> Result<()> {
        let saved_at = record
            .saved_at
            .timestamp_nanos_opt()
            .context("saved_at is outside the storable range")?;
        let messages =
            serde_json::to_string(&record.messages).context("Failed to encode messages")?;

        sqlx::query(
            "INSERT INTO session_records (session_id, messages, summary, saved_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&record.session_id)
        .bind(messages)
        .bind(record.summary.as_str())
        .bind(saved_at)
        .execute(&self.pool)
        .await
        .context("Failed to save session record")?;

        debug!(
            "Saved session record: session_id={}, messages={}",
            record.session_id,
            record.messages.len()
        );
        Ok(())
    }

    /// Fetch a record by session ID
    pub async fn get(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let row = sqlx::query(
            "SELECT session_id, messages, summary, saved_at FROM session_records WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch session record")?;

        row.map(|row| Self::row_to_record(&row)).transpose()
    }

    /// Most recently saved records first
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<SessionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT session_id, messages, summary, saved_at
            FROM session_records
            ORDER BY saved_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list session records")?;

        rows.iter().map(Self::row_to_record).collect()
    }

    /// Total number of saved records
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM session_records")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count session records")?;

        Ok(count)
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<SessionRecord> {
        let messages: String = row.get("messages");
        let messages: Vec<Message> =
            serde_json::from_str(&messages).context("Failed to decode stored messages")?;

        let saved_at = DateTime::<Utc>::from_timestamp_nanos(row.get::<i64, _>("saved_at"));

        Ok(SessionRecord {
            session_id: row.get("session_id"),
            messages,
            summary: SummaryText::new(row.get::<String, _>("summary")),
            saved_at,
        })
    }
}
