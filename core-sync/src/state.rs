//! # Sync State Store
//!
//! Persists the outcome of the most recent transfer attempt per source file.
//!
//! ## Overview
//!
//! One row per absolute source path in the `sync_history` table. Every write
//! is a single `INSERT OR REPLACE`, so a record is replaced rather than
//! appended and an interrupted run leaves each row consistent.
//!
//! The SQLite implementation opens a fresh connection for every operation;
//! nothing holds a transaction across the run.

use crate::{Result, SyncError};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::{Connection, FromRow, SqliteConnection};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

// ============================================================================
// Record Types
// ============================================================================

/// Outcome stored for a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    Synced,
    Failed,
}

impl RecordStatus {
    /// Get the string representation for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Synced => "synced",
            RecordStatus::Failed => "failed",
        }
    }
}

impl FromStr for RecordStatus {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "synced" => Ok(RecordStatus::Synced),
            "failed" => Ok(RecordStatus::Failed),
            _ => Err(SyncError::InvalidStatus(s.to_string())),
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted outcome of the latest transfer attempt for one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRecord {
    pub file_path: String,
    pub fingerprint: String,
    pub size_bytes: u64,
    /// Unix timestamp (seconds)
    pub last_synced_at: i64,
    pub status: RecordStatus,
}

// ============================================================================
// Store Trait
// ============================================================================

/// Persistence for [`SyncRecord`]s, keyed by source file path
#[async_trait]
pub trait SyncStateStore: Send + Sync {
    /// Create the table and index if they do not exist
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created
    async fn initialize(&self) -> Result<()>;

    /// Find the record for a source path
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    async fn get(&self, file_path: &str) -> Result<Option<SyncRecord>>;

    /// Insert or replace the record for `record.file_path`
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    async fn upsert(&self, record: &SyncRecord) -> Result<()>;

    /// Number of stored records
    async fn count(&self) -> Result<u64>;

    /// All records ordered by path
    async fn list(&self) -> Result<Vec<SyncRecord>>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of [`SyncStateStore`]
pub struct SqliteSyncStateStore {
    db_path: PathBuf,
}

impl SqliteSyncStateStore {
    /// Create a store backed by the SQLite file at `db_path`.
    ///
    /// Nothing is opened until the first operation.
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    async fn connect(&self) -> Result<SqliteConnection> {
        let options = SqliteConnectOptions::new()
            .filename(&self.db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        SqliteConnection::connect_with(&options)
            .await
            .map_err(|e| SyncError::Database(e.to_string()))
    }
}

/// Database row representation of a sync record
#[derive(Debug, FromRow)]
struct SyncRecordRow {
    file_path: String,
    file_hash: String,
    file_size: i64,
    last_synced: i64,
    sync_status: String,
}

impl TryFrom<SyncRecordRow> for SyncRecord {
    type Error = SyncError;

    fn try_from(row: SyncRecordRow) -> Result<Self> {
        Ok(SyncRecord {
            file_path: row.file_path,
            fingerprint: row.file_hash,
            size_bytes: u64::try_from(row.file_size)
                .map_err(|_| SyncError::Database(format!("Invalid file_size: {}", row.file_size)))?,
            last_synced_at: row.last_synced,
            status: row.sync_status.parse()?,
        })
    }
}

#[async_trait]
impl SyncStateStore for SqliteSyncStateStore {
    async fn initialize(&self) -> Result<()> {
        if let Some(parent) = self.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut conn = self.connect().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sync_history (
                file_path TEXT PRIMARY KEY NOT NULL,
                file_hash TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                last_synced INTEGER NOT NULL,
                sync_status TEXT NOT NULL
            )
            "#,
        )
        .execute(&mut conn)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_file_path ON sync_history(file_path)")
            .execute(&mut conn)
            .await
            .map_err(|e| SyncError::Database(e.to_string()))?;

        conn.close()
            .await
            .map_err(|e| SyncError::Database(e.to_string()))
    }

    async fn get(&self, file_path: &str) -> Result<Option<SyncRecord>> {
        let mut conn = self.connect().await?;

        let row = sqlx::query_as::<_, SyncRecordRow>(
            r#"
            SELECT file_path, file_hash, file_size, last_synced, sync_status
            FROM sync_history
            WHERE file_path = ?
            "#,
        )
        .bind(file_path)
        .fetch_optional(&mut conn)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        conn.close()
            .await
            .map_err(|e| SyncError::Database(e.to_string()))?;

        row.map(SyncRecord::try_from).transpose()
    }

    async fn upsert(&self, record: &SyncRecord) -> Result<()> {
        let size = i64::try_from(record.size_bytes)
            .map_err(|_| SyncError::Database(format!("File too large: {}", record.size_bytes)))?;

        let mut conn = self.connect().await?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO sync_history
                (file_path, file_hash, file_size, last_synced, sync_status)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.file_path)
        .bind(&record.fingerprint)
        .bind(size)
        .bind(record.last_synced_at)
        .bind(record.status.as_str())
        .execute(&mut conn)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        conn.close()
            .await
            .map_err(|e| SyncError::Database(e.to_string()))
    }

    async fn count(&self) -> Result<u64> {
        let mut conn = self.connect().await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_history")
            .fetch_one(&mut conn)
            .await
            .map_err(|e| SyncError::Database(e.to_string()))?;

        conn.close()
            .await
            .map_err(|e| SyncError::Database(e.to_string()))?;

        Ok(count.max(0) as u64)
    }

    async fn list(&self) -> Result<Vec<SyncRecord>> {
        let mut conn = self.connect().await?;

        let rows = sqlx::query_as::<_, SyncRecordRow>(
            r#"
            SELECT file_path, file_hash, file_size, last_synced, sync_status
            FROM sync_history
            ORDER BY file_path
            "#,
        )
        .fetch_all(&mut conn)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        conn.close()
            .await
            .map_err(|e| SyncError::Database(e.to_string()))?;

        rows.into_iter().map(SyncRecord::try_from).collect()
    }
}
