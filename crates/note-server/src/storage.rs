//! SQLite storage handle shared by the session manager, note store and backups.
//!
//! A [`Database`] is created once at startup and handed to each component's
//! constructor. Statement reuse relies on sqlx's per-connection cache, which is
//! keyed by SQL text and sized from configuration.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use thiserror::Error;

/// Current schema version.
pub const SCHEMA_VERSION: i64 = 1;

/// Statements creating the schema. Each is idempotent.
pub const CREATE_TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY
    )",
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        last_login INTEGER
    )",
    // Only the SHA-256 of a token is stored
    "CREATE TABLE IF NOT EXISTS sessions (
        token_hash TEXT PRIMARY KEY NOT NULL,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at INTEGER NOT NULL,
        expires_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at)",
    // seq records insertion order, which is the order notes are listed in
    "CREATE TABLE IF NOT EXISTS notes (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        note_id TEXT NOT NULL,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        title TEXT NOT NULL DEFAULT '',
        content TEXT NOT NULL DEFAULT '',
        type TEXT NOT NULL DEFAULT 'personal' CHECK (type IN ('work', 'personal')),
        urgent INTEGER NOT NULL DEFAULT 0,
        date TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        UNIQUE (user_id, note_id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_notes_user_seq ON notes(user_id, seq)",
];

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{context}: {source}")]
    Sqlx {
        context: String,
        #[source]
        source: sqlx::Error,
    },
}

impl StorageError {
    /// Whether the failure was a UNIQUE constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            StorageError::Sqlx {
                source: sqlx::Error::Database(db),
                ..
            } => db.is_unique_violation(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Adds a context message when converting sqlx errors.
pub(crate) trait SqlxResultExt<T> {
    fn sql_context(self, context: &str) -> Result<T>;
}

impl<T> SqlxResultExt<T> for std::result::Result<T, sqlx::Error> {
    fn sql_context(self, context: &str) -> Result<T> {
        self.map_err(|source| StorageError::Sqlx {
            context: context.to_string(),
            source,
        })
    }
}

/// Pool-scoped handle to the notes database.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database file at `path`.
    pub async fn open(path: &Path, statement_cache_capacity: usize) -> Result<Self> {
        // WAL lets readers keep seeing the last committed note set while a
        // bulk replace is in progress.
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true)
            .statement_cache_capacity(statement_cache_capacity);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .sql_context("Failed to open database")?;

        let db = Self { pool };
        db.initialize().await?;
        tracing::info!("Opened database at {:?}", path);
        Ok(db)
    }

    /// Create a private in-memory database.
    ///
    /// Uses a single pooled connection; the database lives as long as the pool.
    pub async fn in_memory() -> Result<Self> {
        use rand::Rng;
        let name: u64 = rand::rng().random();
        let url = format!("sqlite:file:mem_{name:016x}?mode=memory&cache=shared");
        let options = SqliteConnectOptions::from_str(&url)
            .sql_context("Invalid in-memory database URL")?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .sql_context("Failed to create in-memory database")?;

        let db = Self { pool };
        db.initialize().await?;
        Ok(db)
    }

    async fn initialize(&self) -> Result<()> {
        for statement in CREATE_TABLES {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .sql_context("Failed to create schema")?;
        }
        sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
            .bind(SCHEMA_VERSION)
            .execute(&self.pool)
            .await
            .sql_context("Failed to record schema version")?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Size of the database in bytes.
    pub async fn size_bytes(&self) -> Result<u64> {
        let (size,): (i64,) = sqlx::query_as(
            "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
        )
        .fetch_one(&self.pool)
        .await
        .sql_context("Failed to read database size")?;
        Ok(size.max(0) as u64)
    }

    /// Write a consistent copy of the whole database to `path`.
    pub async fn snapshot_to(&self, path: &Path) -> Result<()> {
        sqlx::query("VACUUM INTO ?")
            .bind(path.to_string_lossy().into_owned())
            .execute(&self.pool)
            .await
            .sql_context("Failed to snapshot database")?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let db = Database::in_memory().await.unwrap();
        db.initialize().await.unwrap();

        let (version,): (i64,) = sqlx::query_as("SELECT MAX(version) FROM schema_version")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_unique_violation_is_detected() {
        let db = Database::in_memory().await.unwrap();
        let insert = "INSERT INTO users (email, password_hash, created_at) VALUES ('a@x.com', 'h', 0)";
        sqlx::query(insert).execute(db.pool()).await.unwrap();
        let err = sqlx::query(insert)
            .execute(db.pool())
            .await
            .sql_context("insert")
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_size_and_snapshot() {
        let db = Database::in_memory().await.unwrap();
        assert!(db.size_bytes().await.unwrap() > 0);

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("copy.db");
        db.snapshot_to(&target).await.unwrap();
        assert!(target.exists());

        let copy = Database::open(&target, 10).await.unwrap();
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM schema_version")
            .fetch_one(copy.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
