//! SQLite record store via sqlx.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::debug;

use crate::{
    error::StoreError,
    models::{SecretRecord, SecretRow},
    records::SecretRecordStore,
};

/// Central store handle.  Cheap to clone (Arc internally).
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Open (or create) the SQLite database at `db_path`.
    /// Runs all pending migrations automatically.
    ///
    /// WAL journal mode is set on the connection options rather than inside a
    /// migration: SQLite refuses to change `journal_mode` within a transaction
    /// and sqlx wraps each migration in one.
    pub async fn open(db_path: &Path) -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(opts).await?;
        Self::migrate(&pool).await?;
        debug!(path = %db_path.display(), "secret store opened");
        Ok(Self { pool })
    }

    /// Private in-memory database.  A single pooled connection keeps the
    /// database alive for the lifetime of the store.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(pool: &SqlitePool) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))
    }
}

#[async_trait]
impl SecretRecordStore for SqliteRecordStore {
    async fn insert(&self, record: &SecretRecord) -> Result<(), StoreError> {
        record.validate_shape()?;
        sqlx::query(
            r#"
            INSERT INTO secrets (key_digest, pin_digest, payload_kind, encrypted_text,
                                 encrypted_file_locator, encrypted_file_name, created_at, expires_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.key_digest)
        .bind(&record.pin_digest)
        .bind(record.payload_kind.as_str())
        .bind(&record.encrypted_text)
        .bind(record.encrypted_file_locator.as_ref().map(|l| l.as_str()))
        .bind(&record.encrypted_file_name)
        .bind(record.created_at)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                StoreError::Conflict("retrieval key already exists".to_string())
            }
            _ => StoreError::Database(e),
        })?;
        Ok(())
    }

    async fn find_by_key(&self, key_digest: &str) -> Result<Option<SecretRecord>, StoreError> {
        let row: Option<SecretRow> = sqlx::query_as(
            r#"
            SELECT key_digest, pin_digest, payload_kind, encrypted_text,
                   encrypted_file_locator, encrypted_file_name, created_at, expires_at
            FROM secrets
            WHERE key_digest = ?
            "#,
        )
        .bind(key_digest)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SecretRecord::try_from).transpose()
    }
}
