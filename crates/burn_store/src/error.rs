use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Record conflict: {0}")]
    Conflict(String),

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    #[error("Migration error: {0}")]
    Migration(String),
}

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Transient blob store failure: {0}")]
    Transient(String),

    /// The object exists but its stored form no longer decodes.
    #[error("Corrupt blob: {0}")]
    Corrupt(String),
}

impl From<std::io::Error> for BlobError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => BlobError::NotFound(e.to_string()),
            _ => BlobError::Transient(e.to_string()),
        }
    }
}
