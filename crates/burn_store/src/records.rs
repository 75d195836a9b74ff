use async_trait::async_trait;

use crate::{error::StoreError, models::SecretRecord};

/// Passive persistence for secret records.
///
/// Implementations must make `insert` atomic with respect to the uniqueness
/// of `key_digest`: two concurrent inserts of the same digest yield exactly one
/// success and one [`StoreError::Conflict`].
#[async_trait]
pub trait SecretRecordStore: Send + Sync {
    async fn insert(&self, record: &SecretRecord) -> Result<(), StoreError>;

    /// Exact match on the lookup digest.
    async fn find_by_key(&self, key_digest: &str) -> Result<Option<SecretRecord>, StoreError>;
}
