//! In-process record store.  Contents vanish with the process.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{error::StoreError, models::SecretRecord, records::SecretRecordStore};

#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<HashMap<String, SecretRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl SecretRecordStore for MemoryRecordStore {
    async fn insert(&self, record: &SecretRecord) -> Result<(), StoreError> {
        record.validate_shape()?;
        let mut records = self.records.lock();
        if records.contains_key(&record.key_digest) {
            return Err(StoreError::Conflict("retrieval key already exists".into()));
        }
        records.insert(record.key_digest.clone(), record.clone());
        Ok(())
    }

    async fn find_by_key(&self, key_digest: &str) -> Result<Option<SecretRecord>, StoreError> {
        Ok(self.records.lock().get(key_digest).cloned())
    }
}
