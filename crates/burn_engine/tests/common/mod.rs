#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use burn_crypto::PinHasher;
use burn_engine::{EngineSettings, ManualClock, SecretEngine};
use burn_store::{
    BlobError, BlobStore, FsBlobStore, Locator, SecretRecord, SecretRecordStore,
    SqliteRecordStore, StoreError,
};
use chrono::Utc;
use tempfile::TempDir;

pub fn fast_settings() -> EngineSettings {
    EngineSettings {
        operation_timeout: Duration::from_secs(5),
        blob_retries: 1,
        blob_backoff: Duration::from_millis(5),
    }
}

/// Engine over SQLite + filesystem blobs in a temp dir.
pub struct Harness {
    pub dir: TempDir,
    pub engine: Arc<SecretEngine>,
    pub records: SqliteRecordStore,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let records = SqliteRecordStore::open(&dir.path().join("burn.db"))
            .await
            .expect("open store");
        let blobs = FsBlobStore::open(dir.path().join("blobs"))
            .await
            .expect("open blobs");
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let engine = SecretEngine::new(
            Arc::new(records.clone()),
            Arc::new(blobs),
            PinHasher::with_pepper(b"test-pepper"),
            clock.clone(),
            fast_settings(),
        );
        Self {
            dir,
            engine: Arc::new(engine),
            records,
            clock,
        }
    }

    pub fn blob_files(&self) -> Vec<PathBuf> {
        let mut out = Vec::new();
        collect_blobs(&self.dir.path().join("blobs").join("blobs"), &mut out);
        out
    }
}

fn collect_blobs(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_blobs(&path, out);
        } else if path.extension().is_some_and(|ext| ext == "blob") {
            out.push(path);
        }
    }
}

/// Blob store with scripted failures.
#[derive(Default)]
pub struct ScriptedBlobStore {
    pub inner: burn_store::InlineBlobStore,
    pub transient_gets: AtomicUsize,
    pub transient_puts: AtomicUsize,
    pub missing: AtomicBool,
    pub put_delay: Option<Duration>,
    pub gets: AtomicUsize,
    pub removes: AtomicUsize,
}

#[async_trait]
impl BlobStore for ScriptedBlobStore {
    fn backend(&self) -> &'static str {
        "scripted"
    }

    async fn put(&self, bytes: &[u8]) -> Result<Locator, BlobError> {
        if let Some(delay) = self.put_delay {
            tokio::time::sleep(delay).await;
        }
        if take(&self.transient_puts) {
            return Err(BlobError::Transient("connection reset".into()));
        }
        self.inner.put(bytes).await
    }

    async fn get(&self, locator: &Locator) -> Result<Vec<u8>, BlobError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.missing.load(Ordering::SeqCst) {
            return Err(BlobError::NotFound("evicted".into()));
        }
        if take(&self.transient_gets) {
            return Err(BlobError::Transient("connection reset".into()));
        }
        self.inner.get(locator).await
    }

    async fn remove(&self, locator: &Locator) -> Result<(), BlobError> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        self.inner.remove(locator).await
    }
}

fn take(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Record store whose reads flip one character of the stored text token and
/// put a non-base64 character into an inline file locator.
pub struct TamperingStore<S> {
    pub inner: S,
}

#[async_trait]
impl<S: SecretRecordStore> SecretRecordStore for TamperingStore<S> {
    async fn insert(&self, record: &SecretRecord) -> Result<(), StoreError> {
        self.inner.insert(record).await
    }

    async fn find_by_key(&self, key_digest: &str) -> Result<Option<SecretRecord>, StoreError> {
        let mut record = self.inner.find_by_key(key_digest).await?;
        if let Some(token) = record.as_mut().and_then(|r| r.encrypted_text.as_mut()) {
            let mut chars: Vec<char> = token.chars().collect();
            chars[10] = if chars[10] == 'A' { 'B' } else { 'A' };
            *token = chars.into_iter().collect();
        }
        if let Some(locator) = record.as_mut().and_then(|r| r.encrypted_file_locator.as_mut()) {
            if let Some(body) = locator.as_str().strip_prefix("inline:") {
                let mut chars: Vec<char> = body.chars().collect();
                chars[4] = '@';
                let body: String = chars.into_iter().collect();
                *locator = Locator::new(format!("inline:{body}"));
            }
        }
        Ok(record)
    }
}

/// Record store that always fails writes.
pub struct BrokenStore;

#[async_trait]
impl SecretRecordStore for BrokenStore {
    async fn insert(&self, _record: &SecretRecord) -> Result<(), StoreError> {
        Err(StoreError::Migration("disk I/O error at /var/lib/burn/burn.db".into()))
    }

    async fn find_by_key(&self, _key_digest: &str) -> Result<Option<SecretRecord>, StoreError> {
        Err(StoreError::Migration("disk I/O error at /var/lib/burn/burn.db".into()))
    }
}
