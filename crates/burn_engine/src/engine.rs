//! Secret lifecycle: create and retrieve.
//!
//! Create:   validate → generate key → encrypt → store blob → insert record
//! Retrieve: lookup → verify PIN → check expiry → fetch blob → decrypt
//!
//! The retrieval key handed to the client is the encoded cipher key.  Only its
//! lookup digest is persisted, so stored state alone cannot decrypt anything.

use std::future::Future;
use std::sync::Arc;

use burn_crypto::{aead, hash, CryptoError, PinHasher, SecretKey};
use burn_store::{BlobError, BlobStore, Locator, PayloadKind, SecretRecord, SecretRecordStore, StoreError};
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

use crate::{
    api::{CreateReceipt, CreateRequest, RetrieveRequest, RetrievedFile, RetrievedSecret},
    clock::Clock,
    config::EngineSettings,
    error::BurnError,
    validation::{self, Payload, ValidatedCreate},
};

/// Fresh keys tried before a creation gives up on key collisions.
pub const MAX_KEY_ATTEMPTS: usize = 3;

/// Compared against when no record matches; no PIN digests to all zeros.
const ABSENT_PIN_DIGEST: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Ciphertext produced for one creation attempt.
struct Sealed {
    encrypted_text: Option<String>,
    locator: Option<Locator>,
    encrypted_file_name: Option<String>,
}

pub struct SecretEngine {
    records: Arc<dyn SecretRecordStore>,
    blobs: Arc<dyn BlobStore>,
    hasher: PinHasher,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
}

impl SecretEngine {
    pub fn new(
        records: Arc<dyn SecretRecordStore>,
        blobs: Arc<dyn BlobStore>,
        hasher: PinHasher,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            records,
            blobs,
            hasher,
            clock,
            settings,
        }
    }

    /// A fresh encoded key, unattached to any secret.
    pub fn generate_key() -> String {
        SecretKey::generate().to_encoded()
    }

    pub async fn create(&self, req: CreateRequest) -> Result<CreateReceipt, BurnError> {
        let validated = validation::validate_create(req)?;
        self.with_deadline("create", self.create_validated(validated))
            .await
    }

    pub async fn retrieve(&self, req: RetrieveRequest) -> Result<RetrievedSecret, BurnError> {
        self.with_deadline("retrieve", self.retrieve_inner(req)).await
    }

    // ── Create ───────────────────────────────────────────────────────────────

    async fn create_validated(&self, v: ValidatedCreate) -> Result<CreateReceipt, BurnError> {
        let pin_digest = self.hasher.digest_hex(&v.pin);
        let created_at = self.clock.now();
        let expires_at = created_at + v.ttl;
        let payload_kind = match v.payload {
            Payload::Text(_) => PayloadKind::Text,
            Payload::File(_) => PayloadKind::File,
        };

        for attempt in 1..=MAX_KEY_ATTEMPTS {
            let key = SecretKey::generate();
            let key_digest = hash::lookup_digest(&key);
            let sealed = self.seal(&key, &v.payload).await?;

            let record = SecretRecord {
                key_digest,
                pin_digest: pin_digest.clone(),
                payload_kind,
                encrypted_text: sealed.encrypted_text,
                encrypted_file_locator: sealed.locator,
                encrypted_file_name: sealed.encrypted_file_name,
                created_at,
                expires_at,
            };

            match self.records.insert(&record).await {
                Ok(()) => {
                    info!(
                        secret_id = short_id(&record.key_digest),
                        kind = v.payload.kind(),
                        ttl_minutes = v.ttl.num_minutes(),
                        backend = self.blobs.backend(),
                        "secret created"
                    );
                    return Ok(CreateReceipt {
                        retrieval_key: key.to_encoded(),
                        expires_at,
                    });
                }
                Err(StoreError::Conflict(_)) => {
                    warn!(attempt, "retrieval key collision, regenerating");
                    self.discard(record.encrypted_file_locator.as_ref()).await;
                }
                Err(e) => {
                    self.discard(record.encrypted_file_locator.as_ref()).await;
                    return Err(backend_failure("insert secret record", e));
                }
            }
        }

        error!(attempts = MAX_KEY_ATTEMPTS, "no unique retrieval key could be allocated");
        Err(BurnError::Internal(
            "could not allocate a unique retrieval key".into(),
        ))
    }

    async fn seal(&self, key: &SecretKey, payload: &Payload) -> Result<Sealed, BurnError> {
        match payload {
            Payload::Text(text) => Ok(Sealed {
                encrypted_text: Some(
                    aead::encrypt_to_token(key, text.as_bytes()).map_err(encrypt_failure)?,
                ),
                locator: None,
                encrypted_file_name: None,
            }),
            Payload::File(file) => {
                let ciphertext = aead::encrypt(key, &file.bytes).map_err(encrypt_failure)?;
                let encrypted_file_name = aead::encrypt_to_token(key, file.filename.as_bytes())
                    .map_err(encrypt_failure)?;
                let blobs = &self.blobs;
                let ciphertext: &[u8] = &ciphertext;
                let locator = self
                    .with_blob_retry(move || blobs.put(ciphertext))
                    .await
                    .map_err(|e| backend_failure("store ciphertext blob", e))?;
                Ok(Sealed {
                    encrypted_text: None,
                    locator: Some(locator),
                    encrypted_file_name: Some(encrypted_file_name),
                })
            }
        }
    }

    /// Roll back a blob written by a creation attempt that did not commit.
    async fn discard(&self, locator: Option<&Locator>) {
        if let Some(locator) = locator {
            if let Err(e) = self.blobs.remove(locator).await {
                warn!(error = %e, "failed to remove orphaned blob");
            }
        }
    }

    // ── Retrieve ─────────────────────────────────────────────────────────────

    async fn retrieve_inner(&self, req: RetrieveRequest) -> Result<RetrievedSecret, BurnError> {
        // A key that does not even decode is reported like an unknown one.
        let key = SecretKey::from_encoded(&req.retrieval_key)
            .map_err(|_| BurnError::NotFoundOrInvalid)?;
        let key_digest = hash::lookup_digest(&key);

        let record = self
            .records
            .find_by_key(&key_digest)
            .await
            .map_err(|e| backend_failure("find secret record", e))?;
        let Some(record) = record else {
            // Same PIN work as a mismatch, so an unknown key is not faster.
            let _ = self.hasher.verify_hex(&req.pin, ABSENT_PIN_DIGEST);
            return Err(BurnError::NotFoundOrInvalid);
        };

        if !self.hasher.verify_hex(&req.pin, &record.pin_digest) {
            debug!(secret_id = short_id(&key_digest), "PIN mismatch");
            return Err(BurnError::NotFoundOrInvalid);
        }

        let now = self.clock.now();
        if now > record.expires_at {
            info!(secret_id = short_id(&key_digest), "retrieval after expiry");
            return Err(BurnError::Expired);
        }

        let decrypted_text = match &record.encrypted_text {
            Some(token) => Some(open_text(&key, token)?),
            None => None,
        };

        let decrypted_file = match &record.encrypted_file_locator {
            Some(locator) => {
                let ciphertext = self.fetch_blob(locator).await?;
                let bytes = aead::decrypt(&key, &ciphertext).map_err(decrypt_failure)?;
                let filename = match &record.encrypted_file_name {
                    Some(token) => open_text(&key, token)?.to_string(),
                    None => String::new(),
                };
                Some(RetrievedFile { filename, bytes })
            }
            None => None,
        };

        info!(
            secret_id = short_id(&key_digest),
            kind = record.payload_kind.as_str(),
            "secret retrieved"
        );
        Ok(RetrievedSecret {
            decrypted_text,
            decrypted_file,
            ttl_remaining: record.expires_at - now,
        })
    }

    async fn fetch_blob(&self, locator: &Locator) -> Result<Vec<u8>, BurnError> {
        let blobs = &self.blobs;
        self.with_blob_retry(move || blobs.get(locator))
            .await
            .map_err(|e| match e {
                BlobError::Corrupt(detail) => {
                    warn!(%detail, backend = self.blobs.backend(), "stored ciphertext blob rejected");
                    BurnError::IntegrityError
                }
                e => {
                    warn!(error = %e, backend = self.blobs.backend(), "ciphertext blob unavailable");
                    BurnError::RetrievalFailure
                }
            })
    }

    // ── Helpers ──────────────────────────────────────────────────────────────

    /// Run `op`, retrying `Transient` failures with doubling backoff.
    async fn with_blob_retry<T, F, Fut>(&self, mut op: F) -> Result<T, BlobError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BlobError>>,
    {
        let mut backoff = self.settings.blob_backoff;
        let mut attempt = 0u32;
        loop {
            match op().await {
                Err(BlobError::Transient(detail)) if attempt < self.settings.blob_retries => {
                    attempt += 1;
                    warn!(attempt, %detail, "transient blob failure, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                other => return other,
            }
        }
    }

    async fn with_deadline<T, Fut>(&self, op: &'static str, fut: Fut) -> Result<T, BurnError>
    where
        Fut: Future<Output = Result<T, BurnError>>,
    {
        match tokio::time::timeout(self.settings.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                error!(op, timeout_ms = self.settings.operation_timeout.as_millis() as u64, "operation timed out");
                Err(BurnError::Internal("operation timed out".into()))
            }
        }
    }
}

fn open_text(key: &SecretKey, token: &str) -> Result<Zeroizing<String>, BurnError> {
    let bytes = aead::decrypt_token(key, token).map_err(decrypt_failure)?;
    let text = std::str::from_utf8(&bytes).map_err(|_| {
        warn!("decrypted text is not valid UTF-8");
        BurnError::IntegrityError
    })?;
    Ok(Zeroizing::new(text.to_owned()))
}

fn decrypt_failure(e: CryptoError) -> BurnError {
    warn!(error = %e, "stored ciphertext rejected");
    BurnError::IntegrityError
}

fn encrypt_failure(e: CryptoError) -> BurnError {
    error!(error = %e, "encryption failed");
    BurnError::Internal("encryption failed".into())
}

fn backend_failure(context: &'static str, e: impl std::fmt::Display) -> BurnError {
    error!(context, error = %e, "backend failure");
    BurnError::Internal("storage backend unavailable".into())
}

/// Log handle for a record: a prefix of its lookup digest, never the key.
fn short_id(key_digest: &str) -> &str {
    &key_digest[..key_digest.len().min(8)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use burn_store::{InlineBlobStore, MemoryRecordStore};
    use chrono::{Duration, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn engine_with(records: Arc<dyn SecretRecordStore>, clock: Arc<ManualClock>) -> SecretEngine {
        SecretEngine::new(
            records,
            Arc::new(InlineBlobStore),
            PinHasher::new(),
            clock,
            EngineSettings::default(),
        )
    }

    /// Conflicts on the first `failures` inserts, then delegates.
    struct CollidingStore {
        inner: MemoryRecordStore,
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl SecretRecordStore for CollidingStore {
        async fn insert(&self, record: &SecretRecord) -> Result<(), StoreError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Err(StoreError::Conflict("forced".into()));
            }
            self.inner.insert(record).await
        }

        async fn find_by_key(&self, key_digest: &str) -> Result<Option<SecretRecord>, StoreError> {
            self.inner.find_by_key(key_digest).await
        }
    }

    #[tokio::test]
    async fn text_roundtrip() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let engine = engine_with(Arc::new(MemoryRecordStore::new()), clock);

        let receipt = engine
            .create(CreateRequest::text("2468", 30, "meet at dawn"))
            .await
            .unwrap();
        let secret = engine
            .retrieve(RetrieveRequest::new(&receipt.retrieval_key, "2468"))
            .await
            .unwrap();

        assert_eq!(secret.decrypted_text.as_deref().map(String::as_str), Some("meet at dawn"));
        assert!(secret.decrypted_file.is_none());
        assert_eq!(secret.ttl_remaining, Duration::minutes(30));
    }

    #[tokio::test]
    async fn collisions_are_retried_transparently() {
        let store = Arc::new(CollidingStore {
            inner: MemoryRecordStore::new(),
            failures: MAX_KEY_ATTEMPTS - 1,
            calls: AtomicUsize::new(0),
        });
        let engine = engine_with(store.clone(), Arc::new(ManualClock::new(Utc::now())));

        let receipt = engine
            .create(CreateRequest::text("1", 60, "x"))
            .await
            .unwrap();
        assert_eq!(store.calls.load(Ordering::SeqCst), MAX_KEY_ATTEMPTS);
        assert!(engine
            .retrieve(RetrieveRequest::new(receipt.retrieval_key, "1"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn exhausted_collisions_surface_as_internal() {
        let store = Arc::new(CollidingStore {
            inner: MemoryRecordStore::new(),
            failures: usize::MAX,
            calls: AtomicUsize::new(0),
        });
        let engine = engine_with(store.clone(), Arc::new(ManualClock::new(Utc::now())));

        let err = engine
            .create(CreateRequest::text("1", 60, "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, BurnError::Internal(_)));
        assert!(store.inner.is_empty());
    }

    #[tokio::test]
    async fn malformed_key_is_not_found() {
        let engine = engine_with(
            Arc::new(MemoryRecordStore::new()),
            Arc::new(ManualClock::new(Utc::now())),
        );
        let err = engine
            .retrieve(RetrieveRequest::new("%%% not a key %%%", "1"))
            .await
            .unwrap_err();
        assert!(matches!(err, BurnError::NotFoundOrInvalid));
    }

    #[tokio::test]
    async fn unknown_key_is_not_found_for_any_pin() {
        let engine = engine_with(
            Arc::new(MemoryRecordStore::new()),
            Arc::new(ManualClock::new(Utc::now())),
        );
        for pin in ["", "1", "0000"] {
            let err = engine
                .retrieve(RetrieveRequest::new(SecretEngine::generate_key(), pin))
                .await
                .unwrap_err();
            assert!(matches!(err, BurnError::NotFoundOrInvalid));
        }
    }

    #[test]
    fn absent_digest_is_well_formed_and_matches_nothing() {
        assert_eq!(ABSENT_PIN_DIGEST.len(), 2 * burn_crypto::hash::DIGEST_LEN);
        let hasher = PinHasher::new();
        assert!(!hasher.verify_hex("", ABSENT_PIN_DIGEST));
        assert!(!hasher.verify_hex("1234", ABSENT_PIN_DIGEST));
    }

    #[tokio::test]
    async fn expiry_is_strictly_after_expires_at() {
        let start = Utc::now();
        let clock = Arc::new(ManualClock::new(start));
        let engine = engine_with(Arc::new(MemoryRecordStore::new()), clock.clone());

        let receipt = engine
            .create(CreateRequest::text("9", 30, "tick"))
            .await
            .unwrap();
        assert_eq!(receipt.expires_at, start + Duration::minutes(30));

        clock.set(receipt.expires_at);
        let at_boundary = engine
            .retrieve(RetrieveRequest::new(&receipt.retrieval_key, "9"))
            .await
            .unwrap();
        assert_eq!(at_boundary.ttl_remaining, Duration::zero());

        clock.advance(Duration::seconds(1));
        let err = engine
            .retrieve(RetrieveRequest::new(&receipt.retrieval_key, "9"))
            .await
            .unwrap_err();
        assert!(matches!(err, BurnError::Expired));
    }

    #[test]
    fn generated_keys_are_distinct() {
        assert_ne!(SecretEngine::generate_key(), SecretEngine::generate_key());
    }
}
