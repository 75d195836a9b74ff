//! Ciphertext blob storage.
//!
//! Every object is immutable and named by exactly one [`Locator`].  Locators
//! are prefixed with the backend that minted them; a store treats a locator
//! from another backend as missing.
//!
//! Filesystem layout (`FsBlobStore`):
//!   <root>/blobs/<2-char prefix>/<name>.blob
//!   <root>/staging/<uuid>.staging      (atomic write scratch, cleaned on open)

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::BlobError;

const INLINE_PREFIX: &str = "inline:";
const FS_PREFIX: &str = "fs:";

/// Opaque reference to one stored ciphertext object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    fn body(&self, prefix: &str) -> Option<&str> {
        self.0.strip_prefix(prefix)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Short backend label for logs.
    fn backend(&self) -> &'static str;

    async fn put(&self, bytes: &[u8]) -> Result<Locator, BlobError>;

    async fn get(&self, locator: &Locator) -> Result<Vec<u8>, BlobError>;

    /// Best-effort removal; removing a missing object is not an error.
    async fn remove(&self, locator: &Locator) -> Result<(), BlobError>;
}

// ── Inline ──────────────────────────────────────────────────────────────────

/// The locator is the ciphertext itself, base64-encoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineBlobStore;

#[async_trait]
impl BlobStore for InlineBlobStore {
    fn backend(&self) -> &'static str {
        "inline"
    }

    async fn put(&self, bytes: &[u8]) -> Result<Locator, BlobError> {
        Ok(Locator(format!("{INLINE_PREFIX}{}", URL_SAFE_NO_PAD.encode(bytes))))
    }

    async fn get(&self, locator: &Locator) -> Result<Vec<u8>, BlobError> {
        let body = locator
            .body(INLINE_PREFIX)
            .ok_or_else(|| BlobError::NotFound("not an inline locator".into()))?;
        URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|e| BlobError::Corrupt(format!("undecodable inline locator: {e}")))
    }

    async fn remove(&self, _locator: &Locator) -> Result<(), BlobError> {
        Ok(())
    }
}

// ── Filesystem ──────────────────────────────────────────────────────────────

/// Directory-backed object store standing in for an external blob service.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    blobs_root: PathBuf,
    staging_root: PathBuf,
}

impl FsBlobStore {
    /// Open (or create) a store rooted at `root`.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, BlobError> {
        let root = root.as_ref();
        let blobs_root = root.join("blobs");
        let staging_root = root.join("staging");
        tokio::fs::create_dir_all(&blobs_root).await?;
        tokio::fs::create_dir_all(&staging_root).await?;
        restrict_dir_permissions(root).await;
        cleanup_staging_dir(&staging_root).await;
        Ok(Self {
            blobs_root,
            staging_root,
        })
    }

    fn blob_path(&self, name: &str) -> PathBuf {
        self.blobs_root
            .join(&name[0..2])
            .join(format!("{name}.blob"))
    }

    /// Object names are 32 lowercase hex chars; anything else never names a
    /// file under the root.
    fn parse_name<'a>(&self, locator: &'a Locator) -> Result<&'a str, BlobError> {
        let name = locator
            .body(FS_PREFIX)
            .ok_or_else(|| BlobError::NotFound("not a filesystem locator".into()))?;
        let valid = name.len() == 32
            && name
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !valid {
            return Err(BlobError::NotFound("malformed filesystem locator".into()));
        }
        Ok(name)
    }

    async fn write_blob_atomic(&self, dest: &Path, bytes: &[u8]) -> Result<(), BlobError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let staging_path = self
            .staging_root
            .join(format!("{}.staging", Uuid::new_v4()));
        {
            let mut file = tokio::fs::File::create(&staging_path).await?;
            file.write_all(bytes).await?;
            file.sync_all().await?;
        }
        if let Err(e) = tokio::fs::rename(&staging_path, dest).await {
            let _ = tokio::fs::remove_file(&staging_path).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    fn backend(&self) -> &'static str {
        "fs"
    }

    async fn put(&self, bytes: &[u8]) -> Result<Locator, BlobError> {
        let name = Uuid::new_v4().simple().to_string();
        let dest = self.blob_path(&name);
        self.write_blob_atomic(&dest, bytes).await?;
        debug!(size = bytes.len(), "stored blob");
        Ok(Locator(format!("{FS_PREFIX}{name}")))
    }

    async fn get(&self, locator: &Locator) -> Result<Vec<u8>, BlobError> {
        let name = self.parse_name(locator)?;
        Ok(tokio::fs::read(self.blob_path(name)).await?)
    }

    async fn remove(&self, locator: &Locator) -> Result<(), BlobError> {
        let name = self.parse_name(locator)?;
        match tokio::fs::remove_file(self.blob_path(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

async fn restrict_dir_permissions(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) =
            tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700)).await
        {
            warn!("cannot restrict permissions on {}: {}", path.display(), e);
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}

/// Remove any leftover `.staging` files from a previous crash.
async fn cleanup_staging_dir(staging_root: &Path) {
    let Ok(mut entries) = tokio::fs::read_dir(staging_root).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_name().to_string_lossy().ends_with(".staging") {
            warn!(path = %entry.path().display(), "removing orphaned blob staging file");
            let _ = tokio::fs::remove_file(entry.path()).await;
        }
    }
}
