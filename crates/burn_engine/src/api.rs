//! Boundary types for create / retrieve.
//!
//! Anything holding a PIN, key or plaintext has a redacting `Debug`.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use zeroize::Zeroizing;

#[derive(Clone)]
pub struct FilePayload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for FilePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilePayload")
            .field("filename", &self.filename)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Submission of a new secret.  Exactly one of `text` / `file` must be set.
#[derive(Clone, Default)]
pub struct CreateRequest {
    pub pin: String,
    pub ttl_minutes: i64,
    pub text: Option<String>,
    pub file: Option<FilePayload>,
}

impl CreateRequest {
    pub fn text(pin: impl Into<String>, ttl_minutes: i64, text: impl Into<String>) -> Self {
        Self {
            pin: pin.into(),
            ttl_minutes,
            text: Some(text.into()),
            file: None,
        }
    }

    pub fn file(
        pin: impl Into<String>,
        ttl_minutes: i64,
        filename: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            pin: pin.into(),
            ttl_minutes,
            text: None,
            file: Some(FilePayload {
                filename: filename.into(),
                bytes,
            }),
        }
    }
}

impl fmt::Debug for CreateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateRequest")
            .field("ttl_minutes", &self.ttl_minutes)
            .field("has_text", &self.text.is_some())
            .field("file", &self.file)
            .finish_non_exhaustive()
    }
}

/// Returned once on creation.  The retrieval key is never shown again.
#[derive(Clone, Serialize)]
pub struct CreateReceipt {
    pub retrieval_key: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for CreateReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateReceipt")
            .field("retrieval_key", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Clone)]
pub struct RetrieveRequest {
    pub retrieval_key: String,
    pub pin: String,
}

impl RetrieveRequest {
    pub fn new(retrieval_key: impl Into<String>, pin: impl Into<String>) -> Self {
        Self {
            retrieval_key: retrieval_key.into(),
            pin: pin.into(),
        }
    }
}

pub struct RetrievedFile {
    pub filename: String,
    pub bytes: Zeroizing<Vec<u8>>,
}

pub struct RetrievedSecret {
    pub decrypted_text: Option<Zeroizing<String>>,
    pub decrypted_file: Option<RetrievedFile>,
    pub ttl_remaining: Duration,
}

impl RetrievedSecret {
    pub fn ttl_remaining_secs(&self) -> i64 {
        self.ttl_remaining.num_seconds()
    }
}

impl fmt::Debug for RetrievedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrievedSecret")
            .field("has_text", &self.decrypted_text.is_some())
            .field(
                "file_size",
                &self.decrypted_file.as_ref().map(|file| file.bytes.len()),
            )
            .field("ttl_remaining_secs", &self.ttl_remaining_secs())
            .finish()
    }
}
