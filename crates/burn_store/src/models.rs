//! Secret record model and its SQL row mapping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{blob::Locator, error::StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    Text,
    File,
}

impl PayloadKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PayloadKind::Text => "text",
            PayloadKind::File => "file",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(PayloadKind::Text),
            "file" => Some(PayloadKind::File),
            _ => None,
        }
    }
}

/// The persisted unit.  Exactly one of `encrypted_text` /
/// `encrypted_file_locator` is set, matching `payload_kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretRecord {
    /// Hex BLAKE3 lookup digest of the retrieval key (unique).
    pub key_digest: String,
    /// Hex digest of the PIN.
    pub pin_digest: String,
    pub payload_kind: PayloadKind,
    /// Ciphertext token, text payloads only.
    pub encrypted_text: Option<String>,
    /// Blob locator of the ciphertext, file payloads only.
    pub encrypted_file_locator: Option<Locator>,
    /// Ciphertext token of the original filename, file payloads only.
    pub encrypted_file_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SecretRecord {
    /// Check the text/file exclusivity invariant.
    pub fn validate_shape(&self) -> Result<(), StoreError> {
        let ok = match self.payload_kind {
            PayloadKind::Text => {
                self.encrypted_text.is_some() && self.encrypted_file_locator.is_none()
            }
            PayloadKind::File => {
                self.encrypted_file_locator.is_some() && self.encrypted_text.is_none()
            }
        };
        if !ok {
            return Err(StoreError::CorruptRecord(format!(
                "payload columns do not match kind '{}'",
                self.payload_kind.as_str()
            )));
        }
        if self.expires_at <= self.created_at {
            return Err(StoreError::CorruptRecord(
                "expires_at must be after created_at".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SecretRow {
    pub key_digest: String,
    pub pin_digest: String,
    pub payload_kind: String, // "text" / "file"
    pub encrypted_text: Option<String>,
    pub encrypted_file_locator: Option<String>,
    pub encrypted_file_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TryFrom<SecretRow> for SecretRecord {
    type Error = StoreError;

    fn try_from(row: SecretRow) -> Result<Self, Self::Error> {
        let payload_kind = PayloadKind::parse(&row.payload_kind).ok_or_else(|| {
            StoreError::CorruptRecord(format!("unknown payload kind '{}'", row.payload_kind))
        })?;
        let record = SecretRecord {
            key_digest: row.key_digest,
            pin_digest: row.pin_digest,
            payload_kind,
            encrypted_text: row.encrypted_text,
            encrypted_file_locator: row.encrypted_file_locator.map(Locator::new),
            encrypted_file_name: row.encrypted_file_name,
            created_at: row.created_at,
            expires_at: row.expires_at,
        };
        record.validate_shape()?;
        Ok(record)
    }
}
