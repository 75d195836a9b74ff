//! Creation policy: TTL window and payload limits.
//!
//! Validation runs before any key is generated or anything is stored, so a
//! rejected request has no side effects.

use chrono::Duration;

use crate::{
    api::{CreateRequest, FilePayload},
    error::BurnError,
};

pub const MIN_TTL_MINUTES: i64 = 30;
pub const MAX_TTL_MINUTES: i64 = 2880;
pub const MAX_FILE_BYTES: usize = 10 * 1024 * 1024;
pub const MAX_FILENAME_LEN: usize = 255;
const DEFAULT_FILENAME: &str = "secret.bin";

pub enum Payload {
    Text(String),
    File(FilePayload),
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Text(_) => "text",
            Payload::File(_) => "file",
        }
    }
}

/// A create request that passed every policy check.
pub struct ValidatedCreate {
    pub pin: String,
    pub ttl: Duration,
    pub payload: Payload,
}

pub fn validate_create(req: CreateRequest) -> Result<ValidatedCreate, BurnError> {
    if req.pin.is_empty() {
        return Err(invalid("PIN is required."));
    }
    validate_ttl(req.ttl_minutes)?;

    // Empty text counts as absent, the same as an omitted form field.
    let text = req.text.filter(|t| !t.is_empty());
    let payload = match (text, req.file) {
        (Some(_), Some(_)) => return Err(invalid("Provide either text or a file, not both.")),
        (None, None) => return Err(invalid("Text or file is required.")),
        // Only files are size-capped; text has no ceiling.
        (Some(text), None) => Payload::Text(text),
        (None, Some(file)) => Payload::File(validate_file(file)?),
    };

    Ok(ValidatedCreate {
        pin: req.pin,
        ttl: Duration::minutes(req.ttl_minutes),
        payload,
    })
}

pub fn validate_ttl(ttl_minutes: i64) -> Result<(), BurnError> {
    if !(MIN_TTL_MINUTES..=MAX_TTL_MINUTES).contains(&ttl_minutes) {
        return Err(invalid(&format!(
            "Expiry time must be between {MIN_TTL_MINUTES} and {MAX_TTL_MINUTES} minutes."
        )));
    }
    Ok(())
}

fn validate_file(mut file: FilePayload) -> Result<FilePayload, BurnError> {
    if file.bytes.len() > MAX_FILE_BYTES {
        return Err(invalid("File size exceeds the 10MB limit."));
    }
    if file.filename.len() > MAX_FILENAME_LEN {
        return Err(invalid("File name is too long."));
    }
    if file.filename.trim().is_empty() {
        file.filename = DEFAULT_FILENAME.to_string();
    }
    Ok(file)
}

fn invalid(reason: &str) -> BurnError {
    BurnError::Validation(reason.to_string())
}
