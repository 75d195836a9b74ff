use serde::Serialize;
use thiserror::Error;

/// Every failure that crosses the engine boundary.
///
/// Messages are safe to show to clients.  Backend detail is logged where the
/// error is produced and never carried here.
#[derive(Debug, Error)]
pub enum BurnError {
    #[error("{0}")]
    Validation(String),

    /// Unknown key and wrong PIN are deliberately the same error.
    #[error("Secret not found or PIN is invalid")]
    NotFoundOrInvalid,

    #[error("Secret has expired")]
    Expired,

    #[error("Encrypted payload could not be retrieved")]
    RetrievalFailure,

    #[error("Encrypted payload failed its integrity check")]
    IntegrityError,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BurnError {
    pub fn code(&self) -> &'static str {
        match self {
            BurnError::Validation(_) => "validation_error",
            BurnError::NotFoundOrInvalid => "not_found_or_invalid",
            BurnError::Expired => "expired",
            BurnError::RetrievalFailure => "retrieval_failure",
            BurnError::IntegrityError => "integrity_error",
            BurnError::Internal(_) => "internal_error",
        }
    }

    /// HTTP-style status name for transport layers.
    pub fn status(&self) -> &'static str {
        match self {
            BurnError::Validation(_) => "BadRequest",
            BurnError::NotFoundOrInvalid => "NotFound",
            BurnError::Expired => "Gone",
            BurnError::RetrievalFailure => "BadGateway",
            BurnError::IntegrityError | BurnError::Internal(_) => "InternalError",
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
            code: self.code(),
        }
    }
}

/// Wire shape of an error: `{"error": "...", "code": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}
