//! burn_engine — lifecycle of a self-destructing secret
//!
//! A secret is `Created` by [`SecretEngine::create`] and stays retrievable by
//! anyone holding its retrieval key and PIN until the wall clock passes
//! `expires_at`.  Expiry is detected lazily on retrieval; nothing sweeps.
//!
//! # Module layout
//! - `api`        — boundary request/response types
//! - `validation` — TTL window and payload size policy
//! - `engine`     — create / retrieve orchestration
//! - `clock`      — injectable wall clock
//! - `config`     — deployment configuration
//! - `error`      — error taxonomy with stable codes

pub mod api;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod validation;

pub use api::{CreateReceipt, CreateRequest, FilePayload, RetrieveRequest, RetrievedFile, RetrievedSecret};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BlobBackend, BurnConfig, EngineSettings};
pub use engine::SecretEngine;
pub use error::{BurnError, ErrorBody};
