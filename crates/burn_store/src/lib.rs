//! burn_store — persistence for Darklock Burn
//!
//! Two collaborators, both passive (no business logic):
//! - [`SecretRecordStore`]: one row per secret, looked up by the digest of its
//!   retrieval key.  SQLite via sqlx in production, an in-process map for tests
//!   and throwaway deployments.
//! - [`BlobStore`]: ciphertext objects behind an opaque [`Locator`].  Inline
//!   (locator carries the bytes) or filesystem-backed.
//!
//! # Migration
//! SQLx migrations in `migrations/` are run on open.

pub mod blob;
pub mod db;
pub mod error;
pub mod memory;
pub mod models;
pub mod records;

pub use blob::{BlobStore, FsBlobStore, InlineBlobStore, Locator};
pub use db::SqliteRecordStore;
pub use error::{BlobError, StoreError};
pub use memory::MemoryRecordStore;
pub use models::{PayloadKind, SecretRecord};
pub use records::SecretRecordStore;
