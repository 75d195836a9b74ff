//! burn_crypto — Darklock Burn cryptographic primitives
//!
//! # Design principles
//! - NO custom crypto; all primitives come from audited Rust crates.
//! - Zeroize all secret material on drop.
//! - Keys travel as opaque newtypes with redacted `Debug`.
//!
//! # Module layout
//! - `aead`  — per-secret XChaCha20-Poly1305 keys, encrypt/decrypt, printable tokens
//! - `hash`  — BLAKE3 PIN digests and retrieval-key lookup digests
//! - `error` — unified error type

pub mod aead;
pub mod error;
pub mod hash;

pub use aead::SecretKey;
pub use error::CryptoError;
pub use hash::PinHasher;
