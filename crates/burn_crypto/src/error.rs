use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("AEAD encryption failed")]
    AeadEncrypt,

    #[error("AEAD decryption failed (authentication tag mismatch — possible tampering)")]
    AuthenticationFailure,

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Invalid key material: {0}")]
    InvalidKey(String),
}
