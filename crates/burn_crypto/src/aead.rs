//! Per-secret authenticated encryption
//!
//! Uses XChaCha20-Poly1305 (192-bit nonce).
//! Key size: 32 bytes.  Nonce: 24 bytes (random).  Tag: 16 bytes.
//!
//! Ciphertext wire format:
//!   [ version (1 byte) | nonce (24 bytes) | ciphertext + tag ]
//!
//! Tokens are the wire format encoded as URL-safe base64 without padding,
//! which keeps them printable for JSON transport and database TEXT columns.

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng as AeadOsRng, Payload},
    Key, XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::CryptoError;

pub const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;
const FORMAT_VERSION: u8 = 0x01;
const AAD: &[u8] = b"dl-burn-secret-v1";

/// 32-byte per-secret key. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; KEY_LEN]);

impl SecretKey {
    /// Fresh key from the OS CSPRNG (256 bits of entropy).
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut key);
        Self(key)
    }

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Printable form handed to clients as the retrieval key.
    pub fn to_encoded(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }

    pub fn from_encoded(encoded: &str) -> Result<Self, CryptoError> {
        let raw = Zeroizing::new(
            URL_SAFE_NO_PAD
                .decode(encoded.trim())
                .map_err(|e| CryptoError::MalformedInput(e.to_string()))?,
        );
        if raw.len() != KEY_LEN {
            return Err(CryptoError::InvalidKey(format!(
                "expected {KEY_LEN} bytes, got {}",
                raw.len()
            )));
        }
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&raw);
        Ok(Self(key))
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

/// Encrypt `plaintext`, prepending the format version and a random nonce.
pub fn encrypt(key: &SecretKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let nonce = XChaCha20Poly1305::generate_nonce(&mut AeadOsRng);

    let ciphertext = cipher
        .encrypt(&nonce, Payload { msg: plaintext, aad: AAD })
        .map_err(|_| CryptoError::AeadEncrypt)?;

    let mut out = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
    out.push(FORMAT_VERSION);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt wire-format bytes (version || nonce || ciphertext+tag).
pub fn decrypt(key: &SecretKey, data: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if data.len() < 1 + NONCE_LEN + TAG_LEN {
        return Err(CryptoError::MalformedInput("ciphertext too short".into()));
    }
    let (version, rest) = data.split_at(1);
    if version[0] != FORMAT_VERSION {
        return Err(CryptoError::MalformedInput(format!(
            "unsupported ciphertext version {}",
            version[0]
        )));
    }
    let (nonce_bytes, ct) = rest.split_at(NONCE_LEN);
    let nonce = XNonce::from_slice(nonce_bytes);

    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let plaintext = cipher
        .decrypt(nonce, Payload { msg: ct, aad: AAD })
        .map_err(|_| CryptoError::AuthenticationFailure)?;

    Ok(Zeroizing::new(plaintext))
}

/// `encrypt` followed by base64 encoding.
pub fn encrypt_to_token(key: &SecretKey, plaintext: &[u8]) -> Result<String, CryptoError> {
    Ok(URL_SAFE_NO_PAD.encode(encrypt(key, plaintext)?))
}

/// Inverse of [`encrypt_to_token`].
pub fn decrypt_token(key: &SecretKey, token: &str) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let raw = URL_SAFE_NO_PAD
        .decode(token.trim())
        .map_err(|e| CryptoError::MalformedInput(e.to_string()))?;
    decrypt(key, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let key = SecretKey::generate();
        let ct = encrypt(&key, b"launch codes").unwrap();
        assert_eq!(&decrypt(&key, &ct).unwrap()[..], b"launch codes");
    }

    #[test]
    fn nonces_are_fresh() {
        let key = SecretKey::generate();
        let a = encrypt(&key, b"same").unwrap();
        let b = encrypt(&key, b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let ct = encrypt(&SecretKey::generate(), b"data").unwrap();
        let err = decrypt(&SecretKey::generate(), &ct).unwrap_err();
        assert!(matches!(err, CryptoError::AuthenticationFailure));
    }

    #[test]
    fn flipped_byte_fails_authentication() {
        let key = SecretKey::generate();
        let mut ct = encrypt(&key, b"do not touch").unwrap();
        let last = ct.len() - 1;
        ct[last] ^= 0x01;
        assert!(matches!(
            decrypt(&key, &ct).unwrap_err(),
            CryptoError::AuthenticationFailure
        ));
    }

    #[test]
    fn short_or_unversioned_input_is_malformed() {
        let key = SecretKey::generate();
        assert!(matches!(
            decrypt(&key, &[FORMAT_VERSION; 10]).unwrap_err(),
            CryptoError::MalformedInput(_)
        ));

        let mut ct = encrypt(&key, b"x").unwrap();
        ct[0] = 0x7f;
        assert!(matches!(
            decrypt(&key, &ct).unwrap_err(),
            CryptoError::MalformedInput(_)
        ));
    }

    #[test]
    fn token_is_printable_and_roundtrips() {
        let key = SecretKey::generate();
        let token = encrypt_to_token(&key, b"hello").unwrap();
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(&decrypt_token(&key, &token).unwrap()[..], b"hello");
        assert!(matches!(
            decrypt_token(&key, "not base64 !!").unwrap_err(),
            CryptoError::MalformedInput(_)
        ));
    }

    #[test]
    fn encoded_key_roundtrip() {
        let key = SecretKey::generate();
        let decoded = SecretKey::from_encoded(&key.to_encoded()).unwrap();
        assert_eq!(key.as_bytes(), decoded.as_bytes());
        assert!(SecretKey::from_encoded("c2hvcnQ").is_err());
        assert_eq!(format!("{key:?}"), "SecretKey(<redacted>)");
    }

    #[test]
    fn generated_keys_differ() {
        assert_ne!(
            SecretKey::generate().as_bytes(),
            SecretKey::generate().as_bytes()
        );
    }
}
