//! BLAKE3-based digests
//!
//! - PIN digests, keyed by an optional deployment pepper
//! - Lookup digests for retrieval keys (the raw key is never persisted)

use std::fmt;

use zeroize::ZeroizeOnDrop;

use crate::aead::SecretKey;

pub const DIGEST_LEN: usize = 32;

const PIN_CONTEXT: &str = "darklock burn 2024-06 pin digest v1";
const LOOKUP_CONTEXT: &str = "darklock burn 2024-06 retrieval lookup v1";

/// One-way PIN digest. Deterministic for a given pepper.
#[derive(Clone, ZeroizeOnDrop)]
pub struct PinHasher {
    key: [u8; 32],
}

impl PinHasher {
    /// Hasher without a pepper; digests depend on the PIN alone.
    pub fn new() -> Self {
        Self::with_pepper(b"")
    }

    /// Hasher keyed by a server-side pepper that never leaves the process.
    pub fn with_pepper(pepper: &[u8]) -> Self {
        Self {
            key: blake3::derive_key(PIN_CONTEXT, pepper),
        }
    }

    pub fn digest(&self, pin: &str) -> [u8; DIGEST_LEN] {
        blake3::keyed_hash(&self.key, pin.as_bytes()).into()
    }

    pub fn digest_hex(&self, pin: &str) -> String {
        hex::encode(self.digest(pin))
    }

    pub fn verify(&self, pin: &str, stored: &[u8]) -> bool {
        let Ok(stored) = <&[u8; DIGEST_LEN]>::try_from(stored) else {
            return false;
        };
        constant_time_eq(&self.digest(pin), stored)
    }

    /// Verify against the hex form kept in the database.
    pub fn verify_hex(&self, pin: &str, stored_hex: &str) -> bool {
        match hex::decode(stored_hex) {
            Ok(stored) => self.verify(pin, &stored),
            Err(_) => false,
        }
    }
}

impl Default for PinHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PinHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PinHasher(<redacted>)")
    }
}

/// Hex digest used to index a record by its retrieval key.
pub fn lookup_digest(key: &SecretKey) -> String {
    hex::encode(blake3::derive_key(LOOKUP_CONTEXT, key.as_bytes()))
}

/// Constant-time comparison to prevent timing side channels.
fn constant_time_eq(a: &[u8; DIGEST_LEN], b: &[u8; DIGEST_LEN]) -> bool {
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic_and_fixed_length() {
        let hasher = PinHasher::new();
        assert_eq!(hasher.digest("1234"), hasher.digest("1234"));
        assert_ne!(hasher.digest("1234"), hasher.digest("1235"));
        assert_eq!(hasher.digest_hex("1234").len(), DIGEST_LEN * 2);
    }

    #[test]
    fn verify_matches_only_the_right_pin() {
        let hasher = PinHasher::new();
        let stored = hasher.digest_hex("0420");
        assert!(hasher.verify_hex("0420", &stored));
        assert!(!hasher.verify_hex("0421", &stored));
        assert!(!hasher.verify_hex("0420", "zz"));
        assert!(!hasher.verify("0420", &[0u8; 4]));
    }

    #[test]
    fn pepper_changes_digest() {
        let plain = PinHasher::new();
        let peppered = PinHasher::with_pepper(b"deployment-pepper");
        assert_ne!(plain.digest("1111"), peppered.digest("1111"));
        assert!(!peppered.verify("1111", &plain.digest("1111")));
    }

    #[test]
    fn lookup_digest_hides_key() {
        let key = SecretKey::generate();
        let digest = lookup_digest(&key);
        assert_eq!(digest, lookup_digest(&key));
        assert!(!digest.contains(&key.to_encoded()));
        assert_ne!(digest, lookup_digest(&SecretKey::generate()));
    }
}
