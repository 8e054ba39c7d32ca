//! Secret key material for keycode MAC derivation.

use std::fmt;

use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// SipHash-2-4 requires exactly 16 bytes of key material.
pub const KEY_LEN: usize = 16;

/// The fixed, public all-zero key.
///
/// Used for the obscuring keystream, for factory messages, and for UART
/// security key derivation. It provides determinism, not secrecy.
pub const ZERO_KEY: SecretKey = SecretKey::new([0x00; KEY_LEN]);

/// The fixed all-`0xFF` key used for Small test messages, so that any
/// factory can reproduce them without provisioning device keys.
pub const TEST_KEY: SecretKey = SecretKey::new([0xFF; KEY_LEN]);

/// A 16-byte symmetric key.
///
/// Construction from a byte slice keeps only the first 16 bytes; shorter
/// input is rejected. The backing memory is zeroized on drop and the
/// `Debug` form never prints key bytes.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; KEY_LEN]);

impl SecretKey {
    /// Wrap an exact-size key.
    #[must_use]
    pub const fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Build a key from arbitrary caller-supplied bytes.
    ///
    /// Only the first [`KEY_LEN`] bytes are used; fewer is an error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyLengthError> {
        let Some(head) = bytes.get(..KEY_LEN) else {
            return Err(KeyLengthError { actual: bytes.len() });
        };
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(head);
        Ok(Self(key))
    }

    /// Raw key bytes, for handing to the hash primitive.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// Caller supplied fewer than [`KEY_LEN`] bytes of key material.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("secret key requires at least {KEY_LEN} bytes, got {actual}")]
pub struct KeyLengthError {
    /// Number of bytes actually supplied.
    pub actual: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_length_accepted() {
        let key = SecretKey::from_bytes(&[0xAB; 16]).unwrap();
        assert_eq!(key.as_bytes(), &[0xAB; 16]);
    }

    #[test]
    fn longer_input_truncated_to_first_16() {
        let mut material = vec![0xFB, 0x00, 0xA5, 0x98].repeat(4);
        let key_short = SecretKey::from_bytes(&material).unwrap();
        material.extend(vec![0x02, 0x03, 0x04, 0x05].repeat(4));
        let key_long = SecretKey::from_bytes(&material).unwrap();

        assert_eq!(key_short.as_bytes(), key_long.as_bytes());
    }

    #[test]
    fn short_input_rejected() {
        let err = SecretKey::from_bytes(&[0u8; 15]).unwrap_err();
        assert_eq!(err, KeyLengthError { actual: 15 });
    }

    #[test]
    fn debug_never_prints_key_bytes() {
        let key = SecretKey::new([0x5A; 16]);
        let printed = format!("{key:?}");
        assert!(!printed.contains("5A"));
        assert!(!printed.contains("90")); // 0x5A in decimal
    }
}
