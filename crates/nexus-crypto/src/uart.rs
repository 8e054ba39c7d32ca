//! UART passthrough security key derivation.

use crate::hash::siphash24;
use crate::key::{KEY_LEN, SecretKey, ZERO_KEY};

/// Derive the 16-byte UART security key from a device secret key.
///
/// Each 8-byte half of the device key is hashed under the fixed all-zero
/// key; the two little-endian digests concatenated form the UART key. The
/// derived key authenticates the numeric-body UART keycode and must match
/// the derivation performed by device firmware byte for byte.
#[must_use]
pub fn derive_uart_security_key(secret_key: &SecretKey) -> SecretKey {
    let bytes = secret_key.as_bytes();
    let half_a = siphash24(&ZERO_KEY, &bytes[..KEY_LEN / 2]).to_le_bytes();
    let half_b = siphash24(&ZERO_KEY, &bytes[KEY_LEN / 2..]).to_le_bytes();

    let mut derived = [0u8; KEY_LEN];
    derived[..8].copy_from_slice(&half_a);
    derived[8..].copy_from_slice(&half_b);
    SecretKey::new(derived)
}
