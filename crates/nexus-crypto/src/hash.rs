//! SipHash-2-4 invocation convention shared by every MAC in the system.

use std::hash::Hasher;

use siphasher::sip::SipHasher24;

use crate::key::SecretKey;

/// Compute SipHash-2-4 of `message` under `key`.
///
/// The result is the raw 64-bit hash; protocol layers truncate it to
/// decimal digits or high bits according to their own wire contracts.
#[must_use]
pub fn siphash24(key: &SecretKey, message: &[u8]) -> u64 {
    let mut hasher = SipHasher24::new_with_key(key.as_bytes());
    hasher.write(message);
    hasher.finish()
}
