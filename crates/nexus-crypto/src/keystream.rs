//! Deterministic keystream used to obscure keycode structure.
//!
//! This is a simplified HKDF-style expansion over SipHash-2-4: chunk `i`
//! of the stream is the little-endian hash of the chunk counter byte
//! followed by the seed, under the fixed all-zero key. The same seed
//! always yields the same stream, which is what the obscuring transforms
//! need — a receiver re-derives the stream from the transmitted MAC and
//! inverts the mask.

use crate::hash::siphash24;
use crate::key::ZERO_KEY;

/// Fill `output` with the keystream derived from `seed`.
///
/// `seed` must already be left-zero-padded to whole bytes; bit-level seeds
/// (such as a 12-bit truncated MAC) are padded into their big-endian byte
/// form by the caller. Any output length is supported; bytes beyond the
/// first 8 come from further counter chunks.
pub fn keystream(seed: &[u8], output: &mut [u8]) {
    let mut message = Vec::with_capacity(seed.len() + 1);
    for (index, chunk) in output.chunks_mut(8).enumerate() {
        message.clear();
        message.push(index as u8);
        message.extend_from_slice(seed);

        let block = siphash24(&ZERO_KEY, &message).to_le_bytes();
        chunk.copy_from_slice(&block[..chunk.len()]);
    }
}
