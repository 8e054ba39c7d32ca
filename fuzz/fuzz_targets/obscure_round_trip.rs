//! Obscuring transforms must round-trip and leave MAC fields untouched
//! for every input shape.

#![no_main]

use libfuzzer_sys::fuzz_target;
use nexus_proto::obscure::{deobscure_digits, obscure_digits, obscure_small_bits};

fuzz_target!(|data: (Vec<u8>, u32)| {
    let (digit_seed, bits) = data;

    // Any digit string at least as long as the MAC field must round-trip.
    if digit_seed.len() >= 6 {
        let digits: String =
            digit_seed.iter().copied().map(|b| char::from(b'0' + b % 10)).collect();
        let obscured = obscure_digits(&digits);
        assert_eq!(obscured.len(), digits.len());
        assert_eq!(&obscured[digits.len() - 6..], &digits[digits.len() - 6..]);
        assert_eq!(deobscure_digits(&obscured), digits);
    }

    // Any 28-bit pattern must be a fixed point of double obscuring.
    let bits = bits & 0x0FFF_FFFF;
    let once = obscure_small_bits(bits);
    assert_eq!(once & 0xFFF, bits & 0xFFF);
    assert_eq!(obscure_small_bits(once), bits);
});
