//! Digit and bit conversion helpers shared by the keycode renderers.

/// Render the wire form of a 6-digit MAC from a raw SipHash output.
///
/// The truncation is part of the wire contract: take the low 32 bits,
/// format them as a decimal string zero-padded to at least 6 characters,
/// then keep the right-most 6. For values shorter than 6 decimal digits
/// the zero padding survives; for longer values the high decimal digits
/// are discarded. This is *not* `value % 1_000_000` — receivers reproduce
/// the stringification, so the stringification is the contract.
pub(crate) fn truncated_mac_digits(hash: u64) -> String {
    let low = hash & 0xFFFF_FFFF;
    let padded = format!("{low:06}");
    padded[padded.len() - 6..].to_owned()
}

/// Parse a short ASCII digit string as a decimal integer.
///
/// Callers guarantee `digits` holds at most 9 ASCII decimal digits, so the
/// value always fits in a `u32`.
pub(crate) fn decimal_value(digits: &str) -> u32 {
    debug_assert!(digits.len() <= 9);
    debug_assert!(digits.bytes().all(|b| b.is_ascii_digit()));
    digits.bytes().fold(0u32, |acc, b| acc * 10 + u32::from(b - b'0'))
}

/// Split `digits` into groups of `group_len` joined by `separator`.
///
/// A `group_len` of zero disables grouping.
pub(crate) fn group_digits(digits: &str, group_len: usize, separator: &str) -> String {
    if group_len == 0 {
        return digits.to_owned();
    }
    let chars: Vec<char> = digits.chars().collect();
    chars
        .chunks(group_len)
        .map(|group| group.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Expand a 28-bit small-protocol message into its 14 two-bit key values,
/// most-significant pair first.
pub(crate) fn quaternary_values(bits: u32) -> [u8; 14] {
    debug_assert_eq!(bits >> 28, 0);
    let mut values = [0u8; 14];
    for (i, value) in values.iter_mut().enumerate() {
        *value = ((bits >> (26 - 2 * i)) & 0b11) as u8;
    }
    values
}
