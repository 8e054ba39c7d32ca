//! Property-based tests for the keystream and key primitives.

use nexus_crypto::{SecretKey, derive_uart_security_key, keystream, siphash24};
use proptest::prelude::*;

proptest! {
    #[test]
    fn keystream_is_deterministic(seed in prop::collection::vec(any::<u8>(), 0..32)) {
        let mut a = [0u8; 16];
        let mut b = [0u8; 16];
        keystream(&seed, &mut a);
        keystream(&seed, &mut b);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn keystream_prefix_is_stable(
        seed in prop::collection::vec(any::<u8>(), 0..32),
        short_len in 1usize..32,
        extra in 1usize..32,
    ) {
        let mut short = vec![0u8; short_len];
        let mut long = vec![0u8; short_len + extra];
        keystream(&seed, &mut short);
        keystream(&seed, &mut long);
        prop_assert_eq!(&short[..], &long[..short_len]);
    }

    #[test]
    fn key_slicing_is_stable(
        head in prop::collection::vec(any::<u8>(), 16..=16),
        tail in prop::collection::vec(any::<u8>(), 0..16),
        message in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        let mut full = head.clone();
        full.extend_from_slice(&tail);

        let sliced = SecretKey::from_bytes(&full).unwrap();
        let exact = SecretKey::from_bytes(&head).unwrap();
        prop_assert_eq!(siphash24(&sliced, &message), siphash24(&exact, &message));
    }

    #[test]
    fn uart_derivation_never_panics(key in prop::collection::vec(any::<u8>(), 16..=16)) {
        let key = SecretKey::from_bytes(&key).unwrap();
        let _ = derive_uart_security_key(&key);
    }
}
