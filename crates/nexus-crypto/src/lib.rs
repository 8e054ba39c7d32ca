//! Nexus Cryptographic Primitives
//!
//! Cryptographic building blocks for the Nexus keycode protocols. Pure
//! functions with deterministic outputs; no global state, no I/O.
//!
//! Every message authentication code and every obscuring keystream in the
//! keycode system is derived from a single primitive, SipHash-2-4:
//!
//! ```text
//! 16-byte secret key ──► SipHash-2-4 ──► 64-bit MAC (truncated per protocol)
//!
//! fixed all-zero key ──► SipHash-2-4 ──► keystream chunks (obscuring PRNG)
//!                     └► SipHash-2-4 ──► UART security key halves
//! ```
//!
//! # Security
//!
//! - Keys are never retained past a call: callers own the [`SecretKey`]
//!   and the memory is zeroized when it is dropped.
//! - The keystream key is a fixed, public all-zero constant. The keystream
//!   obscures structure only; it carries no secrecy guarantee.
//! - Truncation of the 64-bit SipHash output (decimal digits or high bits)
//!   is the responsibility of the protocol layers, since the truncation
//!   rules are part of each protocol's wire contract.

pub mod key;
pub mod keystream;
pub mod uart;

mod hash;

pub use hash::siphash24;
pub use key::{KEY_LEN, KeyLengthError, SecretKey, TEST_KEY, ZERO_KEY};
pub use keystream::keystream;
pub use uart::derive_uart_security_key;
