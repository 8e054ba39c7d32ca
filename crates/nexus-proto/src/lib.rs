//! Nexus keycode message codecs.
//!
//! Deterministic, pure-function encoders for the keycode protocols used to
//! deliver authenticated control messages to pay-as-you-go devices through
//! a numeric keypad:
//!
//! - **Full protocol** ([`full`]): decimal-digit keycodes, 14 digits for
//!   activation messages, entered on a 0-9 keypad.
//! - **Small protocol** ([`small`]): 28-bit quaternary keycodes for
//!   4-button keypads, rendered as 15 digits behind a prefix digit.
//! - **Extended Small** ([`extended`]): authenticated application messages
//!   carried inside Small passthrough framing.
//! - **Channel Origin commands** ([`channel`]): backend-to-controller
//!   command tokens, borne as decimal digits or as a Small passthrough
//!   payload.
//!
//! Every keycode must be byte-for-byte reproducible on embedded receivers
//! that decode and verify it offline, so the byte layouts hashed for each
//! MAC, the digit truncations, and the obscuring transforms in this crate
//! are wire contracts. Change nothing here without a matching firmware
//! release.
//!
//! No entry point holds state: each message is constructed once from
//! caller-supplied parameters (ids, credit amounts, a 16-byte key),
//! validated up front, and rendered on demand.

pub mod channel;
pub mod errors;
pub mod extended;
pub mod full;
pub mod obscure;
pub mod small;

mod digits;

pub use channel::{ChannelOriginAction, ChannelOriginCommandToken, NexusId, OriginCommandBearer};
pub use errors::{ProtocolError, Result};
pub use extended::ExtendedSmallMessage;
pub use full::{FullKeycodeOptions, FullMessage, FullMessageType, FullMessageWipeFlags};
pub use small::{Credit, SmallKeycodeOptions, SmallMessage, SmallMessageType};
