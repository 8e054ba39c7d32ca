//! Extended Small messages: authenticated applications inside passthrough
//! framing.
//!
//! An extended message occupies the 26 passthrough payload bits as
//!
//! ```text
//! a ttt bbbbbbbbbb mmmmmmmmmmmm
//! ```
//!
//! one fixed application-id bit (`1`), a 3-bit extended type, a 10-bit
//! body, and a 12-bit auth field. Because the body transmits only a few
//! id bits (2 for the set-credit type), the firmware accepts any id in a
//! window around its own counter, and two ids in that window that share
//! transmitted id bits and auth value would be ambiguous. Construction
//! therefore searches upward from the requested id until the auth field
//! is unique within the window, and reports the id actually used.

use nexus_crypto::{SecretKey, siphash24};

use crate::errors::{ProtocolError, Result};
use crate::small::{Credit, SmallKeycodeOptions, SmallMessage, set_credit_increment_id};

/// Ids above the receiver's counter that device firmware will accept.
pub const RECEIPT_WINDOW_IDS_ABOVE: u32 = 40;

/// Ids below the receiver's counter that device firmware will accept.
pub const RECEIPT_WINDOW_IDS_BELOW: u32 = 23;

/// Passthrough application-id bit marking an extended small message.
const EXTENDED_APP_ID_BIT: u32 = 1;

/// Id generation is never attempted above this bound when scanning the
/// receive window; deployed counters stay well under it.
const MAX_WINDOW_SCAN_ID: u32 = u16::MAX as u32;

/// Extended message types: wire type code plus the number of body bits
/// that carry truncated id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendedMessageType {
    /// Set credit and clear the 'restricted' flag in one message.
    SetCreditWipeRestrictedFlag,
}

impl ExtendedMessageType {
    fn type_code(self) -> u8 {
        match self {
            Self::SetCreditWipeRestrictedFlag => 0,
        }
    }

    fn transmitted_id_bits(self) -> u32 {
        match self {
            Self::SetCreditWipeRestrictedFlag => 2,
        }
    }
}

/// An extended small message, wrapped and ready to render.
///
/// The id actually encoded may be higher than the one requested (see
/// module docs); read it back with [`Self::final_id`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedSmallMessage {
    message: SmallMessage,
    message_type: ExtendedMessageType,
    final_id: u32,
}

impl ExtendedSmallMessage {
    /// Build a set-credit-and-wipe-restricted-flag message.
    ///
    /// The 10-bit body is the low 2 id bits followed by the SET_CREDIT
    /// increment id for `credit`. If the requested id's auth collides
    /// inside the receive window the id is advanced and retried; after
    /// [`RECEIPT_WINDOW_IDS_ABOVE`] fruitless candidates construction
    /// fails with [`ProtocolError::ExtendedSmallMessageIdInvalid`].
    pub fn set_credit_wipe_restricted_flag(
        requested_id: u32,
        credit: Credit,
        secret_key: &SecretKey,
    ) -> Result<Self> {
        let message_type = ExtendedMessageType::SetCreditWipeRestrictedFlag;
        let increment_id = set_credit_increment_id(credit)?;

        for offset in 0..RECEIPT_WINDOW_IDS_ABOVE {
            let Some(candidate) = requested_id.checked_add(offset) else {
                return Err(ProtocolError::OutOfRangeId {
                    id: u64::from(requested_id) + u64::from(offset),
                });
            };

            let body = wipe_restricted_flag_body(candidate, increment_id);
            if let Some(auth) = auth_with_no_collisions(candidate, message_type, body, secret_key)
            {
                let payload = (EXTENDED_APP_ID_BIT << 25)
                    | (u32::from(message_type.type_code()) << 22)
                    | (u32::from(body) << 12)
                    | u32::from(auth);
                let message = SmallMessage::passthrough(payload)?;
                return Ok(Self { message, message_type, final_id: candidate });
            }
        }

        Err(ProtocolError::ExtendedSmallMessageIdInvalid { requested_id })
    }

    /// The id actually encoded; at least the requested id, and less than
    /// the requested id plus [`RECEIPT_WINDOW_IDS_ABOVE`].
    #[must_use]
    pub fn final_id(&self) -> u32 {
        self.final_id
    }

    /// Extended message type.
    #[must_use]
    pub fn message_type(&self) -> ExtendedMessageType {
        self.message_type
    }

    /// The underlying passthrough framing.
    #[must_use]
    pub fn message(&self) -> &SmallMessage {
        &self.message
    }

    /// Render with default Small formatting.
    #[must_use]
    pub fn to_keycode(&self) -> String {
        self.message.to_keycode()
    }

    /// Render with explicit Small formatting options.
    pub fn to_keycode_with(&self, options: &SmallKeycodeOptions) -> Result<String> {
        self.message.to_keycode_with(options)
    }
}

/// 10-bit body: low 2 id bits, then the 8-bit increment id.
fn wipe_restricted_flag_body(id: u32, increment_id: u8) -> u16 {
    (((id & 0b11) as u16) << 8) | u16::from(increment_id)
}

/// Auth over 7 bytes: the full id little-endian, the extended type code,
/// and the body left-zero-padded to 16 bits little-endian. The top 12
/// hash bits are transmitted.
fn compute_auth(
    full_id: u32,
    message_type: ExtendedMessageType,
    body: u16,
    secret_key: &SecretKey,
) -> u16 {
    let mut input = [0u8; 7];
    input[..4].copy_from_slice(&full_id.to_le_bytes());
    input[4] = message_type.type_code();
    input[5..].copy_from_slice(&body.to_le_bytes());
    (siphash24(secret_key, &input) >> 52) as u16
}

/// Compute the auth for `requested_id`, unless some other id in the
/// receive window with the same transmitted id bits yields the same auth.
fn auth_with_no_collisions(
    requested_id: u32,
    message_type: ExtendedMessageType,
    body: u16,
    secret_key: &SecretKey,
) -> Option<u16> {
    let step = 1u32 << message_type.transmitted_id_bits();
    let candidate_auth = compute_auth(requested_id, message_type, body, secret_key);

    let window_min = requested_id.saturating_sub(RECEIPT_WINDOW_IDS_BELOW);
    let window_max = requested_id.saturating_add(RECEIPT_WINDOW_IDS_ABOVE).min(MAX_WINDOW_SCAN_ID);

    for id in window_min..=window_max {
        // Only ids sharing the transmitted id bits can be confused.
        if id == requested_id || requested_id.abs_diff(id) % step != 0 {
            continue;
        }
        if compute_auth(id, message_type, body, secret_key) == candidate_auth {
            return None;
        }
    }

    Some(candidate_auth)
}
