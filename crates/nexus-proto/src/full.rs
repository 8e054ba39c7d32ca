//! Full-protocol keycode messages (decimal 0-9 keypads).
//!
//! An activation message is rendered as exactly 14 digits before grouping:
//! a 3-digit header (type digit plus the low 6 bits of the message id as
//! two decimal digits), a 5-digit body, and a 6-digit MAC. Factory
//! messages drop the id from the header and are rendered unobscured.
//! Passthrough messages carry an opaque digit body and no MAC at all; the
//! embedded application owns integrity for those.

use nexus_crypto::{SecretKey, ZERO_KEY, derive_uart_security_key, siphash24};

use crate::channel::{ChannelOriginCommandToken, OriginCommandBearer};
use crate::digits::{decimal_value, group_digits, truncated_mac_digits};
use crate::errors::{ProtocolError, Result};
use crate::obscure::obscure_digits;

/// Hours value encoding "unlock forever" in a SET_CREDIT body.
pub const UNLOCK_FLAG_IN_HOURS: u32 = 99_999;

/// Largest hours value a 5-digit credit body can carry.
pub const MAX_CREDIT_HOURS: u32 = 99_999;

/// Message type codes transmitted in the keycode header digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FullMessageType {
    /// Add hours of credit to the device's balance.
    AddCredit = 0,
    /// Set the device's credit balance outright.
    SetCredit = 1,
    /// Wipe device state according to a [`FullMessageWipeFlags`] value.
    WipeState = 2,
    /// Reserved; never constructed.
    Reserved3 = 3,
    /// Briefly enable a PAYG-disabled device for field testing.
    FactoryAllowTest = 4,
    /// Add a bounded number of test minutes, up to 10 times per device.
    FactoryOqcTest = 5,
    /// Ask the device to display its provisioned PAYG id.
    FactoryDisplayPaygId = 6,
    /// Reserved; never constructed.
    Reserved7 = 7,
    /// Opaque body forwarded to an application handler; carries no MAC.
    PassthroughCommand = 8,
}

/// Wipe targets for [`FullMessage::wipe_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FullMessageWipeFlags {
    /// Wipe state, except the received-messages bitmask.
    TargetFlags0 = 0,
    /// Wipe state, including the received-messages bitmask.
    TargetFlags1 = 1,
    /// Clear only the received-messages bitmask.
    WipeIdsAll = 2,
    /// Clear the application-specific 'restricted' flag.
    WipeRestrictedFlag = 3,
}

/// Application handlers addressable through a passthrough body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PassthroughApplicationId {
    /// PAYG UART passthrough handler.
    ToPaygUartPassthrough = 0,
    /// Nexus Channel origin command handler.
    ChannelOriginCommand = 1,
}

/// Rendering options for [`FullMessage::to_keycode_with`].
#[derive(Debug, Clone)]
pub struct FullKeycodeOptions {
    /// Keycode start character(s).
    pub prefix: String,
    /// Keycode end character(s).
    pub suffix: String,
    /// Separator between digit groups.
    pub separator: String,
    /// Digits per group; zero disables grouping.
    pub group_len: usize,
    /// `Some(_)` forces obscuring on or off; `None` obscures every
    /// non-factory message.
    pub obscured: Option<bool>,
}

impl Default for FullKeycodeOptions {
    fn default() -> Self {
        Self {
            prefix: "*".to_owned(),
            suffix: "#".to_owned(),
            separator: " ".to_owned(),
            group_len: 3,
            obscured: None,
        }
    }
}

/// An immutable Full-protocol message, ready to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullMessage {
    full_id: u32,
    message_type: FullMessageType,
    header: String,
    body: String,
    mac: Option<String>,
    is_factory: bool,
}

impl FullMessage {
    /// Add `hours` of credit. Body is the zero-padded hours value.
    pub fn add_credit(id: u32, hours: u32, secret_key: &SecretKey) -> Result<Self> {
        Ok(Self::operator(id, FullMessageType::AddCredit, credit_body(hours)?, secret_key))
    }

    /// Set the credit balance to `hours`.
    pub fn set_credit(id: u32, hours: u32, secret_key: &SecretKey) -> Result<Self> {
        Ok(Self::operator(id, FullMessageType::SetCredit, credit_body(hours)?, secret_key))
    }

    /// Unlock the device permanently (SET_CREDIT with the unlock sentinel).
    #[must_use]
    pub fn unlock(id: u32, secret_key: &SecretKey) -> Self {
        Self::operator(
            id,
            FullMessageType::SetCredit,
            format!("{UNLOCK_FLAG_IN_HOURS:05}"),
            secret_key,
        )
    }

    /// Wipe device state according to `flags`.
    #[must_use]
    pub fn wipe_state(id: u32, flags: FullMessageWipeFlags, secret_key: &SecretKey) -> Self {
        Self::operator(
            id,
            FullMessageType::WipeState,
            format!("0{:04}", flags as u8),
            secret_key,
        )
    }

    /// Factory: briefly enable a device even if PAYG-disabled.
    #[must_use]
    pub fn allow_test() -> Self {
        Self::factory(FullMessageType::FactoryAllowTest, String::new())
    }

    /// Factory: grant `num_min` minutes of test credit (1..=99).
    pub fn oqc_test(num_min: u8) -> Result<Self> {
        if !(1..=99).contains(&num_min) {
            return Err(ProtocolError::OutOfRangeBodyValue {
                field: "num_min",
                value: u64::from(num_min),
            });
        }
        Ok(Self::factory(FullMessageType::FactoryOqcTest, format!("000{num_min:02}")))
    }

    /// Factory: display the provisioned PAYG id.
    #[must_use]
    pub fn display_payg_id() -> Self {
        Self::factory(FullMessageType::FactoryDisplayPaygId, String::new())
    }

    /// Wrap opaque application digits in a passthrough keycode.
    ///
    /// Passthrough keycodes carry no MAC and trigger no keycode-level UI
    /// feedback on the device; the addressed application owns both. A
    /// body totalling 13 digits is rejected: with the header digit it
    /// would render as 14 digits, which receivers reserve for activation
    /// keycodes.
    pub fn passthrough_command(
        application_id: PassthroughApplicationId,
        passthrough_digits: &str,
    ) -> Result<Self> {
        if !passthrough_digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ProtocolError::PassthroughBodyNotDecimal);
        }

        let body = format!("{}{passthrough_digits}", application_id as u8);
        if body.len() == 13 {
            return Err(ProtocolError::PassthroughBodyLengthForbidden);
        }
        Ok(Self::factory(FullMessageType::PassthroughCommand, body))
    }

    /// Wrap a rendered Channel origin command token in a passthrough
    /// keycode under [`PassthroughApplicationId::ChannelOriginCommand`].
    pub fn passthrough_channel_origin_command(token: &ChannelOriginCommandToken) -> Result<Self> {
        // Smallpad-borne tokens already render as complete Small keycodes
        // and cannot ride inside a Full passthrough body.
        if token.bearer() != OriginCommandBearer::AsciiDigits {
            return Err(ProtocolError::PassthroughBodyNotDecimal);
        }
        Self::passthrough_command(PassthroughApplicationId::ChannelOriginCommand, &token.to_digits())
    }

    /// Build the numeric-body UART security keycode for `secret_key`.
    ///
    /// The body is the digit `0` followed by a 6-digit MAC computed with
    /// the derived UART security key over a single zero byte, wrapped
    /// under [`PassthroughApplicationId::ToPaygUartPassthrough`].
    pub fn passthrough_uart_security_keycode(secret_key: &SecretKey) -> Result<Self> {
        let uart_key = derive_uart_security_key(secret_key);
        let mac = truncated_mac_digits(siphash24(&uart_key, &[0x00]));
        Self::passthrough_command(PassthroughApplicationId::ToPaygUartPassthrough, &format!("0{mac}"))
    }

    /// Message sequence number (0 for factory messages).
    #[must_use]
    pub fn full_id(&self) -> u32 {
        self.full_id
    }

    /// Wire message type.
    #[must_use]
    pub fn message_type(&self) -> FullMessageType {
        self.message_type
    }

    /// Header digits: the type digit, plus the low 6 id bits as two
    /// decimal digits for non-factory messages.
    #[must_use]
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Body digits (may be empty for factory messages).
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// MAC digits; absent for passthrough messages.
    #[must_use]
    pub fn mac(&self) -> Option<&str> {
        self.mac.as_deref()
    }

    /// Whether this is a factory message (id-less header, never obscured
    /// by default).
    #[must_use]
    pub fn is_factory(&self) -> bool {
        self.is_factory
    }

    /// Render with default formatting: `*DDD DDD …#`, obscured unless
    /// factory.
    #[must_use]
    pub fn to_keycode(&self) -> String {
        self.to_keycode_with(&FullKeycodeOptions::default())
    }

    /// Render with explicit formatting options.
    #[must_use]
    pub fn to_keycode_with(&self, options: &FullKeycodeOptions) -> String {
        let mut keycode = format!("{}{}", self.header, self.body);
        if let Some(mac) = &self.mac {
            keycode.push_str(mac);
        }

        if options.obscured.unwrap_or(!self.is_factory) {
            // Obscured activation keycodes are always 14 digits long.
            debug_assert_eq!(keycode.len(), 14);
            keycode = obscure_digits(&keycode);
        }

        let grouped = group_digits(&keycode, options.group_len, &options.separator);
        format!("{}{}{}", options.prefix, grouped, options.suffix)
    }

    fn operator(
        full_id: u32,
        message_type: FullMessageType,
        body: String,
        secret_key: &SecretKey,
    ) -> Self {
        let header = format!("{}{:02}", message_type as u8, full_id & 0x3F);
        let mac = compute_mac(full_id, message_type, &body, secret_key);
        Self { full_id, message_type, header, body, mac: Some(mac), is_factory: false }
    }

    fn factory(message_type: FullMessageType, body: String) -> Self {
        let header = (message_type as u8).to_string();
        let mac = (message_type != FullMessageType::PassthroughCommand)
            .then(|| compute_mac(0, message_type, &body, &ZERO_KEY));
        Self { full_id: 0, message_type, header, body, mac, is_factory: true }
    }
}

fn credit_body(hours: u32) -> Result<String> {
    if hours > MAX_CREDIT_HOURS {
        return Err(ProtocolError::OutOfRangeBodyValue { field: "hours", value: u64::from(hours) });
    }
    Ok(format!("{hours:05}"))
}

/// MAC over 9 bytes: the id, the type byte, and the body digits read as a
/// 32-bit integer, all little-endian.
fn compute_mac(
    full_id: u32,
    message_type: FullMessageType,
    body: &str,
    secret_key: &SecretKey,
) -> String {
    let mut input = [0u8; 9];
    input[..4].copy_from_slice(&full_id.to_le_bytes());
    input[4] = message_type as u8;
    input[5..].copy_from_slice(&decimal_value(body).to_le_bytes());
    truncated_mac_digits(siphash24(secret_key, &input))
}
