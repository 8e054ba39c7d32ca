//! Small-protocol keycode messages (4-button quaternary keypads).
//!
//! Every transmitted small message is exactly 28 bits. Non-passthrough
//! messages carry the low 6 bits of a 32-bit sequence id, a 2-bit type
//! code, an 8-bit body, and the top 12 bits of a SipHash MAC; receivers
//! expand the truncated id against their own counter. Passthrough
//! messages replace everything but the type bits with 26 bits of opaque
//! application payload and carry no MAC of their own.
//!
//! Credit bodies are "increment ids": a quantised, non-linear mapping from
//! days of credit to one byte, with sentinels for lock (254) and unlock
//! (255) and a reserved band (240..=253) for custom commands.

use nexus_crypto::{SecretKey, TEST_KEY, siphash24};

use crate::digits::{group_digits, quaternary_values};
use crate::errors::{ProtocolError, Result};
use crate::obscure::obscure_small_bits;

/// Increment id meaning "unlock forever".
pub const UNLOCK_INCREMENT_ID: u8 = 255;

/// Increment id meaning "lock now" (SET_CREDIT only).
pub const LOCK_INCREMENT_ID: u8 = 254;

/// Largest day count an ADD_CREDIT body can encode.
pub const MAX_ADD_CREDIT_DAYS: u16 = 405;

/// Largest day count a SET_CREDIT body can encode.
pub const MAX_SET_CREDIT_DAYS: u16 = 960;

/// 2-bit message type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SmallMessageType {
    /// Add days of credit (applied at most once per id).
    AddCredit = 0,
    /// Opaque 26-bit application payload.
    Passthrough = 1,
    /// Set the credit balance outright (applied at most once per id).
    SetCredit = 2,
    /// Maintenance or test action (repeatable).
    MaintenanceTest = 3,
}

/// A credit amount for the quantised day encoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credit {
    /// A specific number of days. `Days(0)` means "lock" and is only
    /// valid for SET_CREDIT.
    Days(u16),
    /// Unlock the device forever.
    Unlock,
}

/// Maintenance actions (body high bit set).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MaintenanceAction {
    /// Wipe state, except the received-messages bitmask.
    WipeState0 = 0,
    /// Wipe state, including the received-messages bitmask.
    WipeState1 = 1,
    /// Clear only the received-messages bitmask.
    WipeIdsAll = 2,
}

/// Test actions (body high bit clear); always keyed with the fixed
/// all-`0xFF` key so any factory can reproduce them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TestAction {
    /// Short self-test.
    ShortTest = 0,
    /// Outgoing-quality-control test.
    OqcTest = 1,
}

/// Custom commands carried as SET_CREDIT messages with increment ids in
/// the reserved 240..=253 band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CustomCommand {
    /// Clear the application-specific 'restricted' flag.
    WipeRestrictedFlag = 253,
}

/// Rendering options for [`SmallMessage::to_keycode_with`].
#[derive(Debug, Clone)]
pub struct SmallKeycodeOptions {
    /// Keycode start character(s); must be non-empty.
    pub prefix: String,
    /// Separator between digit groups.
    pub separator: String,
    /// Digits per group; zero disables grouping.
    pub group_len: usize,
    /// Keypad characters for the two-bit values 0..=3. The defaults avoid
    /// `0` and `1`, which the device prefix grammar reserves.
    pub key_map: [char; 4],
    /// Whether to apply bit-level obscuring (the default).
    pub obscured: bool,
}

impl Default for SmallKeycodeOptions {
    fn default() -> Self {
        Self {
            prefix: "1".to_owned(),
            separator: " ".to_owned(),
            group_len: 3,
            key_map: ['2', '3', '4', '5'],
            obscured: true,
        }
    }
}

/// An immutable Small-protocol message, ready to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmallMessage {
    id: u32,
    message_type: SmallMessageType,
    bits: u32,
}

impl SmallMessage {
    /// Add days of credit.
    pub fn add_credit(id: u32, credit: Credit, secret_key: &SecretKey) -> Result<Self> {
        let body = add_credit_increment_id(credit)?;
        Ok(Self::authenticated(id, SmallMessageType::AddCredit, body, secret_key))
    }

    /// Set the credit balance. `Credit::Days(0)` locks the device.
    pub fn set_credit(id: u32, credit: Credit, secret_key: &SecretKey) -> Result<Self> {
        if id & 0x3F == 63 && credit == Credit::Days(1) {
            // Devices parse this shape as a legacy test keycode (SET_CREDIT,
            // increment 0, id 63). Callers should bump the id and retry.
            return Err(ProtocolError::PossibleMessageCollision);
        }
        let body = set_credit_increment_id(credit)?;
        Ok(Self::authenticated(id, SmallMessageType::SetCredit, body, secret_key))
    }

    /// Unlock the device forever (ADD_CREDIT with the unlock sentinel).
    #[must_use]
    pub fn unlock(id: u32, secret_key: &SecretKey) -> Self {
        Self::authenticated(id, SmallMessageType::AddCredit, UNLOCK_INCREMENT_ID, secret_key)
    }

    /// Issue a custom command from the reserved SET_CREDIT increment band.
    #[must_use]
    pub fn custom_command(id: u32, command: CustomCommand, secret_key: &SecretKey) -> Self {
        Self::authenticated(id, SmallMessageType::SetCredit, command as u8, secret_key)
    }

    /// Maintenance action; always id 0, body high bit set.
    #[must_use]
    pub fn maintenance(action: MaintenanceAction, secret_key: &SecretKey) -> Self {
        Self::authenticated(0, SmallMessageType::MaintenanceTest, 0x80 | action as u8, secret_key)
    }

    /// Test action; always id 0, keyed with the fixed test key.
    #[must_use]
    pub fn test(action: TestAction) -> Self {
        Self::authenticated(0, SmallMessageType::MaintenanceTest, action as u8, &TEST_KEY)
    }

    /// Wrap a 26-bit opaque payload in passthrough framing.
    ///
    /// The first 6 payload bits land ahead of the fixed `01` type bits,
    /// the remaining 20 behind them. No MAC is added; the embedded
    /// application is responsible for integrity.
    pub fn passthrough(payload: u32) -> Result<Self> {
        if payload >> 26 != 0 {
            return Err(ProtocolError::OutOfRangeBodyValue {
                field: "passthrough payload",
                value: u64::from(payload),
            });
        }

        let bits = ((payload >> 20) << 22)
            | ((SmallMessageType::Passthrough as u32) << 20)
            | (payload & 0xF_FFFF);
        Ok(Self { id: 0, message_type: SmallMessageType::Passthrough, bits })
    }

    /// Full (expanded) message id.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Wire message type.
    #[must_use]
    pub fn message_type(&self) -> SmallMessageType {
        self.message_type
    }

    /// The 28 transmitted bits, unobscured, in the low bits of the word.
    #[must_use]
    pub fn transmitted_bits(&self) -> u32 {
        self.bits
    }

    /// Render with default formatting: prefix `1`, keys `2345`, obscured.
    #[must_use]
    pub fn to_keycode(&self) -> String {
        self.render(&SmallKeycodeOptions::default())
    }

    /// Render with explicit formatting options.
    pub fn to_keycode_with(&self, options: &SmallKeycodeOptions) -> Result<String> {
        if options.prefix.is_empty() {
            return Err(ProtocolError::EmptyKeycodePrefix);
        }
        Ok(self.render(options))
    }

    fn render(&self, options: &SmallKeycodeOptions) -> String {
        let bits = if options.obscured { obscure_small_bits(self.bits) } else { self.bits };

        let mut digits = options.prefix.clone();
        for value in quaternary_values(bits) {
            digits.push(options.key_map[usize::from(value)]);
        }
        group_digits(&digits, options.group_len, &options.separator)
    }

    /// MAC over 6 bytes: the full 32-bit id little-endian, the type byte,
    /// and the body byte. The top 12 hash bits are transmitted.
    fn authenticated(
        id: u32,
        message_type: SmallMessageType,
        body: u8,
        secret_key: &SecretKey,
    ) -> Self {
        let mut input = [0u8; 6];
        input[..4].copy_from_slice(&id.to_le_bytes());
        input[4] = message_type as u8;
        input[5] = body;
        let mac = (siphash24(secret_key, &input) >> 52) as u32;

        let bits = ((id & 0x3F) << 22)
            | ((message_type as u32) << 20)
            | (u32::from(body) << 12)
            | mac;
        Self { id, message_type, bits }
    }
}

/// Map a credit amount to an ADD_CREDIT increment id.
pub fn add_credit_increment_id(credit: Credit) -> Result<u8> {
    const COARSE_DAYS_PER_INCREMENT: u16 = 3;
    match credit {
        Credit::Unlock => Ok(UNLOCK_INCREMENT_ID),
        Credit::Days(days @ 1..=180) => Ok((days - 1) as u8),
        Credit::Days(days @ 181..=MAX_ADD_CREDIT_DAYS) => {
            Ok((180 + (days - 181) / COARSE_DAYS_PER_INCREMENT) as u8)
        },
        Credit::Days(days) => {
            Err(ProtocolError::OutOfRangeBodyValue { field: "days", value: u64::from(days) })
        },
    }
}

/// Map a credit amount to a SET_CREDIT increment id.
///
/// The SET ranges are wider than ADD and coarser as they grow; 0 days
/// locks the device.
pub fn set_credit_increment_id(credit: Credit) -> Result<u8> {
    match credit {
        Credit::Unlock => Ok(UNLOCK_INCREMENT_ID),
        Credit::Days(0) => Ok(LOCK_INCREMENT_ID),
        Credit::Days(days @ 1..=90) => Ok((days - 1) as u8),
        Credit::Days(days @ 91..=180) => Ok((90 + (days - 91) / 2) as u8),
        Credit::Days(days @ 181..=360) => Ok((135 + (days - 181) / 4) as u8),
        Credit::Days(days @ 361..=720) => Ok((180 + (days - 361) / 8) as u8),
        Credit::Days(days @ 721..=MAX_SET_CREDIT_DAYS) => Ok((225 + (days - 721) / 16) as u8),
        Credit::Days(days) => {
            Err(ProtocolError::OutOfRangeBodyValue { field: "days", value: u64::from(days) })
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ab_key() -> SecretKey {
        SecretKey::new([0xAB; 16])
    }

    fn deadbeef_key() -> SecretKey {
        SecretKey::from_bytes(&[0xDE, 0xAD, 0xBE, 0xEF].repeat(4)).unwrap()
    }

    fn leading_16_bits(message: &SmallMessage) -> u16 {
        (message.transmitted_bits() >> 12) as u16
    }

    #[test]
    fn add_credit_one_day() {
        let msg = SmallMessage::add_credit(0, Credit::Days(1), &ab_key()).unwrap();
        assert_eq!(leading_16_bits(&msg), 0b0000_0000_0000_0000);
        assert_eq!(msg.to_keycode(), "133 232 343 432 255");
    }

    #[test]
    fn add_credit_fine_range_upper_bound() {
        let msg = SmallMessage::add_credit(1, Credit::Days(180), &ab_key()).unwrap();
        assert_eq!(leading_16_bits(&msg), 0b0000_0100_1011_0011);
        assert_eq!(msg.to_keycode(), "122 425 324 553 555");
    }

    #[test]
    fn add_credit_coarse_range() {
        let msg = SmallMessage::add_credit(10, Credit::Days(181), &ab_key()).unwrap();
        assert_eq!(leading_16_bits(&msg), 0b0010_1000_1011_0100);
        assert_eq!(msg.to_keycode(), "132 353 543 455 243");

        let msg = SmallMessage::add_credit(125, Credit::Days(405), &ab_key()).unwrap();
        assert_eq!(leading_16_bits(&msg), 0b1111_0100_1111_1110);
        assert_eq!(msg.to_keycode(), "132 335 454 524 233");
    }

    #[test]
    fn add_credit_large_id_truncates_to_six_bits() {
        let msg = SmallMessage::add_credit(65_234, Credit::Days(405), &ab_key()).unwrap();
        assert_eq!(leading_16_bits(&msg), 0b0100_1000_1111_1110);
        assert_eq!(msg.to_keycode(), "143 235 545 435 454");
    }

    #[test]
    fn add_credit_unlock_sentinel() {
        let msg = SmallMessage::add_credit(1, Credit::Unlock, &ab_key()).unwrap();
        assert_eq!(leading_16_bits(&msg), 0b0000_0100_1111_1111);
        assert_eq!(msg.to_keycode(), "134 435 355 535 552");

        // unlock() is the same message
        assert_eq!(SmallMessage::unlock(1, &ab_key()), msg);
    }

    #[test]
    fn add_credit_day_bounds() {
        assert!(SmallMessage::add_credit(0, Credit::Days(0), &ab_key()).is_err());
        assert!(SmallMessage::add_credit(0, Credit::Days(406), &ab_key()).is_err());
    }

    #[test]
    fn add_credit_reference_vector() {
        let msg = SmallMessage::add_credit(42, Credit::Days(7), &deadbeef_key()).unwrap();
        assert_eq!(msg.to_keycode(), "135 242 422 455 244");
    }

    #[test]
    fn set_credit_one_day() {
        let msg = SmallMessage::set_credit(0, Credit::Days(1), &ab_key()).unwrap();
        assert_eq!(leading_16_bits(&msg), 0b0000_0010_0000_0000);
        assert_eq!(msg.to_keycode(), "142 525 352 252 234");
    }

    #[test]
    fn set_credit_two_day_granularity_range() {
        let msg = SmallMessage::set_credit(1, Credit::Days(92), &ab_key()).unwrap();
        assert_eq!(leading_16_bits(&msg), 0b0000_0110_0101_1010);
        assert_eq!(msg.to_keycode(), "124 445 543 325 325");
    }

    #[test]
    fn set_credit_lock() {
        let msg = SmallMessage::set_credit(1542, Credit::Days(0), &ab_key()).unwrap();
        assert_eq!(leading_16_bits(&msg), 0b0001_1010_1111_1110);
        assert_eq!(msg.to_keycode(), "154 445 453 335 225");
    }

    #[test]
    fn set_credit_unlock_sentinel() {
        let msg = SmallMessage::set_credit(6573, Credit::Unlock, &ab_key()).unwrap();
        assert_eq!(leading_16_bits(&msg), 0b1011_0110_1111_1111);
        assert_eq!(msg.to_keycode(), "143 534 323 324 344");
    }

    #[test]
    fn set_credit_day_bounds() {
        assert!(SmallMessage::set_credit(0, Credit::Days(961), &ab_key()).is_err());
        assert!(SmallMessage::set_credit(0, Credit::Days(1185), &ab_key()).is_err());
        assert!(SmallMessage::set_credit(0, Credit::Days(960), &ab_key()).is_ok());
    }

    #[test]
    fn set_credit_reference_vector() {
        let msg = SmallMessage::set_credit(44, Credit::Days(10), &deadbeef_key()).unwrap();
        assert_eq!(msg.to_keycode(), "142 522 332 234 533");
    }

    #[test]
    fn set_credit_legacy_test_code_collision_rejected() {
        let err = SmallMessage::set_credit(63, Credit::Days(1), &TEST_KEY).unwrap_err();
        assert_eq!(err, ProtocolError::PossibleMessageCollision);

        // every id whose low 6 bits are 63 collides
        assert!(SmallMessage::set_credit(703, Credit::Days(1), &ab_key()).is_err());
        // other day counts are fine
        assert!(SmallMessage::set_credit(63, Credit::Days(2), &ab_key()).is_ok());
    }

    #[test]
    fn unlock_reference_vector() {
        let msg = SmallMessage::unlock(45, &deadbeef_key());
        assert_eq!(msg.to_keycode(), "152 323 254 454 322");
    }

    #[test]
    fn maintenance_bodies_set_high_bit() {
        let msg = SmallMessage::maintenance(MaintenanceAction::WipeState0, &ab_key());
        assert_eq!(leading_16_bits(&msg), 0b0000_0011_1000_0000);
        assert_eq!(msg.to_keycode(), "122 553 254 245 542");

        let msg = SmallMessage::maintenance(MaintenanceAction::WipeState1, &ab_key());
        assert_eq!(leading_16_bits(&msg), 0b0000_0011_1000_0001);
        assert_eq!(msg.to_keycode(), "154 434 534 522 522");

        let msg = SmallMessage::maintenance(MaintenanceAction::WipeIdsAll, &ab_key());
        assert_eq!(leading_16_bits(&msg), 0b0000_0011_1000_0010);
        assert_eq!(msg.to_keycode(), "153 224 344 342 322");

        let msg = SmallMessage::maintenance(MaintenanceAction::WipeIdsAll, &deadbeef_key());
        assert_eq!(msg.to_keycode(), "122 324 235 545 545");
    }

    #[test]
    fn test_messages_use_fixed_key() {
        let msg = SmallMessage::test(TestAction::ShortTest);
        assert_eq!(leading_16_bits(&msg), 0b0000_0011_0000_0000);
        assert_eq!(msg.to_keycode(), "143 253 222 433 244");

        let msg = SmallMessage::test(TestAction::OqcTest);
        assert_eq!(leading_16_bits(&msg), 0b0000_0011_0000_0001);
        assert_eq!(msg.to_keycode(), "124 233 243 522 424");
    }

    #[test]
    fn custom_command_uses_reserved_increment() {
        let msg = SmallMessage::custom_command(12, CustomCommand::WipeRestrictedFlag, &ab_key());
        assert_eq!(msg.message_type(), SmallMessageType::SetCredit);
        assert_eq!((msg.transmitted_bits() >> 12) & 0xFF, 253);
    }

    #[test]
    fn passthrough_carries_payload_around_type_bits() {
        let payload = 0b10_1010_0000_0000_0000_0000_1111;
        let msg = SmallMessage::passthrough(payload).unwrap();

        let bits = msg.transmitted_bits();
        assert_eq!(bits >> 22, 0b10_1010); // first six payload bits
        assert_eq!((bits >> 20) & 0b11, 0b01); // fixed passthrough type
        assert_eq!(bits & 0xF_FFFF, 0b0000_0000_0000_0000_1111); // last twenty
    }

    #[test]
    fn passthrough_payload_must_fit_26_bits() {
        assert!(SmallMessage::passthrough(1 << 26).is_err());
        assert!(SmallMessage::passthrough((1 << 26) - 1).is_ok());
    }

    #[test]
    fn keycode_rendering_options() {
        // days 11 encodes increment id 10
        let msg = SmallMessage::add_credit(100, Credit::Days(11), &TEST_KEY).unwrap();
        assert_eq!(msg.to_keycode(), "152 424 422 522 322");

        let literal = SmallKeycodeOptions {
            prefix: "4".to_owned(),
            key_map: ['0', '1', '2', '3'],
            ..SmallKeycodeOptions::default()
        };
        assert_eq!(msg.to_keycode_with(&literal).unwrap(), "430 202 200 300 100");
    }

    #[test]
    fn empty_prefix_rejected() {
        let msg = SmallMessage::add_credit(100, Credit::Days(11), &ab_key()).unwrap();
        let options = SmallKeycodeOptions { prefix: String::new(), ..SmallKeycodeOptions::default() };
        assert_eq!(msg.to_keycode_with(&options).unwrap_err(), ProtocolError::EmptyKeycodePrefix);
    }

    #[test]
    fn long_keys_truncate_to_sixteen_bytes() {
        let mut material = [0xFB, 0x00, 0xA5, 0x98].repeat(4);
        let short = SecretKey::from_bytes(&material).unwrap();
        material.extend([0x02, 0x03, 0x04, 0x05].repeat(4));
        let long = SecretKey::from_bytes(&material).unwrap();

        let a = SmallMessage::add_credit(343, Credit::Days(21), &short).unwrap();
        let b = SmallMessage::add_credit(343, Credit::Days(21), &long).unwrap();
        assert_eq!(a.to_keycode(), b.to_keycode());
    }
}
