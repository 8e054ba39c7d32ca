//! Channel Origin command tokens.
//!
//! An origin command is authenticated data sent from a backend (the
//! "origin") to a controller device, sometimes relayed onward to a linked
//! accessory. Tokens are usually borne as decimal digits inside a Full
//! passthrough keycode; one special command travels as a 26-bit Smallpad
//! payload instead. Every token carries its own integrity check — the
//! passthrough layers underneath validate nothing.
//!
//! ASCII-borne tokens take the form
//!
//! ```text
//! [1-digit command type][N-digit body][6-digit auth]
//! ```
//!
//! where the auth digits use the same low-32-bit decimal truncation as
//! Full-protocol MACs.

use nexus_crypto::{SecretKey, siphash24};

use crate::digits::{decimal_value, truncated_mac_digits};
use crate::errors::{ProtocolError, Result};
use crate::small::{Credit, SmallMessage, set_credit_increment_id};

/// A 48-bit device identifier: a 16-bit authority id over a 32-bit device
/// id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NexusId(u64);

impl NexusId {
    /// Wrap a raw 48-bit identifier; values above 48 bits are rejected.
    pub fn new(raw: u64) -> Result<Self> {
        if raw >> 48 != 0 {
            return Err(ProtocolError::OutOfRangeId { id: raw });
        }
        Ok(Self(raw))
    }

    /// The issuing authority (high 16 bits).
    #[must_use]
    pub fn authority_id(self) -> u16 {
        (self.0 >> 32) as u16
    }

    /// The device id (low 32 bits).
    #[must_use]
    pub fn device_id(self) -> u32 {
        (self.0 & 0xFFFF_FFFF) as u32
    }

    /// The single digit transmitted on the wire: the last decimal digit
    /// of the device id. Receivers expand it against their link table.
    #[must_use]
    pub fn truncated_digit(self) -> u8 {
        (self.device_id() % 10) as u8
    }
}

/// Wire type codes for origin commands. Types 0-9 fit in a keycode digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OriginCommandType {
    /// Controller-wide action; the body names the specific action.
    GenericControllerAction = 0,
    /// Unlock one linked accessory.
    UnlockAccessory = 1,
    /// Unlink one linked accessory.
    UnlinkAccessory = 2,
    /// Link an accessory via challenge mode 3.
    LinkAccessoryMode3 = 9,
}

/// Actions carried inside a generic controller command. The values are
/// hashed on the device side; renumbering is a breaking change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum GenericControllerActionType {
    /// Delete all accessory links from the receiving controller.
    UnlinkAllAccessories = 0,
    /// Unlock every accessory linked to the receiving controller.
    UnlockAllAccessories = 1,
    /// Set credit and wipe the 'restricted' flag (Smallpad bearer only).
    KeycodeSetCreditWipeRestrictedFlag = 6,
}

/// How a token travels to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginCommandBearer {
    /// Decimal digits 0-9 inside a Full passthrough keycode.
    AsciiDigits,
    /// A 26-bit payload inside a Small passthrough keycode.
    SmallpadBits,
}

/// Token body, shaped by the bearer.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenBody {
    /// Decimal digits between the type digit and the auth digits.
    Digits(String),
    /// 13 body bits for the Smallpad payload.
    Smallpad(u16),
}

/// An authenticated origin command, ready to render.
///
/// The auth field is kept as the raw 64-bit hash; digit or bit forms are
/// derived on demand by the renderers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOriginCommandToken {
    command_type: OriginCommandType,
    body: TokenBody,
    auth: u64,
}

impl ChannelOriginCommandToken {
    /// Delete all accessory links on the receiving controller.
    #[must_use]
    pub fn unlink_all_accessories(
        controller_command_count: u32,
        controller_key: &SecretKey,
    ) -> Self {
        Self::generic_controller_action(
            GenericControllerActionType::UnlinkAllAccessories,
            controller_command_count,
            controller_key,
        )
    }

    /// Unlock every accessory linked to the receiving controller.
    #[must_use]
    pub fn unlock_all_accessories(
        controller_command_count: u32,
        controller_key: &SecretKey,
    ) -> Self {
        Self::generic_controller_action(
            GenericControllerActionType::UnlockAllAccessories,
            controller_command_count,
            controller_key,
        )
    }

    /// Unlock one specific linked accessory.
    #[must_use]
    pub fn unlock_accessory(
        accessory_id: NexusId,
        controller_command_count: u32,
        controller_key: &SecretKey,
    ) -> Self {
        Self::specific_accessory(
            OriginCommandType::UnlockAccessory,
            accessory_id,
            controller_command_count,
            controller_key,
        )
    }

    /// Unlink one specific linked accessory.
    #[must_use]
    pub fn unlink_accessory(
        accessory_id: NexusId,
        controller_command_count: u32,
        controller_key: &SecretKey,
    ) -> Self {
        Self::specific_accessory(
            OriginCommandType::UnlinkAccessory,
            accessory_id,
            controller_command_count,
            controller_key,
        )
    }

    /// Build a mode-3 link challenge token.
    ///
    /// Two authentications: the 6 challenge digits are computed under the
    /// accessory's key over its command count, for the accessory to
    /// verify; the outer auth is computed under the controller's key over
    /// the truncated accessory id and the challenge digits (read as an
    /// integer), so the controller can vet the token before relaying the
    /// challenge.
    #[must_use]
    pub fn link_accessory_mode_3(
        accessory_id: NexusId,
        controller_command_count: u32,
        accessory_command_count: u32,
        accessory_key: &SecretKey,
        controller_key: &SecretKey,
    ) -> Self {
        let challenge =
            siphash24(accessory_key, &accessory_command_count.to_le_bytes());
        let challenge_digits = truncated_mac_digits(challenge);
        let truncated_id = accessory_id.truncated_digit();

        let mut input = [0u8; 10];
        input[..4].copy_from_slice(&controller_command_count.to_le_bytes());
        input[4] = OriginCommandType::LinkAccessoryMode3 as u8;
        input[5] = truncated_id;
        input[6..].copy_from_slice(&decimal_value(&challenge_digits).to_le_bytes());
        let auth = siphash24(controller_key, &input);

        Self {
            command_type: OriginCommandType::LinkAccessoryMode3,
            body: TokenBody::Digits(format!("{truncated_id}{challenge_digits}")),
            auth,
        }
    }

    /// Set credit and wipe the 'restricted' flag, borne as Smallpad bits.
    ///
    /// The 13-bit body is the origin type (0), the fixed action marker
    /// `0b11`, and the SET_CREDIT increment id for `credit`.
    pub fn set_credit_wipe_restricted_flag(
        credit: Credit,
        controller_command_count: u32,
        controller_key: &SecretKey,
    ) -> Result<Self> {
        let increment_id = set_credit_increment_id(credit)?;
        let auth = Self::generic_action_auth(
            GenericControllerActionType::KeycodeSetCreditWipeRestrictedFlag,
            u16::from(increment_id),
            controller_command_count,
            controller_key,
        );

        let body = ((OriginCommandType::GenericControllerAction as u16) << 10)
            | (0b11 << 8)
            | u16::from(increment_id);
        Ok(Self {
            command_type: OriginCommandType::GenericControllerAction,
            body: TokenBody::Smallpad(body),
            auth,
        })
    }

    /// Wire type code digit.
    #[must_use]
    pub fn type_code(&self) -> u8 {
        self.command_type as u8
    }

    /// Body digits for ASCII-borne tokens.
    #[must_use]
    pub fn body_digits(&self) -> Option<&str> {
        match &self.body {
            TokenBody::Digits(digits) => Some(digits),
            TokenBody::Smallpad(_) => None,
        }
    }

    /// Raw 64-bit auth hash.
    #[must_use]
    pub fn auth(&self) -> u64 {
        self.auth
    }

    /// The 6 auth digits transmitted for ASCII-borne tokens.
    #[must_use]
    pub fn auth_digits(&self) -> String {
        truncated_mac_digits(self.auth)
    }

    /// Which bearer this token renders through.
    #[must_use]
    pub fn bearer(&self) -> OriginCommandBearer {
        match self.body {
            TokenBody::Digits(_) => OriginCommandBearer::AsciiDigits,
            TokenBody::Smallpad(_) => OriginCommandBearer::SmallpadBits,
        }
    }

    /// Render the transmissible form of this token.
    ///
    /// ASCII tokens render as bare digits, to be placed in the body of a
    /// Full passthrough keycode. Smallpad tokens render as a complete
    /// Small-protocol keycode.
    #[must_use]
    pub fn to_digits(&self) -> String {
        match &self.body {
            TokenBody::Digits(body) => {
                format!("{}{body}{}", self.type_code(), self.auth_digits())
            },
            TokenBody::Smallpad(body) => {
                let payload =
                    (1u32 << 25) | (u32::from(*body) << 12) | ((self.auth >> 52) as u32);
                let message = SmallMessage::passthrough(payload)
                    .unwrap_or_else(|_| unreachable!("payload is 26 bits by construction"));
                message.to_keycode()
            },
        }
    }

    /// Generic controller action with no action data (ASCII bearer).
    fn generic_controller_action(
        action: GenericControllerActionType,
        controller_command_count: u32,
        controller_key: &SecretKey,
    ) -> Self {
        let auth =
            Self::generic_action_auth(action, 0, controller_command_count, controller_key);
        Self {
            command_type: OriginCommandType::GenericControllerAction,
            body: TokenBody::Digits(format!("{:02}", action as u16)),
            auth,
        }
    }

    /// Auth over 9 bytes: command count, origin type byte, the 16-bit
    /// action id, and 16 bits of action data, all little-endian.
    fn generic_action_auth(
        action: GenericControllerActionType,
        action_data: u16,
        controller_command_count: u32,
        controller_key: &SecretKey,
    ) -> u64 {
        let mut input = [0u8; 9];
        input[..4].copy_from_slice(&controller_command_count.to_le_bytes());
        input[4] = OriginCommandType::GenericControllerAction as u8;
        input[5..7].copy_from_slice(&(action as u16).to_le_bytes());
        input[7..].copy_from_slice(&action_data.to_le_bytes());
        siphash24(controller_key, &input)
    }

    /// Auth over 11 bytes: command count, origin type byte, then the
    /// expanded accessory identity (authority id, device id). The receiver
    /// looks the full identity up from the transmitted truncated digit.
    fn specific_accessory(
        command_type: OriginCommandType,
        accessory_id: NexusId,
        controller_command_count: u32,
        controller_key: &SecretKey,
    ) -> Self {
        let mut input = [0u8; 11];
        input[..4].copy_from_slice(&controller_command_count.to_le_bytes());
        input[4] = command_type as u8;
        input[5..7].copy_from_slice(&accessory_id.authority_id().to_le_bytes());
        input[7..].copy_from_slice(&accessory_id.device_id().to_le_bytes());
        let auth = siphash24(controller_key, &input);

        Self {
            command_type,
            body: TokenBody::Digits(accessory_id.truncated_digit().to_string()),
            auth,
        }
    }
}

/// The business-visible origin actions, each variant carrying exactly the
/// parameters its token needs.
#[derive(Debug, Clone, Copy)]
pub enum ChannelOriginAction<'k> {
    /// Delete all accessory links.
    UnlinkAllAccessories {
        /// Controller origin-command counter.
        controller_command_count: u32,
        /// Controller symmetric key.
        controller_key: &'k SecretKey,
    },
    /// Unlock every linked accessory.
    UnlockAllAccessories {
        /// Controller origin-command counter.
        controller_command_count: u32,
        /// Controller symmetric key.
        controller_key: &'k SecretKey,
    },
    /// Unlock one linked accessory.
    UnlockAccessory {
        /// The accessory to unlock.
        accessory_id: NexusId,
        /// Controller origin-command counter.
        controller_command_count: u32,
        /// Controller symmetric key.
        controller_key: &'k SecretKey,
    },
    /// Unlink one linked accessory.
    UnlinkAccessory {
        /// The accessory to unlink.
        accessory_id: NexusId,
        /// Controller origin-command counter.
        controller_command_count: u32,
        /// Controller symmetric key.
        controller_key: &'k SecretKey,
    },
    /// Link an accessory via challenge mode 3.
    LinkAccessoryMode3 {
        /// The accessory to link.
        accessory_id: NexusId,
        /// Controller origin-command counter.
        controller_command_count: u32,
        /// Accessory origin-command counter.
        accessory_command_count: u32,
        /// Accessory symmetric key.
        accessory_key: &'k SecretKey,
        /// Controller symmetric key.
        controller_key: &'k SecretKey,
    },
    /// Set credit and wipe the 'restricted' flag (Smallpad bearer).
    KeycodeSetCreditWipeRestrictedFlag {
        /// Credit to set.
        credit: Credit,
        /// Controller origin-command counter.
        controller_command_count: u32,
        /// Controller symmetric key.
        controller_key: &'k SecretKey,
    },
}

impl ChannelOriginAction<'_> {
    /// Build the token for this action.
    pub fn build(&self) -> Result<ChannelOriginCommandToken> {
        match *self {
            Self::UnlinkAllAccessories { controller_command_count, controller_key } => {
                Ok(ChannelOriginCommandToken::unlink_all_accessories(
                    controller_command_count,
                    controller_key,
                ))
            },
            Self::UnlockAllAccessories { controller_command_count, controller_key } => {
                Ok(ChannelOriginCommandToken::unlock_all_accessories(
                    controller_command_count,
                    controller_key,
                ))
            },
            Self::UnlockAccessory { accessory_id, controller_command_count, controller_key } => {
                Ok(ChannelOriginCommandToken::unlock_accessory(
                    accessory_id,
                    controller_command_count,
                    controller_key,
                ))
            },
            Self::UnlinkAccessory { accessory_id, controller_command_count, controller_key } => {
                Ok(ChannelOriginCommandToken::unlink_accessory(
                    accessory_id,
                    controller_command_count,
                    controller_key,
                ))
            },
            Self::LinkAccessoryMode3 {
                accessory_id,
                controller_command_count,
                accessory_command_count,
                accessory_key,
                controller_key,
            } => Ok(ChannelOriginCommandToken::link_accessory_mode_3(
                accessory_id,
                controller_command_count,
                accessory_command_count,
                accessory_key,
                controller_key,
            )),
            Self::KeycodeSetCreditWipeRestrictedFlag {
                credit,
                controller_command_count,
                controller_key,
            } => ChannelOriginCommandToken::set_credit_wipe_restricted_flag(
                credit,
                controller_command_count,
                controller_key,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTROLLER_COMMAND_COUNT: u32 = 15;
    const ACCESSORY_COMMAND_COUNT: u32 = 312;

    fn controller_key() -> SecretKey {
        let mut key = [0xFE; 16];
        key[8..].fill(0xA2);
        SecretKey::new(key)
    }

    fn accessory_key() -> SecretKey {
        let mut key = [0xFA; 16];
        key[8..].fill(0x01);
        SecretKey::new(key)
    }

    // authority 0x0102, device 0x94837158; device id ends in decimal 0
    fn accessory_id() -> NexusId {
        NexusId::new(0x0102_9483_7158).unwrap()
    }

    #[test]
    fn nexus_id_fields() {
        let id = accessory_id();
        assert_eq!(id.authority_id(), 0x0102);
        assert_eq!(id.device_id(), 0x9483_7158);
        assert_eq!(id.truncated_digit(), 0);

        assert_eq!(NexusId::new(0x1200_0382_7125).unwrap().truncated_digit(), 3);
        assert!(NexusId::new(1 << 48).is_err());
    }

    #[test]
    fn unlink_all_accessories_token() {
        let token = ChannelOriginCommandToken::unlink_all_accessories(
            CONTROLLER_COMMAND_COUNT,
            &controller_key(),
        );

        assert_eq!(token.type_code(), 0);
        assert_eq!(token.body_digits(), Some("00"));
        assert_eq!(token.bearer(), OriginCommandBearer::AsciiDigits);
        assert_eq!(token.auth_digits(), "018783");
        assert_eq!(token.to_digits(), "000018783");
    }

    #[test]
    fn unlock_all_accessories_token() {
        let token = ChannelOriginCommandToken::unlock_all_accessories(
            CONTROLLER_COMMAND_COUNT,
            &controller_key(),
        );

        assert_eq!(token.type_code(), 0);
        assert_eq!(token.body_digits(), Some("01"));
        assert_eq!(token.auth_digits(), "906394");
        assert_eq!(token.to_digits(), "001906394");
    }

    #[test]
    fn unlink_accessory_token() {
        let token = ChannelOriginCommandToken::unlink_accessory(
            accessory_id(),
            CONTROLLER_COMMAND_COUNT,
            &controller_key(),
        );

        assert_eq!(token.type_code(), 2);
        assert_eq!(token.body_digits(), Some("0"));
        assert_eq!(token.auth_digits(), "536545");
        assert_eq!(token.to_digits(), "20536545");
    }

    #[test]
    fn unlock_accessory_token() {
        let token = ChannelOriginCommandToken::unlock_accessory(
            accessory_id(),
            CONTROLLER_COMMAND_COUNT,
            &controller_key(),
        );

        assert_eq!(token.type_code(), 1);
        assert_eq!(token.body_digits(), Some("0"));
        assert_eq!(token.auth_digits(), "244210");
        assert_eq!(token.to_digits(), "10244210");
    }

    #[test]
    fn specific_accessory_tokens_with_other_identity() {
        let key = {
            let mut key = [0x00; 16];
            key[8..].fill(0x17);
            SecretKey::new(key)
        };
        let id = NexusId::new(0x1200_0382_7125).unwrap(); // truncated '3'

        let token = ChannelOriginCommandToken::unlink_accessory(id, 2000, &key);
        assert_eq!(token.body_digits(), Some("3"));
        assert_eq!(token.auth_digits(), "228427");
        assert_eq!(token.to_digits(), "23228427");

        let token = ChannelOriginCommandToken::unlock_accessory(id, 2000, &key);
        assert_eq!(token.auth_digits(), "046876");
        assert_eq!(token.to_digits(), "13046876");
    }

    #[test]
    fn link_mode_3_token() {
        let token = ChannelOriginCommandToken::link_accessory_mode_3(
            accessory_id(),
            CONTROLLER_COMMAND_COUNT,
            ACCESSORY_COMMAND_COUNT,
            &accessory_key(),
            &controller_key(),
        );

        assert_eq!(token.type_code(), 9);
        // truncated id digit, then the 6 accessory challenge digits
        assert_eq!(token.body_digits(), Some("0445034"));
        assert_eq!(token.auth_digits(), "581275");
        assert_eq!(token.to_digits(), "90445034581275");
    }

    #[test]
    fn link_mode_3_second_identity() {
        let accessory_key = SecretKey::new([
            0xC4, 0xB8, 0x40, 0x48, 0xCF, 0x04, 0x24, 0xA2, 0x5D, 0xC5, 0xE9, 0xD3, 0xF0, 0x67,
            0x40, 0x36,
        ]);
        let token = ChannelOriginCommandToken::link_accessory_mode_3(
            NexusId::new(0x0002_0000_3322).unwrap(), // truncated '0'
            15,
            2,
            &accessory_key,
            &controller_key(),
        );

        assert_eq!(token.body_digits(), Some("0382847"));
        assert_eq!(token.auth_digits(), "429307");
        assert_eq!(token.to_digits(), "90382847429307");
    }

    #[test]
    fn set_credit_wipe_restricted_flag_smallpad_keycodes() {
        // (credit, 13-bit body, rendered Smallpad keycode)
        let scenarios: [(Credit, u16, &str); 7] = [
            (Credit::Days(0), 0b0_0011_1111_1110, "155 323 233 233 234"),
            (Credit::Days(1), 0b0_0011_0000_0000, "134 225 452 425 524"),
            (Credit::Days(7), 0b0_0011_0000_0110, "125 555 223 532 223"),
            (Credit::Days(30), 0b0_0011_0001_1101, "123 522 355 435 224"),
            (Credit::Days(90), 0b0_0011_0101_1001, "154 225 533 455 552"),
            (Credit::Days(960), 0b0_0011_1110_1111, "153 253 222 242 252"),
            (Credit::Unlock, 0b0_0011_1111_1111, "135 223 322 522 343"),
        ];

        for (credit, body, keycode) in scenarios {
            let token = ChannelOriginCommandToken::set_credit_wipe_restricted_flag(
                credit,
                CONTROLLER_COMMAND_COUNT,
                &controller_key(),
            )
            .unwrap();

            assert_eq!(token.bearer(), OriginCommandBearer::SmallpadBits);
            assert_eq!(token.body_digits(), None);
            assert!(matches!(&token.body, TokenBody::Smallpad(bits) if *bits == body));
            assert_eq!(token.to_digits(), keycode, "credit {credit:?}");
        }
    }

    #[test]
    fn action_facade_dispatches() {
        let controller_key = controller_key();
        let accessory_key = accessory_key();

        let token = ChannelOriginAction::UnlinkAllAccessories {
            controller_command_count: CONTROLLER_COMMAND_COUNT,
            controller_key: &controller_key,
        }
        .build()
        .unwrap();
        assert_eq!(token.to_digits(), "000018783");

        let token = ChannelOriginAction::LinkAccessoryMode3 {
            accessory_id: accessory_id(),
            controller_command_count: CONTROLLER_COMMAND_COUNT,
            accessory_command_count: ACCESSORY_COMMAND_COUNT,
            accessory_key: &accessory_key,
            controller_key: &controller_key,
        }
        .build()
        .unwrap();
        assert_eq!(token.to_digits(), "90445034581275");

        let token = ChannelOriginAction::KeycodeSetCreditWipeRestrictedFlag {
            credit: Credit::Days(30),
            controller_command_count: CONTROLLER_COMMAND_COUNT,
            controller_key: &controller_key,
        }
        .build()
        .unwrap();
        assert_eq!(token.to_digits(), "123 522 355 435 224");
    }
}
