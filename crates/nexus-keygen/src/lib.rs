//! Generator façade over the Nexus keycode codecs.
//!
//! Thin, parameter-validating entry points used by the command-line
//! drivers and QA tooling: pick a message type by name, hand over the
//! parameters, get back a constructed message to render. All protocol
//! logic lives in [`nexus_proto`]; this crate only dispatches and reports
//! missing or mismatched parameters.

use std::str::FromStr;

use nexus_crypto::{KeyLengthError, SecretKey};
use nexus_proto::errors::ProtocolError;
use nexus_proto::{ChannelOriginAction, Credit, FullMessage, NexusId, SmallMessage};
use thiserror::Error;

/// Errors from the generator entry points.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeneratorError {
    /// The named message type is not one this generator supports.
    #[error("unsupported message type {0:?}")]
    UnsupportedMessageType(String),

    /// A parameter required by the chosen message type was not supplied.
    #[error("message type {message_type} requires {parameter}")]
    MissingParameter {
        /// The chosen message type.
        message_type: &'static str,
        /// The absent parameter.
        parameter: &'static str,
    },

    /// A channel action was requested without the accessory identity it
    /// authenticates against.
    #[error("invalid channel action parameters: {0}")]
    InvalidChannelActionParameters(&'static str),

    /// The underlying codec rejected the parameters.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The supplied key material was too short.
    #[error(transparent)]
    KeyLength(#[from] KeyLengthError),
}

/// Credit keycode types accepted by the credit generators.
///
/// `UNLOCK` is carried as a special case of ADD (Small) or SET (Full) on
/// the wire, but stays a separate type at this surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditMessageType {
    /// Add credit to the device's balance.
    Add,
    /// Set the device's balance outright.
    Set,
    /// Unlock the device forever.
    Unlock,
}

impl FromStr for CreditMessageType {
    type Err = GeneratorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ADD" => Ok(Self::Add),
            "SET" => Ok(Self::Set),
            "UNLOCK" => Ok(Self::Unlock),
            other => Err(GeneratorError::UnsupportedMessageType(other.to_owned())),
        }
    }
}

/// Channel keycode types accepted by [`create_full_channel_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMessageType {
    /// Link an accessory via challenge mode 3.
    Link,
    /// Unlink all accessories from the controller.
    Unlink,
}

impl FromStr for ChannelMessageType {
    type Err = GeneratorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "LINK" => Ok(Self::Link),
            "UNLINK" => Ok(Self::Unlink),
            other => Err(GeneratorError::UnsupportedMessageType(other.to_owned())),
        }
    }
}

/// Accessory-side parameters for channel link commands.
#[derive(Debug, Clone, Copy)]
pub struct AccessoryParams<'k> {
    /// The accessory's 48-bit Nexus id.
    pub nexus_id: NexusId,
    /// The accessory's origin-command counter.
    pub command_count: u32,
    /// The accessory's symmetric key.
    pub key: &'k SecretKey,
}

/// Build a Full-protocol credit message.
///
/// ADD and SET require `hours`; UNLOCK ignores it.
pub fn create_full_credit_message(
    message_id: u32,
    message_type: CreditMessageType,
    secret_key: &SecretKey,
    hours: Option<u32>,
) -> Result<FullMessage, GeneratorError> {
    match message_type {
        CreditMessageType::Add => {
            let hours = hours.ok_or(GeneratorError::MissingParameter {
                message_type: "ADD",
                parameter: "hours",
            })?;
            Ok(FullMessage::add_credit(message_id, hours, secret_key)?)
        },
        CreditMessageType::Set => {
            let hours = hours.ok_or(GeneratorError::MissingParameter {
                message_type: "SET",
                parameter: "hours",
            })?;
            Ok(FullMessage::set_credit(message_id, hours, secret_key)?)
        },
        CreditMessageType::Unlock => Ok(FullMessage::unlock(message_id, secret_key)),
    }
}

/// Build a Small-protocol credit message.
///
/// ADD and SET require `days`; UNLOCK ignores it.
pub fn create_small_credit_message(
    message_id: u32,
    message_type: CreditMessageType,
    secret_key: &SecretKey,
    days: Option<u16>,
) -> Result<SmallMessage, GeneratorError> {
    match message_type {
        CreditMessageType::Add => {
            let days = days.ok_or(GeneratorError::MissingParameter {
                message_type: "ADD",
                parameter: "days",
            })?;
            Ok(SmallMessage::add_credit(message_id, Credit::Days(days), secret_key)?)
        },
        CreditMessageType::Set => {
            let days = days.ok_or(GeneratorError::MissingParameter {
                message_type: "SET",
                parameter: "days",
            })?;
            Ok(SmallMessage::set_credit(message_id, Credit::Days(days), secret_key)?)
        },
        CreditMessageType::Unlock => Ok(SmallMessage::unlock(message_id, secret_key)),
    }
}

/// Build a channel origin command wrapped in a Full passthrough keycode.
///
/// UNLINK maps to "unlink all accessories" and needs only the controller
/// parameters. LINK maps to challenge mode 3 and requires the accessory
/// identity, counter, and key.
pub fn create_full_channel_message(
    message_type: ChannelMessageType,
    controller_key: &SecretKey,
    controller_command_count: u32,
    accessory: Option<AccessoryParams<'_>>,
) -> Result<FullMessage, GeneratorError> {
    let action = match message_type {
        ChannelMessageType::Unlink => ChannelOriginAction::UnlinkAllAccessories {
            controller_command_count,
            controller_key,
        },
        ChannelMessageType::Link => {
            let accessory = accessory.ok_or(GeneratorError::InvalidChannelActionParameters(
                "LINK requires the accessory nexus id, command count, and key",
            ))?;
            ChannelOriginAction::LinkAccessoryMode3 {
                accessory_id: accessory.nexus_id,
                controller_command_count,
                accessory_command_count: accessory.command_count,
                accessory_key: accessory.key,
                controller_key,
            }
        },
    };

    let token = action.build()?;
    Ok(FullMessage::passthrough_channel_origin_command(&token)?)
}
