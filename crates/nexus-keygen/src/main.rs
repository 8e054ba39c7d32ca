//! Nexus keycode generator binary.
//!
//! # Usage
//!
//! ```bash
//! # 30 days of credit for a small-keypad device
//! nexus-keygen small -t ADD -i 0 -k abcdef0011223344556677889900ffee --days 30
//!
//! # one week of credit for a full-keypad device
//! nexus-keygen full -t ADD -i 42 -k abcdef0011223344556677889900ffee --hours 168
//!
//! # link an accessory to a controller
//! nexus-keygen channel -t LINK --controller-key <hex32> --controller-count 15 \
//!     --accessory-key <hex32> --accessory-count 2 --accessory-nexus-id 000200003322
//! ```
//!
//! Secret keys are always 32 lowercase hex characters (16 bytes). The
//! generated keycode is printed on stdout; all logging goes to stderr.

use clap::{Parser, Subcommand, ValueEnum};
use nexus_crypto::SecretKey;
use nexus_keygen::{
    AccessoryParams, ChannelMessageType, CreditMessageType, GeneratorError,
    create_full_channel_message, create_full_credit_message, create_small_credit_message,
};
use nexus_proto::NexusId;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Nexus keycode generator
#[derive(Parser, Debug)]
#[command(name = "nexus-keygen")]
#[command(about = "Generate authenticated keycodes for Nexus PAYG devices")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a Full-protocol (decimal keypad) credit keycode
    Full {
        /// Credit keycode type
        #[arg(short = 't', long, alias = "message_type")]
        message_type: CreditTypeArg,

        /// Keycode message id (e.g. 0, 1, 2, ...)
        #[arg(short = 'i', long, alias = "message_id")]
        message_id: u32,

        /// Hex-encoded 16-byte secret key (32 lowercase hex characters)
        #[arg(short = 'k', long, alias = "secret_key", value_parser = parse_secret_key)]
        secret_key: SecretKey,

        /// Hours of credit; ignored for UNLOCK
        #[arg(long)]
        hours: Option<u32>,
    },

    /// Generate a Small-protocol (4-button keypad) credit keycode
    Small {
        /// Credit keycode type
        #[arg(short = 't', long, alias = "message_type")]
        message_type: CreditTypeArg,

        /// Keycode message id (e.g. 0, 1, 2, ...)
        #[arg(short = 'i', long, alias = "message_id")]
        message_id: u32,

        /// Hex-encoded 16-byte secret key (32 lowercase hex characters)
        #[arg(short = 'k', long, alias = "secret_key", value_parser = parse_secret_key)]
        secret_key: SecretKey,

        /// Days of credit; ignored for UNLOCK
        #[arg(long)]
        days: Option<u16>,
    },

    /// Generate a Channel origin command keycode
    Channel {
        /// Channel keycode type
        #[arg(short = 't', long, alias = "message_type")]
        message_type: ChannelTypeArg,

        /// Controller's hex-encoded 16-byte symmetric key
        #[arg(long, alias = "controller_key", value_parser = parse_secret_key)]
        controller_key: SecretKey,

        /// Controller origin-command counter
        #[arg(long, alias = "controller_count")]
        controller_count: u32,

        /// Accessory's hex-encoded 16-byte symmetric key (LINK only)
        #[arg(long, alias = "accessory_key", value_parser = parse_secret_key)]
        accessory_key: Option<SecretKey>,

        /// Accessory origin-command counter (LINK only)
        #[arg(long, alias = "accessory_count")]
        accessory_count: Option<u32>,

        /// Accessory's 48-bit Nexus id, hex (LINK only)
        #[arg(long, alias = "accessory_nexus_id", value_parser = parse_nexus_id)]
        accessory_nexus_id: Option<NexusId>,
    },
}

/// UNLOCK is carried as a special case of ADD or SET on the wire, but is
/// its own type at this surface.
#[derive(ValueEnum, Clone, Copy, Debug)]
#[value(rename_all = "UPPER")]
enum CreditTypeArg {
    Add,
    Set,
    Unlock,
}

impl From<CreditTypeArg> for CreditMessageType {
    fn from(value: CreditTypeArg) -> Self {
        match value {
            CreditTypeArg::Add => Self::Add,
            CreditTypeArg::Set => Self::Set,
            CreditTypeArg::Unlock => Self::Unlock,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
#[value(rename_all = "UPPER")]
enum ChannelTypeArg {
    Link,
    Unlink,
}

impl From<ChannelTypeArg> for ChannelMessageType {
    fn from(value: ChannelTypeArg) -> Self {
        match value {
            ChannelTypeArg::Link => Self::Link,
            ChannelTypeArg::Unlink => Self::Unlink,
        }
    }
}

fn parse_secret_key(value: &str) -> Result<SecretKey, String> {
    let well_formed = value.len() == 32
        && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
    if !well_formed {
        return Err("secret keys must be exactly 32 lowercase hex characters".to_owned());
    }

    let bytes = hex::decode(value).map_err(|err| err.to_string())?;
    SecretKey::from_bytes(&bytes).map_err(|err| err.to_string())
}

fn parse_nexus_id(value: &str) -> Result<NexusId, String> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    let raw = u64::from_str_radix(digits, 16)
        .map_err(|_| "nexus ids are up to 12 hex characters".to_owned())?;
    NexusId::new(raw).map_err(|err| err.to_string())
}

fn generate(command: Command) -> Result<String, GeneratorError> {
    match command {
        Command::Full { message_type, message_id, secret_key, hours } => {
            tracing::info!(?message_type, message_id, "generating full-protocol keycode");
            let msg = create_full_credit_message(
                message_id,
                message_type.into(),
                &secret_key,
                hours,
            )?;
            Ok(msg.to_keycode())
        },
        Command::Small { message_type, message_id, secret_key, days } => {
            tracing::info!(?message_type, message_id, "generating small-protocol keycode");
            let msg = create_small_credit_message(
                message_id,
                message_type.into(),
                &secret_key,
                days,
            )?;
            Ok(msg.to_keycode())
        },
        Command::Channel {
            message_type,
            controller_key,
            controller_count,
            accessory_key,
            accessory_count,
            accessory_nexus_id,
        } => {
            tracing::info!(?message_type, controller_count, "generating channel keycode");
            let accessory = match (accessory_nexus_id, accessory_count, &accessory_key) {
                (Some(nexus_id), Some(command_count), Some(key)) => {
                    Some(AccessoryParams { nexus_id, command_count, key })
                },
                _ => None,
            };
            let msg = create_full_channel_message(
                message_type.into(),
                &controller_key,
                controller_count,
                accessory,
            )?;
            Ok(msg.to_keycode())
        },
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(filter).init();

    let keycode = generate(args.command)?;
    println!("{keycode}");
    Ok(())
}
