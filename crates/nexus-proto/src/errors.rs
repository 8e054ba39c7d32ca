//! Error types for keycode construction and rendering.
//!
//! Every validation failure is a distinct variant so callers can branch on
//! the failure kind. All errors are raised before anything is rendered;
//! construction either yields a complete immutable message or nothing.

use thiserror::Error;

/// Result alias for keycode operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while building or rendering keycode messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A body parameter (hours, days, minutes, payload) is outside the
    /// range its encoding supports.
    #[error("{field} out of range: {value}")]
    OutOfRangeBodyValue {
        /// Which parameter was rejected.
        field: &'static str,
        /// The rejected value.
        value: u64,
    },

    /// A message id cannot be carried by the wire encoding.
    #[error("message id {id} cannot be encoded")]
    OutOfRangeId {
        /// The rejected id.
        id: u64,
    },

    /// A SET_CREDIT small message whose low 6 id bits are 63 and whose
    /// body encodes 1 day is indistinguishable from a legacy test keycode
    /// on the device; bump the id by one and retry.
    #[error("set-credit message id ending in 63 with 1 day collides with legacy test keycodes")]
    PossibleMessageCollision,

    /// A 13-digit passthrough body would render as 14 digits once the
    /// header digit is prepended, which receivers reserve for activation
    /// keycodes.
    #[error("passthrough body of 13 digits is indistinguishable from an activation keycode")]
    PassthroughBodyLengthForbidden,

    /// Passthrough bodies are opaque to the keycode layer but must still
    /// be transcribable on a decimal keypad.
    #[error("passthrough body may only contain decimal digits")]
    PassthroughBodyNotDecimal,

    /// No id in `[requested_id, requested_id + 40)` yields a collision-free
    /// auth field within the device receive window.
    #[error("no collision-free id available in the receive window above {requested_id}")]
    ExtendedSmallMessageIdInvalid {
        /// The id originally requested by the caller.
        requested_id: u32,
    },

    /// Keycode rendering requires at least one prefix character; the
    /// device keypad grammar dispatches on it.
    #[error("keycode prefix must not be empty")]
    EmptyKeycodePrefix,
}
