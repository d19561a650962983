//! Unified error type for the glove.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` (behind the `defmt` feature) for efficient
//! on-target logging.

use core::fmt;

use crate::codec::DecodeError;
use crate::transport::TransportError;

/// Top-level error type used across the application.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // Bring-up
    /// The static random address could not be read from the config store.
    AddressUnavailable(TransportError),

    /// The stored address is not a well-formed static random address.
    MalformedAddress,

    /// GATT/GAP/security initialisation was rejected by the stack.
    StackInit(TransportError),

    /// The Grid service or characteristic could not be registered.
    ServiceRegistration(TransportError),

    // Session
    /// Setting the discoverable payload failed.
    AdvertisingFailed(TransportError),

    /// The security request to the peer could not be sent.
    PairingRequestFailed(TransportError),

    /// The passkey response could not be sent.
    PasskeyResponseFailed(TransportError),

    /// The peer reported a failed pairing procedure.
    PairingFailed { status: u8, reason: u8 },

    /// Updating the Grid characteristic value failed.
    TelemetryFailed(TransportError),

    /// A read permit request could not be answered.
    ReadPermitFailed(TransportError),

    /// The outbound request queue was full.
    RequestQueueFull,

    // Data
    /// A Grid write could not be decoded.
    Decode(DecodeError),

    /// A Grid write targeted a non-zero offset.
    UnexpectedOffset(u16),

    /// An event record was truncated or otherwise unreadable.
    MalformedEvent,

    // Hardware
    /// One or more actuator channels rejected a duty update.
    Actuator,
}

/// How the application reacts to an [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Severity {
    /// Bring-up cannot continue: steady fault indicator, no retry.
    Fatal,
    /// Logged and the fault indicator toggled; the session continues.
    Recoverable,
    /// The offending input is logged and discarded.
    Dropped,
}

impl Error {
    pub fn severity(&self) -> Severity {
        match self {
            Error::AddressUnavailable(_)
            | Error::MalformedAddress
            | Error::StackInit(_)
            | Error::ServiceRegistration(_) => Severity::Fatal,
            Error::AdvertisingFailed(_)
            | Error::PairingRequestFailed(_)
            | Error::PasskeyResponseFailed(_)
            | Error::PairingFailed { .. }
            | Error::TelemetryFailed(_)
            | Error::ReadPermitFailed(_)
            | Error::RequestQueueFull
            | Error::Actuator => Severity::Recoverable,
            Error::Decode(_) | Error::UnexpectedOffset(_) | Error::MalformedEvent => {
                Severity::Dropped
            }
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

// Convenience conversions

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Error::Decode(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AddressUnavailable(e) => write!(f, "static random address unavailable: {e}"),
            Error::MalformedAddress => f.write_str("static random address not well formed"),
            Error::StackInit(e) => write!(f, "BLE stack initialisation failed: {e}"),
            Error::ServiceRegistration(e) => write!(f, "Grid service registration failed: {e}"),
            Error::AdvertisingFailed(e) => write!(f, "set discoverable failed: {e}"),
            Error::PairingRequestFailed(e) => write!(f, "security request failed: {e}"),
            Error::PasskeyResponseFailed(e) => write!(f, "passkey response failed: {e}"),
            Error::PairingFailed { status, reason } => {
                write!(f, "pairing failed (status {status:#04x}, reason {reason:#04x})")
            }
            Error::TelemetryFailed(e) => write!(f, "Grid update failed: {e}"),
            Error::ReadPermitFailed(e) => write!(f, "allow read failed: {e}"),
            Error::RequestQueueFull => f.write_str("request queue full"),
            Error::Decode(DecodeError::TooShort { len }) => {
                write!(f, "Grid write too short ({len} bytes)")
            }
            Error::UnexpectedOffset(offset) => write!(f, "Grid write at offset {offset}"),
            Error::MalformedEvent => f.write_str("malformed event record"),
            Error::Actuator => f.write_str("actuator write failed"),
        }
    }
}
