//! WebSocket close codes used by the signaling server.

use crate::SignalingError;
use std::fmt;

/// RFC 6455 normal closure, used by the add-device endpoint.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close codes sent when the server terminates a signaling connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CloseCode {
    /// No free responder address left in the room
    PathFull = 3000,
    /// Malformed or out-of-order message
    ProtocolError = 3001,
    /// Server-side failure
    InternalError = 3002,
    /// Signaling moved to the peer-to-peer channel
    Handover = 3003,
    /// The initiator dropped this responder (or a newer initiator took over)
    DroppedByInitiator = 3004,
    /// The initiator could not decrypt a relayed message
    InitiatorCouldNotDecrypt = 3005,
    /// No task in common
    NoSharedTask = 3006,
    /// `your_key` does not match the server key
    InvalidKey = 3007,
    /// Keepalive pong was not received in time
    Timeout = 3008,
}

impl CloseCode {
    /// Numeric value of this code.
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Human-readable reason sent along with the close frame.
    pub const fn reason(self) -> &'static str {
        match self {
            CloseCode::PathFull => "path full",
            CloseCode::ProtocolError => "protocol error",
            CloseCode::InternalError => "internal error",
            CloseCode::Handover => "handover of the signaling channel",
            CloseCode::DroppedByInitiator => "dropped by initiator",
            CloseCode::InitiatorCouldNotDecrypt => "initiator could not decrypt",
            CloseCode::NoSharedTask => "no shared task found",
            CloseCode::InvalidKey => "invalid key",
            CloseCode::Timeout => "timeout",
        }
    }

    /// Whether an initiator may use this code as a `drop-responder` reason.
    pub const fn is_drop_reason(self) -> bool {
        matches!(
            self,
            CloseCode::ProtocolError
                | CloseCode::InternalError
                | CloseCode::DroppedByInitiator
                | CloseCode::InitiatorCouldNotDecrypt
        )
    }
}

impl TryFrom<u16> for CloseCode {
    type Error = SignalingError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            3000 => Ok(CloseCode::PathFull),
            3001 => Ok(CloseCode::ProtocolError),
            3002 => Ok(CloseCode::InternalError),
            3003 => Ok(CloseCode::Handover),
            3004 => Ok(CloseCode::DroppedByInitiator),
            3005 => Ok(CloseCode::InitiatorCouldNotDecrypt),
            3006 => Ok(CloseCode::NoSharedTask),
            3007 => Ok(CloseCode::InvalidKey),
            3008 => Ok(CloseCode::Timeout),
            _ => Err(SignalingError::InvalidCloseCode(value)),
        }
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_u16(), self.reason())
    }
}
