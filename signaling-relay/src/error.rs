//! Error types for signaling-relay.

use signaling_types::{Address, CloseCode, SignalingError};
use std::path::PathBuf;

/// Errors starting or running the relay.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Key pair error.
    #[error("key pair error: {0}")]
    KeyPair(#[from] KeyPairError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage layer errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Database path error.
    #[error("invalid database path: {path}")]
    InvalidPath {
        /// The invalid path.
        path: PathBuf,
    },
}

/// Errors loading or writing the permanent key pair.
#[derive(Debug, thiserror::Error)]
pub enum KeyPairError {
    /// A key file could not be read.
    #[error("failed to read key file {path}: {source}")]
    Read {
        /// Path to the key file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A key file could not be written.
    #[error("failed to write key file {path}: {source}")]
    Write {
        /// Path to the key file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A key file does not hold a hex-encoded 32-byte key.
    #[error("invalid key in {path}: {source}")]
    Invalid {
        /// Path to the key file.
        path: PathBuf,
        /// Decoding error.
        source: SignalingError,
    },

    /// The public key does not belong to the private key.
    #[error("public key does not match private key")]
    Mismatch,

    /// Key generation failed.
    #[error("key generation failed: {0}")]
    Generate(SignalingError),
}

/// Push notification errors.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The request could not be sent.
    #[error("notification request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The push service answered with a non-success status.
    #[error("push service returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
}

/// Add-device registration failures. Each one closes the socket.
#[derive(Debug, thiserror::Error)]
pub enum AddDeviceError {
    /// Frame could not be split, decrypted or decoded.
    #[error("invalid frame: {0}")]
    Signaling(#[from] SignalingError),

    /// Device token could not be stored.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// add-device-solved without a preceding request.
    #[error("no pending challenge for this key")]
    NoChallenge,

    /// add-device-solved echoed the wrong challenge.
    #[error("challenge does not match")]
    ChallengeMismatch,

    /// Message not valid on this endpoint.
    #[error("unexpected add-device message")]
    UnexpectedMessage,
}

/// Fatal protocol violations. Each one terminates the connection.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Frame could not be decoded, decrypted or encoded.
    #[error("invalid frame: {0}")]
    Signaling(#[from] SignalingError),

    /// Text frames are not part of the protocol.
    #[error("text frames are not supported")]
    TextFrame,

    /// Frame exceeds the configured limit.
    #[error("frame too large: {size} bytes (limit: {limit} bytes)")]
    FrameTooLarge {
        /// Actual frame size.
        size: usize,
        /// Configured limit.
        limit: usize,
    },

    /// Client may not send to this destination.
    #[error("not allowed to send from {source_address} to {destination}")]
    InvalidDestination {
        /// Sender address.
        source_address: Address,
        /// Requested destination.
        destination: Address,
    },

    /// Nonce source differs from the client's address.
    #[error("invalid source address: expected {expected}, got {actual}")]
    InvalidSource {
        /// The client's address.
        expected: Address,
        /// Address in the nonce.
        actual: Address,
    },

    /// Cookie differs from the pinned one.
    #[error("invalid cookie")]
    InvalidCookie,

    /// Client echoed the server's own cookie.
    #[error("client cookie equals server cookie")]
    ReflectedCookie,

    /// First message carried a non-zero overflow number.
    #[error("first message must have overflow number 0, got {0}")]
    InvalidInitialOverflow(u16),

    /// Combined sequence number is not the expected next value.
    #[error("invalid sequence number: expected {expected}, got {actual}")]
    InvalidSequence {
        /// Expected value.
        expected: String,
        /// Received value.
        actual: String,
    },

    /// `your_cookie` in client-auth does not match.
    #[error("your_cookie does not match the server cookie")]
    YourCookieMismatch,

    /// Client does not speak the server's sub-protocol.
    #[error("sub-protocol {0} not offered by client")]
    SubprotocolMismatch(String),

    /// `ping_interval` is negative or too large.
    #[error("invalid ping interval: {0}")]
    InvalidPingInterval(i64),

    /// `your_key` is not the server's permanent key.
    #[error("your_key does not match the server key")]
    InvalidKey,

    /// No responder address left.
    #[error("no free responder address")]
    PathFull,

    /// client-hello sent after the permanent key is known.
    #[error("unexpected client-hello")]
    UnexpectedClientHello,

    /// Server-bound message not valid in the client's state.
    #[error("unexpected server-bound message from {0}")]
    UnexpectedMessage(Address),

    /// drop-responder carried an unusable close code.
    #[error("invalid drop-responder reason: {0}")]
    InvalidDropReason(u16),

    /// Keepalive pong not received in time.
    #[error("keepalive pong timed out")]
    PingTimeout,

    /// Server-side failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProtocolError {
    /// Close code sent to the client for this error.
    pub fn close_code(&self) -> CloseCode {
        match self {
            ProtocolError::Signaling(
                SignalingError::Serialization(_)
                | SignalingError::EncryptionFailed
                | SignalingError::Randomness(_),
            ) => CloseCode::InternalError,
            ProtocolError::InvalidKey => CloseCode::InvalidKey,
            ProtocolError::PathFull => CloseCode::PathFull,
            ProtocolError::PingTimeout => CloseCode::Timeout,
            ProtocolError::Internal(_) => CloseCode::InternalError,
            _ => CloseCode::ProtocolError,
        }
    }
}

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;
