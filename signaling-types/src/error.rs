//! Error types for SaltyRTC wire handling.

use thiserror::Error;

/// Errors that can occur while encoding, decoding or sealing signaling frames.
#[derive(Debug, Error)]
pub enum SignalingError {
    /// MessagePack serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] rmp_serde::encode::Error),

    /// MessagePack deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] rmp_serde::decode::Error),

    /// NaCl box authentication failed.
    ///
    /// Kept separate from [`SignalingError::Deserialization`] so callers can
    /// fall back to a plaintext interpretation of the same bytes.
    #[error("decryption failed")]
    DecryptionFailed,

    /// Encryption failed
    #[error("encryption failed")]
    EncryptionFailed,

    /// Frame is shorter than a nonce plus a minimal payload
    #[error("frame too short: {len} bytes (minimum {min})")]
    FrameTooShort {
        /// Actual frame length.
        len: usize,
        /// Minimum accepted length.
        min: usize,
    },

    /// OS random source failed
    #[error("random number generator failed: {0}")]
    Randomness(String),

    /// Invalid hex-encoded key
    #[error("invalid hex key: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Byte slice had the wrong length for a fixed-width value
    #[error("invalid length for {what}: expected {expected}, got {actual}")]
    InvalidLength {
        /// Name of the value being decoded.
        what: &'static str,
        /// Expected length in bytes.
        expected: usize,
        /// Actual length in bytes.
        actual: usize,
    },

    /// Numeric value is not a known close code
    #[error("invalid close code: {0}")]
    InvalidCloseCode(u16),

    /// Combined sequence number cannot be incremented any further
    #[error("overflow of combined sequence number reached")]
    OverflowReached,

    /// A message of a different type than expected was decoded
    #[error("unexpected message type: expected {expected}, got {actual}")]
    UnexpectedMessage {
        /// Expected discriminator.
        expected: &'static str,
        /// Received discriminator.
        actual: &'static str,
    },
}
