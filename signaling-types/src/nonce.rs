//! The 24-byte SaltyRTC nonce.

use crate::sequence::{CombinedSequenceNumber, OverflowNumber, SequenceNumber};
use crate::{Address, Cookie, SignalingError, COOKIE_LENGTH};

/// Byte length of a [`Nonce`].
pub const NONCE_LENGTH: usize = 24;

const SOURCE_OFFSET: usize = COOKIE_LENGTH;
const DESTINATION_OFFSET: usize = SOURCE_OFFSET + 1;
const OVERFLOW_OFFSET: usize = DESTINATION_OFFSET + 1;
const SEQUENCE_OFFSET: usize = OVERFLOW_OFFSET + 2;

/// Routing and ordering header prefixed to every frame.
///
/// Layout: `cookie(16) ‖ source(1) ‖ destination(1) ‖ overflow(2, BE) ‖
/// sequence(4, BE)`. The same bytes are the NaCl box nonce for the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nonce {
    /// Cookie of the sending side.
    pub cookie: Cookie,
    /// Sender address.
    pub source: Address,
    /// Receiver address.
    pub destination: Address,
    /// Upper 16 bits of the counter.
    pub overflow: OverflowNumber,
    /// Lower 32 bits of the counter.
    pub sequence: SequenceNumber,
}

impl Nonce {
    /// Build a nonce from its parts.
    pub fn new(
        cookie: Cookie,
        source: Address,
        destination: Address,
        csn: CombinedSequenceNumber,
    ) -> Self {
        Self {
            cookie,
            source,
            destination,
            overflow: csn.overflow(),
            sequence: csn.sequence(),
        }
    }

    /// Encode to the wire layout.
    pub fn to_bytes(&self) -> [u8; NONCE_LENGTH] {
        let mut out = [0u8; NONCE_LENGTH];
        out[..SOURCE_OFFSET].copy_from_slice(self.cookie.as_bytes());
        out[SOURCE_OFFSET] = self.source.value();
        out[DESTINATION_OFFSET] = self.destination.value();
        out[OVERFLOW_OFFSET..SEQUENCE_OFFSET].copy_from_slice(&self.overflow.to_be_bytes());
        out[SEQUENCE_OFFSET..].copy_from_slice(&self.sequence.to_be_bytes());
        out
    }

    /// Decode from the first [`NONCE_LENGTH`] bytes of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignalingError> {
        if bytes.len() < NONCE_LENGTH {
            return Err(SignalingError::InvalidLength {
                what: "nonce",
                expected: NONCE_LENGTH,
                actual: bytes.len(),
            });
        }

        let mut cookie = [0u8; COOKIE_LENGTH];
        cookie.copy_from_slice(&bytes[..SOURCE_OFFSET]);
        let mut overflow = [0u8; 2];
        overflow.copy_from_slice(&bytes[OVERFLOW_OFFSET..SEQUENCE_OFFSET]);
        let mut sequence = [0u8; 4];
        sequence.copy_from_slice(&bytes[SEQUENCE_OFFSET..NONCE_LENGTH]);

        Ok(Self {
            cookie: Cookie::from_bytes(cookie),
            source: Address::new(bytes[SOURCE_OFFSET]),
            destination: Address::new(bytes[DESTINATION_OFFSET]),
            overflow: OverflowNumber::from_be_bytes(overflow),
            sequence: SequenceNumber::from_be_bytes(sequence),
        })
    }

    /// The counter carried by this nonce.
    pub fn combined_sequence_number(&self) -> CombinedSequenceNumber {
        CombinedSequenceNumber::new(self.sequence, self.overflow)
    }
}
