//! Sequence and overflow numbers.
//!
//! Together they form a 48-bit counter that orders the messages of one
//! direction of a connection. The split mirrors the nonce layout, where the
//! overflow number precedes the sequence number.

use crate::ids::random_bytes;
use crate::SignalingError;
use std::cmp::Ordering;
use std::fmt;

/// The lower 32 bits of a combined sequence number.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceNumber(u32);

impl SequenceNumber {
    /// Create a sequence number from its value.
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// A cryptographically random sequence number.
    pub fn random() -> Result<Self, SignalingError> {
        random_bytes::<4>().map(|b| Self(u32::from_be_bytes(b)))
    }

    /// Numeric value.
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// Big-endian wire encoding.
    pub const fn to_be_bytes(&self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    /// Decode from big-endian bytes.
    pub const fn from_be_bytes(bytes: [u8; 4]) -> Self {
        Self(u32::from_be_bytes(bytes))
    }
}

impl fmt::Debug for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SequenceNumber({})", self.0)
    }
}

/// The upper 16 bits of a combined sequence number.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OverflowNumber(u16);

impl OverflowNumber {
    /// Create an overflow number from its value.
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// Numeric value.
    pub const fn value(&self) -> u16 {
        self.0
    }

    /// Big-endian wire encoding.
    pub const fn to_be_bytes(&self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    /// Decode from big-endian bytes.
    pub const fn from_be_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_be_bytes(bytes))
    }
}

impl fmt::Debug for OverflowNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OverflowNumber({})", self.0)
    }
}

/// Sequence number paired with its overflow number.
///
/// Increments by exactly one per message. Exhausting the overflow number is an
/// error, never a wraparound.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CombinedSequenceNumber {
    sequence: SequenceNumber,
    overflow: OverflowNumber,
}

impl CombinedSequenceNumber {
    /// Combine a sequence number and an overflow number.
    pub const fn new(sequence: SequenceNumber, overflow: OverflowNumber) -> Self {
        Self { sequence, overflow }
    }

    /// Random starting point: random sequence number, overflow zero.
    pub fn random() -> Result<Self, SignalingError> {
        Ok(Self::new(SequenceNumber::random()?, OverflowNumber::default()))
    }

    /// The sequence half.
    pub const fn sequence(&self) -> SequenceNumber {
        self.sequence
    }

    /// The overflow half.
    pub const fn overflow(&self) -> OverflowNumber {
        self.overflow
    }

    /// Both halves are zero.
    pub const fn is_empty(&self) -> bool {
        self.sequence.0 == 0 && self.overflow.0 == 0
    }

    /// The 48-bit counter value.
    pub const fn as_u64(&self) -> u64 {
        ((self.overflow.0 as u64) << 32) | self.sequence.0 as u64
    }

    /// The next value in the sequence.
    pub fn increment(&self) -> Result<Self, SignalingError> {
        match self.sequence.0.checked_add(1) {
            Some(sequence) => Ok(Self::new(SequenceNumber(sequence), self.overflow)),
            None => {
                let overflow = self
                    .overflow
                    .0
                    .checked_add(1)
                    .ok_or(SignalingError::OverflowReached)?;
                Ok(Self::new(SequenceNumber(0), OverflowNumber(overflow)))
            }
        }
    }
}

impl PartialOrd for CombinedSequenceNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CombinedSequenceNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_u64().cmp(&other.as_u64())
    }
}

impl fmt::Display for CombinedSequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.overflow.0, self.sequence.0)
    }
}

impl fmt::Debug for CombinedSequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CombinedSequenceNumber({self})")
    }
}
