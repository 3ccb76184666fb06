//! Framing of the add-device registration exchange.

use crate::nonce::NONCE_LENGTH;
use crate::{Key, SignalingError, KEY_LENGTH};

/// A frame on the add-device endpoint: `public_key(32) ‖ nonce(24) ‖ data`.
///
/// The nonce here is 24 random bytes, not a [`Nonce`](crate::Nonce).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFrame {
    /// Public key of the sender.
    pub public_key: Key,
    /// Box nonce.
    pub nonce: [u8; NONCE_LENGTH],
    /// MessagePack payload, possibly boxed.
    pub data: Vec<u8>,
}

impl DeviceFrame {
    /// Minimum frame length.
    pub const HEADER_LENGTH: usize = KEY_LENGTH + NONCE_LENGTH;

    /// Split a received frame.
    pub fn from_bytes(frame: &[u8]) -> Result<Self, SignalingError> {
        if frame.len() < Self::HEADER_LENGTH {
            return Err(SignalingError::FrameTooShort {
                len: frame.len(),
                min: Self::HEADER_LENGTH,
            });
        }
        let public_key = Key::try_from_slice(&frame[..KEY_LENGTH])?;
        let mut nonce = [0u8; NONCE_LENGTH];
        nonce.copy_from_slice(&frame[KEY_LENGTH..Self::HEADER_LENGTH]);
        Ok(Self {
            public_key,
            nonce,
            data: frame[Self::HEADER_LENGTH..].to_vec(),
        })
    }

    /// Encode for sending.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::HEADER_LENGTH + self.data.len());
        out.extend_from_slice(self.public_key.as_bytes());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.data);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        let frame = DeviceFrame {
            public_key: Key::from_bytes([1; 32]),
            nonce: [2; 24],
            data: vec![3, 3],
        };
        let bytes = frame.to_bytes();
        assert_eq!(bytes.len(), 58);
        assert_eq!(bytes[0], 1);
        assert_eq!(bytes[32], 2);
        assert_eq!(&bytes[56..], &[3, 3]);
        assert_eq!(DeviceFrame::from_bytes(&bytes).unwrap(), frame);
    }

    #[test]
    fn header_only_is_accepted() {
        let frame = DeviceFrame::from_bytes(&[0u8; 56]).unwrap();
        assert!(frame.data.is_empty());
    }

    #[test]
    fn short_frame_is_rejected() {
        assert!(matches!(
            DeviceFrame::from_bytes(&[0u8; 55]),
            Err(SignalingError::FrameTooShort { len: 55, min: 56 })
        ));
    }
}
