//! SignalingMessage - a typed payload paired with its nonce.
//!
//! Plaintext framing is `nonce ‖ msgpack(payload)`. Sealed framing is
//! `nonce ‖ box(msgpack(payload))` with the NaCl box construction
//! (X25519, XSalsa20, Poly1305), so the ciphertext starts with the 16-byte tag.

use crypto_box::aead::generic_array::GenericArray;
use crypto_box::aead::Aead;
use crypto_box::{PublicKey, SalsaBox, SecretKey};

use crate::nonce::NONCE_LENGTH;
use crate::{Key, Message, Nonce, SignalingError};

/// Smallest frame the server accepts: a nonce plus one payload byte.
pub const MIN_FRAME_LENGTH: usize = NONCE_LENGTH + 1;

/// Overhead added by the box construction.
pub const BOX_OVERHEAD: usize = 16;

/// A typed message and the nonce it travels under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalingMessage {
    /// Routing and ordering header.
    pub nonce: Nonce,
    /// Typed payload.
    pub message: Message,
}

impl SignalingMessage {
    /// Pair a nonce with a message.
    pub fn new(nonce: Nonce, message: Message) -> Self {
        Self { nonce, message }
    }

    /// Plaintext framing.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SignalingError> {
        let payload = self.message.to_bytes()?;
        let mut frame = Vec::with_capacity(NONCE_LENGTH + payload.len());
        frame.extend_from_slice(&self.nonce.to_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    /// Sealed framing, boxed from `own_private` to `peer_public`.
    pub fn seal(&self, peer_public: &Key, own_private: &Key) -> Result<Vec<u8>, SignalingError> {
        let nonce = self.nonce.to_bytes();
        let payload = self.message.to_bytes()?;
        let sealed = seal_raw(&payload, &nonce, peer_public, own_private)?;
        let mut frame = Vec::with_capacity(NONCE_LENGTH + sealed.len());
        frame.extend_from_slice(&nonce);
        frame.extend_from_slice(&sealed);
        Ok(frame)
    }

    /// Decode a plaintext frame.
    pub fn from_bytes(frame: &[u8]) -> Result<Self, SignalingError> {
        let (nonce, data) = split(frame)?;
        Ok(Self::new(nonce, Message::from_bytes(data)?))
    }

    /// Decode a sealed frame boxed from `peer_public` to `own_private`.
    pub fn open(frame: &[u8], peer_public: &Key, own_private: &Key) -> Result<Self, SignalingError> {
        let (nonce, data) = split(frame)?;
        Ok(Self::new(nonce, open(&nonce, data, peer_public, own_private)?))
    }
}

/// Split a frame into its nonce and payload.
pub fn split(frame: &[u8]) -> Result<(Nonce, &[u8]), SignalingError> {
    if frame.len() < MIN_FRAME_LENGTH {
        return Err(SignalingError::FrameTooShort {
            len: frame.len(),
            min: MIN_FRAME_LENGTH,
        });
    }
    let nonce = Nonce::from_bytes(frame)?;
    Ok((nonce, &frame[NONCE_LENGTH..]))
}

/// Open a sealed payload and decode the message inside.
///
/// A failed authentication check yields [`SignalingError::DecryptionFailed`],
/// never a decoding error.
pub fn open(
    nonce: &Nonce,
    data: &[u8],
    peer_public: &Key,
    own_private: &Key,
) -> Result<Message, SignalingError> {
    let plaintext = open_raw(data, &nonce.to_bytes(), peer_public, own_private)?;
    Message::from_bytes(&plaintext)
}

fn salsa_box(peer_public: &Key, own_private: &Key) -> SalsaBox {
    let public = PublicKey::from(*peer_public.as_bytes());
    let secret = SecretKey::from(*own_private.as_bytes());
    SalsaBox::new(&public, &secret)
}

/// NaCl box of arbitrary bytes.
pub fn seal_raw(
    plaintext: &[u8],
    nonce: &[u8; NONCE_LENGTH],
    peer_public: &Key,
    own_private: &Key,
) -> Result<Vec<u8>, SignalingError> {
    salsa_box(peer_public, own_private)
        .encrypt(GenericArray::from_slice(nonce), plaintext)
        .map_err(|_| SignalingError::EncryptionFailed)
}

/// Open a NaCl box of arbitrary bytes.
pub fn open_raw(
    ciphertext: &[u8],
    nonce: &[u8; NONCE_LENGTH],
    peer_public: &Key,
    own_private: &Key,
) -> Result<Vec<u8>, SignalingError> {
    salsa_box(peer_public, own_private)
        .decrypt(GenericArray::from_slice(nonce), ciphertext)
        .map_err(|_| SignalingError::DecryptionFailed)
}

/// The `signed_keys` field of server-auth.
///
/// Boxes `session_public ‖ client_permanent` from the server permanent key to
/// the client permanent key, under the nonce of the server-auth message itself.
pub fn signed_keys(
    session_public: &Key,
    client_permanent: &Key,
    nonce: &Nonce,
    server_private: &Key,
) -> Result<Vec<u8>, SignalingError> {
    let mut keys = Vec::with_capacity(2 * crate::KEY_LENGTH);
    keys.extend_from_slice(session_public.as_bytes());
    keys.extend_from_slice(client_permanent.as_bytes());
    seal_raw(&keys, &nonce.to_bytes(), client_permanent, server_private)
}
