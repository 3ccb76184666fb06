//! Identity types for SaltyRTC: addresses, cookies and Curve25519 keys.

use crate::bytes::impl_fixed_bytes_serde;
use crate::SignalingError;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Byte length of a [`Cookie`].
pub const COOKIE_LENGTH: usize = 16;

/// Byte length of a [`Key`].
pub const KEY_LENGTH: usize = 32;

/// Fill a fixed buffer from the OS random source.
pub(crate) fn random_bytes<const N: usize>() -> Result<[u8; N], SignalingError> {
    let mut bytes = [0u8; N];
    getrandom::getrandom(&mut bytes).map_err(|e| SignalingError::Randomness(e.to_string()))?;
    Ok(bytes)
}

/// A one-byte path address.
///
/// `0x00` is the server (or a client that has not been assigned yet), `0x01`
/// the initiator and `0x02..=0xff` the responder slots.
#[derive(
    Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Address(u8);

impl Address {
    /// The server address.
    pub const SERVER: Self = Self(0x00);
    /// Address of a client that has not authenticated yet.
    pub const UNASSIGNED: Self = Self(0x00);
    /// The initiator address.
    pub const INITIATOR: Self = Self(0x01);
    /// Lowest responder address.
    pub const FIRST_RESPONDER: Self = Self(0x02);
    /// Highest responder address.
    pub const LAST_RESPONDER: Self = Self(0xff);

    /// Create an address from its raw value.
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Raw value of this address.
    pub const fn value(&self) -> u8 {
        self.0
    }

    /// Whether this is the server (or unassigned) address.
    pub const fn is_server(&self) -> bool {
        self.0 == Self::SERVER.0
    }

    /// Whether this is the initiator address.
    pub const fn is_initiator(&self) -> bool {
        self.0 == Self::INITIATOR.0
    }

    /// Whether this address lies in the responder range.
    pub const fn is_responder(&self) -> bool {
        self.0 >= Self::FIRST_RESPONDER.0
    }

    /// All responder addresses in allocation order.
    pub fn responders() -> impl Iterator<Item = Self> {
        (Self::FIRST_RESPONDER.0..=Self::LAST_RESPONDER.0).map(Self)
    }
}

impl From<u8> for Address {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}", self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{:02x})", self.0)
    }
}

/// A 16-byte anti-spoofing token, one per direction of a connection.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Cookie([u8; COOKIE_LENGTH]);

impl_fixed_bytes_serde!(Cookie, 16, "cookie");

impl Cookie {
    /// Create a new random cookie.
    pub fn random() -> Result<Self, SignalingError> {
        random_bytes().map(Self)
    }

    /// Create a cookie from raw bytes.
    pub const fn from_bytes(bytes: [u8; COOKIE_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes of this cookie.
    pub fn as_bytes(&self) -> &[u8; COOKIE_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cookie({})", hex::encode(&self.0[..4]))
    }
}

/// A Curve25519 public or private key.
///
/// The all-zero key is used as the "unset" sentinel.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Key([u8; KEY_LENGTH]);

impl_fixed_bytes_serde!(Key, 32, "key");

impl Key {
    /// Create a key from raw bytes.
    pub const fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Create a key from a slice, checking its length.
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, SignalingError> {
        <[u8; KEY_LENGTH]>::try_from(bytes)
            .map(Self)
            .map_err(|_| SignalingError::InvalidLength {
                what: "key",
                expected: KEY_LENGTH,
                actual: bytes.len(),
            })
    }

    /// Decode a key from 64 hex characters.
    pub fn from_hex(hex_key: &str) -> Result<Self, SignalingError> {
        let decoded = hex::decode(hex_key)?;
        Self::try_from_slice(&decoded)
    }

    /// Lowercase hex encoding of this key.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Get the raw bytes of this key.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }

    /// Whether this is the all-zero "unset" key.
    pub fn is_empty(&self) -> bool {
        self.0 == [0u8; KEY_LENGTH]
    }
}

impl Zeroize for Key {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", &self.to_hex()[..8])
    }
}

/// A Curve25519 key pair.
///
/// The private half is wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeyPair {
    #[zeroize(skip)]
    public: Key,
    private: Key,
}

impl KeyPair {
    /// Generate a fresh random key pair.
    pub fn generate() -> Result<Self, SignalingError> {
        let private = Key(random_bytes()?);
        Ok(Self::from_private(private))
    }

    /// Derive the key pair belonging to a private key.
    pub fn from_private(private: Key) -> Self {
        let secret = crypto_box::SecretKey::from(private.0);
        let public = Key(*secret.public_key().as_bytes());
        Self { public, private }
    }

    /// The public half.
    pub fn public_key(&self) -> Key {
        self.public
    }

    /// The private half.
    pub fn private_key(&self) -> Key {
        self.private
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .field("private", &"[REDACTED]")
            .finish()
    }
}
