//! # signaling-types
//!
//! Wire format types for the SaltyRTC signaling protocol.
//!
//! This crate is free of I/O and provides:
//! - [`Address`], [`Cookie`], [`Key`], [`KeyPair`] - Identity types
//! - [`CombinedSequenceNumber`] - Per-direction message ordering
//! - [`Nonce`] - The 24-byte routing, ordering and box nonce header
//! - [`Message`] - Typed protocol payloads
//! - [`SignalingMessage`] - Plaintext and NaCl-box framing
//! - [`CloseCode`] - Close codes sent to clients
//! - [`SignalingError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod bytes;
mod close_code;
pub mod device;
pub mod envelope;
mod error;
mod ids;
pub mod messages;
mod nonce;
mod sequence;

pub use close_code::{CloseCode, NORMAL_CLOSURE};
pub use device::DeviceFrame;
pub use envelope::{SignalingMessage, MIN_FRAME_LENGTH};
pub use error::SignalingError;
pub use ids::{Address, Cookie, Key, KeyPair, COOKIE_LENGTH, KEY_LENGTH};
pub use messages::{DeviceMessage, Message};
pub use nonce::{Nonce, NONCE_LENGTH};
pub use sequence::{CombinedSequenceNumber, OverflowNumber, SequenceNumber};
