//! Add-device registration.
//!
//! A device proves it owns a permanent key by answering a challenge boxed to
//! that key, and in return gets its push token stored:
//!
//! ```text
//! device ──► add-device-request (plain)
//! server ──► add-device-control { uuid } (boxed to the device key)
//! device ──► add-device-solved { uuid, device_token } (boxed to the server key)
//! server ──► close 1000
//! ```

use crate::error::AddDeviceError;
use crate::keypair::KeyPairStorage;
use crate::server::RelayMetrics;
use crate::storage::{Device, DeviceRepository};
use dashmap::DashMap;
use signaling_types::envelope::{open_raw, seal_raw};
use signaling_types::{DeviceFrame, DeviceMessage, Key, SignalingError, NONCE_LENGTH};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use uuid::Uuid;

/// Reason sent with the closing frame after a successful registration.
pub const DEVICE_UPDATED_REASON: &str = "device token was updated";

/// What the connection should do after a frame was handled.
#[derive(Debug, PartialEq, Eq)]
pub enum DeviceReply {
    /// Send this challenge frame. `key` now has a pending challenge.
    Challenge {
        /// Encoded add-device-control frame.
        frame: Vec<u8>,
        /// Key the challenge was issued for.
        key: Key,
        /// The challenge itself.
        uuid: Uuid,
    },
    /// Token stored; close the connection normally.
    Registered,
}

/// Issues and checks add-device challenges.
pub struct AddDeviceService {
    keys: Arc<dyn KeyPairStorage>,
    devices: Arc<dyn DeviceRepository>,
    metrics: Arc<RelayMetrics>,
    pending: DashMap<Key, Uuid>,
}

impl AddDeviceService {
    /// Create the service.
    pub fn new(
        keys: Arc<dyn KeyPairStorage>,
        devices: Arc<dyn DeviceRepository>,
        metrics: Arc<RelayMetrics>,
    ) -> Self {
        Self {
            keys,
            devices,
            metrics,
            pending: DashMap::new(),
        }
    }

    /// Handle one binary frame from a device.
    pub async fn on_message(&self, bytes: &[u8]) -> Result<DeviceReply, AddDeviceError> {
        let frame = DeviceFrame::from_bytes(bytes)?;

        if let Ok(DeviceMessage::AddDeviceRequest) = DeviceMessage::from_bytes(&frame.data) {
            return self.challenge(frame.public_key);
        }

        let plain = open_raw(
            &frame.data,
            &frame.nonce,
            &frame.public_key,
            &self.keys.private_key(),
        )?;
        match DeviceMessage::from_bytes(&plain)? {
            DeviceMessage::AddDeviceSolved { uuid, device_token } => {
                self.solve(frame.public_key, &uuid, device_token).await?;
                Ok(DeviceReply::Registered)
            }
            _ => Err(AddDeviceError::UnexpectedMessage),
        }
    }

    fn challenge(&self, key: Key) -> Result<DeviceReply, AddDeviceError> {
        let uuid = Uuid::new_v4();
        self.pending.insert(key, uuid);

        let control = DeviceMessage::AddDeviceControl {
            uuid: uuid.to_string(),
        }
        .to_bytes()?;
        let mut nonce = [0u8; NONCE_LENGTH];
        getrandom::getrandom(&mut nonce)
            .map_err(|e| SignalingError::Randomness(e.to_string()))?;
        let data = seal_raw(&control, &nonce, &key, &self.keys.private_key())?;

        tracing::debug!(device = ?key, "Issued add-device challenge");
        let frame = DeviceFrame {
            public_key: self.keys.public_key(),
            nonce,
            data,
        };
        Ok(DeviceReply::Challenge {
            frame: frame.to_bytes(),
            key,
            uuid,
        })
    }

    async fn solve(&self, key: Key, uuid: &str, token: String) -> Result<(), AddDeviceError> {
        let (_, expected) = self
            .pending
            .remove(&key)
            .ok_or(AddDeviceError::NoChallenge)?;
        if expected.to_string() != uuid {
            return Err(AddDeviceError::ChallengeMismatch);
        }

        self.devices
            .upsert(Device {
                public_key_hex: key.to_hex(),
                token,
            })
            .await?;
        self.metrics
            .devices_registered
            .fetch_add(1, Ordering::Relaxed);
        tracing::info!(device = ?key, "Device token updated");
        Ok(())
    }

    /// Drop an unanswered challenge, unless `key` has been challenged again
    /// since `issued`.
    pub fn forget(&self, key: &Key, issued: &Uuid) {
        self.pending.remove_if(key, |_, current| current == issued);
    }

    /// Number of unanswered challenges.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
