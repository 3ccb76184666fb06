//! Storage layer for signaling-relay.
//!
//! Persists push notification tokens keyed by the device's permanent public
//! key, so a sleeping initiator can be woken up.

mod sqlite;

pub use sqlite::SqliteDeviceStore;

use crate::error::StorageResult;
use async_trait::async_trait;

/// A device that registered a push token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Hex-encoded permanent public key of the device.
    pub public_key_hex: String,
    /// Push notification token.
    pub token: String,
}

/// Trait for device token storage backends.
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// Find the device registered for a public key.
    async fn lookup(&self, public_key_hex: &str) -> StorageResult<Option<Device>>;

    /// Create or replace the token of a device.
    async fn upsert(&self, device: Device) -> StorageResult<()>;
}
