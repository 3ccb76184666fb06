//! Push notifications used to wake a sleeping initiator.

use crate::config::NotificationsConfig;
use crate::error::NotifyError;
use async_trait::async_trait;
use serde_json::{json, Value};

/// Push notification dispatch.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a notification with a data payload to one device.
    async fn notify(
        &self,
        title: &str,
        message: &str,
        data: Value,
        device_token: &str,
    ) -> Result<(), NotifyError>;
}

/// Firebase Cloud Messaging (legacy HTTP API).
pub struct FcmNotifier {
    client: reqwest::Client,
    endpoint: String,
    server_key: String,
}

impl FcmNotifier {
    /// Create a notifier posting to `endpoint` with `server_key`.
    pub fn new(endpoint: impl Into<String>, server_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            server_key: server_key.into(),
        }
    }

    fn body(title: &str, message: &str, data: Value, device_token: &str) -> Value {
        json!({
            "to": device_token,
            "priority": "high",
            "data": data,
            "notification": {
                "title": title,
                "body": message,
            },
        })
    }
}

#[async_trait]
impl Notifier for FcmNotifier {
    async fn notify(
        &self,
        title: &str,
        message: &str,
        data: Value,
        device_token: &str,
    ) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::AUTHORIZATION, format!("key={}", self.server_key))
            .json(&Self::body(title, message, data, device_token))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!("Push notification delivered");
        Ok(())
    }
}

/// Notifier used when no push service is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn notify(
        &self,
        _title: &str,
        _message: &str,
        _data: Value,
        _device_token: &str,
    ) -> Result<(), NotifyError> {
        tracing::debug!("Push notifications disabled, skipping wake-up");
        Ok(())
    }
}

/// Build the notifier described by the configuration.
pub fn from_config(config: &NotificationsConfig) -> Box<dyn Notifier> {
    match &config.fcm_server_key {
        Some(key) => Box::new(FcmNotifier::new(&config.endpoint, key)),
        None => Box::new(DisabledNotifier),
    }
}

/// Data payload of a wake-up notification.
pub fn wake_up_data(initiator_hex: &str, responder: u8) -> Value {
    json!({
        "type": "wake-up",
        "initiator": initiator_hex,
        "responder": responder,
    })
}
