//! Typed payloads of the SaltyRTC signaling protocol.
//!
//! Every payload is a MessagePack map carrying a `type` discriminator. These are
//! the inner messages that get sealed into a [`SignalingMessage`].
//!
//! [`SignalingMessage`]: crate::SignalingMessage

use serde::{Deserialize, Serialize};

use crate::{Address, Cookie, Key, SignalingError};

/// All messages the server sends or understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Message {
    /// Server session key, sent unencrypted on connect
    ServerHello(ServerHello),
    /// Responder permanent key, sent unencrypted
    ClientHello(ClientHello),
    /// Client authentication
    ClientAuth(ClientAuth),
    /// Server reply to a successful client-auth
    ServerAuth(ServerAuth),
    /// A new initiator joined the room
    NewInitiator,
    /// A new responder joined the room
    NewResponder(NewResponder),
    /// Initiator asks the server to drop a responder
    DropResponder(DropResponder),
    /// A peer left the room
    Disconnected(Disconnected),
    /// A relayed message could not be delivered
    SendError(SendError),
}

impl Message {
    /// Serialize to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SignalingError> {
        rmp_serde::to_vec_named(self).map_err(SignalingError::Serialization)
    }

    /// Deserialize from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignalingError> {
        rmp_serde::from_slice(bytes).map_err(SignalingError::Deserialization)
    }

    /// The wire discriminator of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::ServerHello(_) => "server-hello",
            Message::ClientHello(_) => "client-hello",
            Message::ClientAuth(_) => "client-auth",
            Message::ServerAuth(_) => "server-auth",
            Message::NewInitiator => "new-initiator",
            Message::NewResponder(_) => "new-responder",
            Message::DropResponder(_) => "drop-responder",
            Message::Disconnected(_) => "disconnected",
            Message::SendError(_) => "send-error",
        }
    }

    /// Extract a client-hello.
    pub fn into_client_hello(self) -> Result<ClientHello, SignalingError> {
        match self {
            Message::ClientHello(m) => Ok(m),
            other => Err(unexpected("client-hello", &other)),
        }
    }

    /// Extract a client-auth.
    pub fn into_client_auth(self) -> Result<ClientAuth, SignalingError> {
        match self {
            Message::ClientAuth(m) => Ok(m),
            other => Err(unexpected("client-auth", &other)),
        }
    }

    /// Extract a drop-responder.
    pub fn into_drop_responder(self) -> Result<DropResponder, SignalingError> {
        match self {
            Message::DropResponder(m) => Ok(m),
            other => Err(unexpected("drop-responder", &other)),
        }
    }
}

fn unexpected(expected: &'static str, actual: &Message) -> SignalingError {
    SignalingError::UnexpectedMessage {
        expected,
        actual: actual.kind(),
    }
}

/// `server-hello`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerHello {
    /// Server session public key.
    pub key: Key,
}

/// `client-hello`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientHello {
    /// Responder permanent public key.
    pub key: Key,
}

/// `client-auth`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientAuth {
    /// Echo of the server's outgoing cookie.
    pub your_cookie: Cookie,
    /// Sub-protocols the client speaks.
    pub subprotocols: Vec<String>,
    /// Keepalive interval in seconds, `0` disables.
    #[serde(default)]
    pub ping_interval: i64,
    /// The server permanent key the client expects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub your_key: Option<Key>,
}

impl ClientAuth {
    /// Whether `subprotocol` is among the offered ones.
    pub fn offers(&self, subprotocol: &str) -> bool {
        self.subprotocols.iter().any(|p| p == subprotocol)
    }
}

/// `server-auth`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerAuth {
    /// Echo of the client's cookie.
    pub your_cookie: Cookie,
    /// Session and client permanent key, sealed with the server permanent key.
    #[serde(with = "crate::bytes::buf")]
    pub signed_keys: Vec<u8>,
    /// Sent to responders only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiator_connected: Option<bool>,
    /// Sent to the initiator only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responders: Option<Vec<Address>>,
}

/// `new-responder`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewResponder {
    /// Address of the new responder.
    pub id: Address,
}

/// `drop-responder`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropResponder {
    /// Responder to drop.
    pub id: Address,
    /// Close code to use; absent or `0` means dropped-by-initiator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<u16>,
}

/// `disconnected`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disconnected {
    /// Address of the peer that left.
    pub id: Address,
}

/// `send-error`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendError {
    /// Identifier of the undeliverable message.
    #[serde(with = "crate::bytes::buf")]
    pub id: Vec<u8>,
}

/// Messages of the add-device registration exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DeviceMessage {
    /// Device asks for a challenge, sent unencrypted
    AddDeviceRequest,
    /// Server challenge
    AddDeviceControl {
        /// Challenge to echo back.
        uuid: String,
    },
    /// Device answers the challenge with its push token
    AddDeviceSolved {
        /// The challenge received in add-device-control.
        uuid: String,
        /// Push notification token of the device.
        device_token: String,
    },
}

impl DeviceMessage {
    /// Serialize to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SignalingError> {
        rmp_serde::to_vec_named(self).map_err(SignalingError::Serialization)
    }

    /// Deserialize from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignalingError> {
        rmp_serde::from_slice(bytes).map_err(SignalingError::Deserialization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_tag_is_kebab_case() {
        let msg = Message::NewResponder(NewResponder { id: Address::new(2) });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "new-responder");
        assert_eq!(json["id"], 2);

        let json = serde_json::to_value(&Message::NewInitiator).unwrap();
        assert_eq!(json, serde_json::json!({"type": "new-initiator"}));
    }

    #[test]
    fn encodes_as_named_map() {
        let msg = Message::Disconnected(Disconnected { id: Address::new(7) });
        let bytes = msg.to_bytes().unwrap();
        // fixmap with two entries: type and id
        assert_eq!(bytes[0], 0x82);
        assert_eq!(Message::from_bytes(&bytes).unwrap(), msg);
    }

    #[test]
    fn client_auth_optional_fields() {
        #[derive(Serialize)]
        struct Minimal<'a> {
            #[serde(rename = "type")]
            kind: &'a str,
            your_cookie: Cookie,
            subprotocols: Vec<&'a str>,
        }
        let bytes = rmp_serde::to_vec_named(&Minimal {
            kind: "client-auth",
            your_cookie: Cookie::from_bytes([3; 16]),
            subprotocols: vec!["v1.saltyrtc.org"],
        })
        .unwrap();

        let auth = Message::from_bytes(&bytes).unwrap().into_client_auth().unwrap();
        assert_eq!(auth.ping_interval, 0);
        assert_eq!(auth.your_key, None);
        assert!(auth.offers("v1.saltyrtc.org"));
        assert!(!auth.offers("v0.saltyrtc.org"));
    }

    #[test]
    fn server_auth_omits_absent_role_fields() {
        let msg = Message::ServerAuth(ServerAuth {
            your_cookie: Cookie::from_bytes([1; 16]),
            signed_keys: vec![9; 80],
            initiator_connected: Some(true),
            responders: None,
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("responders").is_none());
        assert_eq!(json["initiator_connected"], true);

        let decoded = Message::from_bytes(&msg.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn signed_keys_encode_as_bin() {
        let msg = ServerAuth {
            your_cookie: Cookie::from_bytes([1; 16]),
            signed_keys: vec![0xee; 80],
            initiator_connected: None,
            responders: Some(vec![Address::new(2), Address::new(3)]),
        };
        let bytes = rmp_serde::to_vec_named(&msg).unwrap();
        let needle = [0xc4, 80, 0xee];
        assert!(bytes.windows(3).any(|w| w == needle));
    }

    #[test]
    fn unknown_type_fails() {
        #[derive(Serialize)]
        struct Bogus {
            #[serde(rename = "type")]
            kind: &'static str,
        }
        let bytes = rmp_serde::to_vec_named(&Bogus { kind: "token" }).unwrap();
        assert!(matches!(
            Message::from_bytes(&bytes),
            Err(SignalingError::Deserialization(_))
        ));
    }

    #[test]
    fn wrong_variant_is_reported() {
        let msg = Message::ClientHello(ClientHello {
            key: Key::from_bytes([4; 32]),
        });
        let err = msg.into_client_auth().unwrap_err();
        assert!(matches!(
            err,
            SignalingError::UnexpectedMessage {
                expected: "client-auth",
                actual: "client-hello"
            }
        ));
    }

    #[test]
    fn drop_responder_reason_is_optional() {
        let msg = Message::DropResponder(DropResponder {
            id: Address::new(2),
            reason: None,
        });
        let decoded = Message::from_bytes(&msg.to_bytes().unwrap())
            .unwrap()
            .into_drop_responder()
            .unwrap();
        assert_eq!(decoded.reason, None);
    }

    #[test]
    fn device_messages() {
        let solved = DeviceMessage::AddDeviceSolved {
            uuid: "abc".into(),
            device_token: "token".into(),
        };
        let json = serde_json::to_value(&solved).unwrap();
        assert_eq!(json["type"], "add-device-solved");
        assert_eq!(DeviceMessage::from_bytes(&solved.to_bytes().unwrap()).unwrap(), solved);

        let request = DeviceMessage::AddDeviceRequest.to_bytes().unwrap();
        assert_eq!(
            DeviceMessage::from_bytes(&request).unwrap(),
            DeviceMessage::AddDeviceRequest
        );
    }
}
