//! Per-connection WebSocket sessions.
//!
//! A signaling socket is split in two: a writer task that owns the sink and
//! drains the client's [`Outbound`] queue, and a read loop that feeds binary
//! frames to the protocol engine one at a time.

use crate::client::Outbound;
use crate::devices::{DeviceReply, DEVICE_UPDATED_REASON};
use crate::error::ProtocolError;
use crate::server::SignalingRelay;
use axum::extract::ws::{CloseFrame, Message as WsMessage, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use signaling_types::{CloseCode, Key, NORMAL_CLOSURE};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Drive one signaling connection until it closes.
pub async fn run_signaling(relay: Arc<SignalingRelay>, initiator_key: Key, socket: WebSocket) {
    let (sink, mut stream) = socket.split();
    let (outbound, queue) = mpsc::unbounded_channel();
    tokio::spawn(write_outbound(sink, queue));

    let service = relay.service();
    let client = match service.on_connect(initiator_key, outbound).await {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(room = ?initiator_key, "Failed to accept client: {}", e);
            return;
        }
    };

    let limit = relay.config().limits.max_frame_size;
    let mut shutdown = client.shutdown_signal();
    loop {
        let frame = tokio::select! {
            _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => break,
            _ = client.keepalive_expired() => {
                service.fail(&client, ProtocolError::PingTimeout).await;
                break;
            }
            frame = stream.next() => frame,
        };

        let result = match frame {
            Some(Ok(WsMessage::Binary(data))) if data.len() > limit => {
                Err(ProtocolError::FrameTooLarge {
                    size: data.len(),
                    limit,
                })
            }
            Some(Ok(WsMessage::Binary(data))) => service.on_message(&client, &data).await,
            Some(Ok(WsMessage::Text(_))) => Err(ProtocolError::TextFrame),
            Some(Ok(WsMessage::Pong(_))) => {
                client.record_pong();
                Ok(())
            }
            Some(Ok(WsMessage::Ping(_))) => Ok(()),
            Some(Ok(WsMessage::Close(_))) | None => {
                tracing::debug!(client = client.id(), "Peer closed the connection");
                break;
            }
            Some(Err(e)) => {
                tracing::debug!(client = client.id(), "Read failed: {}", e);
                break;
            }
        };

        if let Err(e) = result {
            service.fail(&client, e).await;
            break;
        }
    }

    service.cleanup(&client).await;
}

/// Serialise all writes to one socket. Stops after a close frame or when
/// every sender is gone.
async fn write_outbound(
    mut sink: SplitSink<WebSocket, WsMessage>,
    mut queue: mpsc::UnboundedReceiver<Outbound>,
) {
    while let Some(item) = queue.recv().await {
        let (message, ack, closing) = match item {
            Outbound::Frame(frame) => (WsMessage::Binary(frame), None, false),
            Outbound::Ping => (WsMessage::Ping(Vec::new()), None, false),
            Outbound::Close { code, reason, ack } => (
                WsMessage::Close(Some(CloseFrame {
                    code,
                    reason: reason.into(),
                })),
                ack,
                true,
            ),
        };

        if let Err(e) = sink.send(message).await {
            tracing::debug!("Write failed: {}", e);
            break;
        }
        if let Some(ack) = ack {
            let _ = ack.send(());
        }
        if closing {
            break;
        }
    }
}

/// Drive one add-device connection until it closes.
pub async fn run_add_device(relay: Arc<SignalingRelay>, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let service = relay.add_device();
    let limit = relay.config().limits.max_frame_size;
    let mut challenged: HashMap<Key, Uuid> = HashMap::new();

    while let Some(frame) = stream.next().await {
        let data = match frame {
            Ok(WsMessage::Binary(data)) if data.len() <= limit => data,
            Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => continue,
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {
                tracing::warn!("Rejected add-device frame");
                close(&mut sink, CloseCode::ProtocolError.as_u16(), CloseCode::ProtocolError.reason()).await;
                break;
            }
            Err(e) => {
                tracing::debug!("Add-device read failed: {}", e);
                break;
            }
        };

        match service.on_message(&data).await {
            Ok(DeviceReply::Challenge { frame, key, uuid }) => {
                challenged.insert(key, uuid);
                if let Err(e) = sink.send(WsMessage::Binary(frame)).await {
                    tracing::debug!("Add-device write failed: {}", e);
                    break;
                }
            }
            Ok(DeviceReply::Registered) => {
                close(&mut sink, NORMAL_CLOSURE, DEVICE_UPDATED_REASON).await;
                break;
            }
            Err(e) => {
                tracing::warn!("Add-device failed: {}", e);
                close(&mut sink, CloseCode::ProtocolError.as_u16(), CloseCode::ProtocolError.reason()).await;
                break;
            }
        }
    }

    for (key, uuid) in &challenged {
        service.forget(key, uuid);
    }
}

async fn close(sink: &mut SplitSink<WebSocket, WsMessage>, code: u16, reason: &'static str) {
    let frame = CloseFrame {
        code,
        reason: reason.into(),
    };
    if let Err(e) = sink.send(WsMessage::Close(Some(frame))).await {
        tracing::debug!("Close failed: {}", e);
    }
}
