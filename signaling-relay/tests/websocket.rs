//! End-to-end tests over real WebSocket connections.

use futures_util::{SinkExt, StreamExt};
use saltyrtc_signaling_relay::config::Config;
use saltyrtc_signaling_relay::notify::DisabledNotifier;
use saltyrtc_signaling_relay::server::{self, SignalingRelay};
use saltyrtc_signaling_relay::storage::{DeviceRepository, SqliteDeviceStore};
use signaling_types::envelope::{open_raw, seal_raw};
use signaling_types::{Address, DeviceFrame, DeviceMessage, KeyPair, Message, SignalingMessage};
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message as WsMessage;

const WAIT: Duration = Duration::from_secs(5);

async fn start() -> (Arc<SignalingRelay>, Arc<SqliteDeviceStore>, KeyPair, SocketAddr) {
    let server_keys = KeyPair::generate().unwrap();
    let devices = Arc::new(SqliteDeviceStore::in_memory().await.unwrap());
    let relay = Arc::new(SignalingRelay::new(
        Config::default(),
        Arc::new(server_keys.clone()),
        devices.clone(),
        Arc::new(DisabledNotifier),
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(server::serve(relay.clone(), listener));
    (relay, devices, server_keys, address)
}

#[tokio::test]
async fn server_hello_over_websocket() {
    let (relay, _devices, _keys, address) = start().await;
    let initiator = KeyPair::generate().unwrap();

    let mut request = format!("ws://{address}/{}", initiator.public_key().to_hex())
        .into_client_request()
        .unwrap();
    request
        .headers_mut()
        .insert("Sec-WebSocket-Protocol", HeaderValue::from_static("v1.saltyrtc.org"));
    let (mut socket, response) = tokio_tungstenite::connect_async(request).await.unwrap();
    assert_eq!(
        response.headers().get("Sec-WebSocket-Protocol").unwrap(),
        "v1.saltyrtc.org"
    );

    let frame = match tokio::time::timeout(WAIT, socket.next()).await {
        Ok(Some(Ok(WsMessage::Binary(frame)))) => frame,
        other => panic!("expected server-hello, got {other:?}"),
    };
    let hello = SignalingMessage::from_bytes(&frame).unwrap();
    assert_eq!(hello.nonce.source, Address::SERVER);
    assert_eq!(hello.nonce.destination, Address::UNASSIGNED);
    assert!(matches!(hello.message, Message::ServerHello(_)));
    assert_eq!(relay.total_clients(), 1);

    socket.send(WsMessage::text("hello")).await.unwrap();
    match tokio::time::timeout(WAIT, socket.next()).await {
        Ok(Some(Ok(WsMessage::Close(Some(frame))))) => assert_eq!(u16::from(frame.code), 3001),
        other => panic!("expected close, got {other:?}"),
    }
}

#[tokio::test]
async fn add_device_registers_token() {
    let (relay, devices, server_keys, address) = start().await;
    let device = KeyPair::generate().unwrap();

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{address}/add-device"))
        .await
        .unwrap();

    let request = DeviceFrame {
        public_key: device.public_key(),
        nonce: [0; 24],
        data: DeviceMessage::AddDeviceRequest.to_bytes().unwrap(),
    };
    socket
        .send(WsMessage::binary(request.to_bytes()))
        .await
        .unwrap();

    let challenge = match tokio::time::timeout(WAIT, socket.next()).await {
        Ok(Some(Ok(WsMessage::Binary(frame)))) => DeviceFrame::from_bytes(&frame).unwrap(),
        other => panic!("expected add-device-control, got {other:?}"),
    };
    assert_eq!(challenge.public_key, server_keys.public_key());
    let plain = open_raw(
        &challenge.data,
        &challenge.nonce,
        &server_keys.public_key(),
        &device.private_key(),
    )
    .unwrap();
    let DeviceMessage::AddDeviceControl { uuid } = DeviceMessage::from_bytes(&plain).unwrap() else {
        panic!("expected add-device-control");
    };

    let nonce = [3u8; 24];
    let solved = DeviceMessage::AddDeviceSolved {
        uuid,
        device_token: "push-token".into(),
    }
    .to_bytes()
    .unwrap();
    let answer = DeviceFrame {
        public_key: device.public_key(),
        nonce,
        data: seal_raw(&solved, &nonce, &server_keys.public_key(), &device.private_key()).unwrap(),
    };
    socket.send(WsMessage::binary(answer.to_bytes())).await.unwrap();

    match tokio::time::timeout(WAIT, socket.next()).await {
        Ok(Some(Ok(WsMessage::Close(Some(frame))))) => assert_eq!(u16::from(frame.code), 1000),
        other => panic!("expected close, got {other:?}"),
    }

    let stored = devices
        .lookup(&device.public_key().to_hex())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.token, "push-token");
    assert_eq!(relay.metrics().devices_registered.load(Ordering::Relaxed), 1);
}

fn add_device_request(device: &KeyPair) -> WsMessage {
    let frame = DeviceFrame {
        public_key: device.public_key(),
        nonce: [0; 24],
        data: DeviceMessage::AddDeviceRequest.to_bytes().unwrap(),
    };
    WsMessage::binary(frame.to_bytes())
}

async fn next_binary<S>(socket: &mut S) -> Vec<u8>
where
    S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    match tokio::time::timeout(WAIT, socket.next()).await {
        Ok(Some(Ok(WsMessage::Binary(frame)))) => frame.to_vec(),
        other => panic!("expected binary frame, got {other:?}"),
    }
}

async fn wait_for_pending(relay: &SignalingRelay, expected: usize) {
    for _ in 0..100 {
        if relay.add_device().pending() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(relay.add_device().pending(), expected);
}

#[tokio::test]
async fn closed_add_device_socket_forgets_every_challenge() {
    let (relay, _devices, _keys, address) = start().await;
    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{address}/add-device"))
        .await
        .unwrap();

    for _ in 0..20 {
        socket
            .send(add_device_request(&KeyPair::generate().unwrap()))
            .await
            .unwrap();
        next_binary(&mut socket).await;
    }
    assert_eq!(relay.add_device().pending(), 20);

    socket.close(None).await.unwrap();
    wait_for_pending(&relay, 0).await;
}

#[tokio::test]
async fn closing_one_socket_keeps_challenge_of_another() {
    let (relay, devices, server_keys, address) = start().await;
    let device = KeyPair::generate().unwrap();
    let url = format!("ws://{address}/add-device");
    let (mut first, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    let (mut second, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();

    first.send(add_device_request(&device)).await.unwrap();
    next_binary(&mut first).await;
    second.send(add_device_request(&device)).await.unwrap();
    let challenge = DeviceFrame::from_bytes(&next_binary(&mut second).await).unwrap();

    first.close(None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(relay.add_device().pending(), 1);

    let plain = open_raw(
        &challenge.data,
        &challenge.nonce,
        &server_keys.public_key(),
        &device.private_key(),
    )
    .unwrap();
    let DeviceMessage::AddDeviceControl { uuid } = DeviceMessage::from_bytes(&plain).unwrap() else {
        panic!("expected add-device-control");
    };
    let nonce = [4u8; 24];
    let solved = DeviceMessage::AddDeviceSolved {
        uuid,
        device_token: "second-token".into(),
    }
    .to_bytes()
    .unwrap();
    let answer = DeviceFrame {
        public_key: device.public_key(),
        nonce,
        data: seal_raw(&solved, &nonce, &server_keys.public_key(), &device.private_key()).unwrap(),
    };
    second.send(WsMessage::binary(answer.to_bytes())).await.unwrap();

    match tokio::time::timeout(WAIT, second.next()).await {
        Ok(Some(Ok(WsMessage::Close(Some(frame))))) => assert_eq!(u16::from(frame.code), 1000),
        other => panic!("expected close, got {other:?}"),
    }
    let stored = devices
        .lookup(&device.public_key().to_hex())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.token, "second-token");
}

#[tokio::test]
async fn health_over_http() {
    let (_relay, _devices, _keys, address) = start().await;
    let body: serde_json::Value = reqwest::get(format!("http://{address}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["rooms"], 0);
}
