//! The SaltyRTC protocol engine.
//!
//! [`SaltyRtcService`] owns the room registry and drives every connection
//! through the handshake:
//!
//! ```text
//! server-hello ──► client
//!                  client-hello (responders only)
//!                  client-auth ──► server-auth
//!                                  new-initiator / new-responder to peers
//! ```
//!
//! After authentication, frames between the initiator and its responders are
//! relayed verbatim. The initiator may ask the server to drop a responder.

use crate::client::{Client, ClientState, Outbound};
use crate::config::Config;
use crate::error::{ProtocolError, ProtocolResult};
use crate::keypair::KeyPairStorage;
use crate::notify::{wake_up_data, Notifier};
use crate::rooms::Rooms;
use crate::server::RelayMetrics;
use crate::storage::DeviceRepository;
use signaling_types::envelope;
use signaling_types::messages::{
    ClientAuth, Disconnected, DropResponder, NewResponder, ServerAuth, ServerHello,
};
use signaling_types::{Address, CloseCode, Key, Message, Nonce, SignalingError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;


/// How long to wait for a close frame to be flushed before cleaning up.
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Protocol engine shared by all signaling connections.
pub struct SaltyRtcService {
    rooms: Rooms,
    keys: Arc<dyn KeyPairStorage>,
    devices: Arc<dyn DeviceRepository>,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<RelayMetrics>,
    next_client_id: AtomicU64,
    subprotocol: String,
    pong_wait: Duration,
    max_ping_interval: i64,
    notification_title: String,
    notification_message: String,
}

impl std::fmt::Debug for SaltyRtcService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaltyRtcService")
            .field("rooms", &self.rooms.len())
            .field("subprotocol", &self.subprotocol)
            .finish_non_exhaustive()
    }
}

impl SaltyRtcService {
    /// Create the engine with its collaborators.
    pub fn new(
        config: &Config,
        keys: Arc<dyn KeyPairStorage>,
        devices: Arc<dyn DeviceRepository>,
        notifier: Arc<dyn Notifier>,
        metrics: Arc<RelayMetrics>,
    ) -> Self {
        Self {
            rooms: Rooms::new(config.rooms.reap_empty),
            keys,
            devices,
            notifier,
            metrics,
            next_client_id: AtomicU64::new(1),
            subprotocol: config.server.subprotocol.clone(),
            pong_wait: config.limits.pong_wait(),
            max_ping_interval: i64::try_from(config.limits.max_ping_interval_secs)
                .unwrap_or(i64::MAX),
            notification_title: config.notifications.title.clone(),
            notification_message: config.notifications.message.clone(),
        }
    }

    /// The room registry.
    pub fn rooms(&self) -> &Rooms {
        &self.rooms
    }

    /// The sub-protocol clients must offer.
    pub fn subprotocol(&self) -> &str {
        &self.subprotocol
    }

    /// Accept a new connection for the room of `initiator_key` and greet it
    /// with server-hello.
    ///
    /// On failure nothing of the client is left in the room.
    pub async fn on_connect(
        &self,
        initiator_key: Key,
        outbound: mpsc::UnboundedSender<Outbound>,
    ) -> ProtocolResult<Arc<Client>> {
        let room = self.rooms.join(initiator_key);
        let id = self.next_client_id.fetch_add(1, Ordering::Relaxed);

        let client = match Client::new(id, room.clone(), outbound) {
            Ok(client) => client,
            Err(e) => {
                self.rooms.leave(&room);
                return Err(e.into());
            }
        };
        room.lock().await.add(client.clone());

        let greeting = {
            let mut state = client.lock().await;
            let hello = Message::ServerHello(ServerHello {
                key: client.session().public_key(),
            });
            client.send_plain(&mut state, hello)
        };
        if let Err(e) = greeting {
            self.cleanup(&client).await;
            return Err(e);
        }

        self.metrics
            .connections_total
            .fetch_add(1, Ordering::Relaxed);
        tracing::info!(client = id, room = ?initiator_key, "Client connected");
        Ok(client)
    }

    /// Handle one inbound binary frame.
    ///
    /// An error means the connection must be dropped with
    /// [`ProtocolError::close_code`].
    pub async fn on_message(&self, client: &Arc<Client>, frame: &[u8]) -> ProtocolResult<()> {
        self.metrics.frames_received.fetch_add(1, Ordering::Relaxed);

        let (nonce, data) = envelope::split(frame)?;
        {
            let mut state = client.lock().await;
            client.validate_nonce(&mut state, &nonce)?;
        }

        if nonce.destination.is_server() {
            self.on_server_message(client, &nonce, data).await
        } else {
            self.relay(client, &nonce, frame).await;
            Ok(())
        }
    }

    async fn on_server_message(
        &self,
        client: &Arc<Client>,
        nonce: &Nonce,
        data: &[u8],
    ) -> ProtocolResult<()> {
        let (authenticated, address, permanent_key) = {
            let state = client.lock().await;
            (state.authenticated, state.address, state.permanent_key)
        };
        let session_private = client.session().private_key();
        let peer = permanent_key.unwrap_or_else(|| client.room().initiator_key());

        if authenticated {
            if !address.is_initiator() {
                return Err(ProtocolError::UnexpectedMessage(address));
            }
            let request =
                envelope::open(nonce, data, &peer, &session_private)?.into_drop_responder()?;
            return self.on_drop_responder(client, request).await;
        }

        match envelope::open(nonce, data, &peer, &session_private) {
            Ok(message) => {
                let auth = message.into_client_auth()?;
                self.on_client_auth(client, auth).await
            }
            Err(SignalingError::DecryptionFailed) => {
                if permanent_key.is_some() {
                    return Err(ProtocolError::UnexpectedClientHello);
                }
                let hello = Message::from_bytes(data)?.into_client_hello()?;
                client.lock().await.permanent_key = Some(hello.key);
                tracing::debug!(client = client.id(), key = ?hello.key, "Received client-hello");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn on_client_auth(&self, client: &Arc<Client>, auth: ClientAuth) -> ProtocolResult<()> {
        if auth.your_cookie != client.outgoing_cookie() {
            return Err(ProtocolError::YourCookieMismatch);
        }
        if !auth.offers(&self.subprotocol) {
            return Err(ProtocolError::SubprotocolMismatch(self.subprotocol.clone()));
        }
        if auth.ping_interval < 0 || auth.ping_interval > self.max_ping_interval {
            return Err(ProtocolError::InvalidPingInterval(auth.ping_interval));
        }
        if let Some(your_key) = auth.your_key {
            if your_key != self.keys.public_key() {
                return Err(ProtocolError::InvalidKey);
            }
        }
        if auth.ping_interval > 0 {
            client.start_keepalive(
                Duration::from_secs(auth.ping_interval as u64),
                self.pong_wait,
            );
        }

        let is_responder = client.lock().await.permanent_key.is_some();
        if is_responder {
            self.authenticate_responder(client).await
        } else {
            self.authenticate_initiator(client).await
        }
    }

    async fn authenticate_initiator(&self, client: &Arc<Client>) -> ProtocolResult<()> {
        let room = client.room();
        let (previous, result) = {
            let mut room_state = room.lock().await;

            let previous = room_state.set_initiator(client.clone());
            if let Some(previous) = &previous {
                previous.lock().await.authenticated = false;
            }

            {
                let mut state = client.lock().await;
                state.permanent_key = Some(room.initiator_key());
                state.address = Address::INITIATOR;
                state.authenticated = true;
            }

            for responder in room_state.responders() {
                let mut state = responder.lock().await;
                if state.authenticated {
                    if let Err(e) = responder.send_sealed(&mut state, Message::NewInitiator) {
                        tracing::debug!(client = responder.id(), "Failed to send new-initiator: {}", e);
                    }
                }
            }

            let responders = room_state.responder_addresses();
            let mut state = client.lock().await;
            let result = self.send_server_auth(client, &mut state, None, Some(responders));
            (previous, result)
        };

        // The previous initiator already lost its slot, so it goes either way.
        if let Some(previous) = previous {
            tracing::info!(client = previous.id(), "Evicting previous initiator");
            self.drop_client(&previous, CloseCode::DroppedByInitiator).await;
        }
        result?;

        self.metrics
            .initiators_authenticated
            .fetch_add(1, Ordering::Relaxed);
        tracing::info!(client = client.id(), room = ?room.initiator_key(), "Initiator authenticated");
        Ok(())
    }

    async fn authenticate_responder(&self, client: &Arc<Client>) -> ProtocolResult<()> {
        let room = client.room();
        let (address, initiator_connected) = {
            let mut room_state = room.lock().await;
            let address = room_state
                .next_free_responder()
                .ok_or(ProtocolError::PathFull)?;
            room_state.reserve(address, client.clone());

            {
                let mut state = client.lock().await;
                state.address = address;
                state.authenticated = true;
            }

            let mut initiator_connected = false;
            if let Some(initiator) = room_state.initiator() {
                let mut state = initiator.lock().await;
                if state.authenticated {
                    initiator_connected = true;
                    let notice = Message::NewResponder(NewResponder { id: address });
                    if let Err(e) = initiator.send_sealed(&mut state, notice) {
                        tracing::debug!(client = initiator.id(), "Failed to send new-responder: {}", e);
                    }
                }
            }

            let mut state = client.lock().await;
            self.send_server_auth(client, &mut state, Some(initiator_connected), None)?;
            (address, initiator_connected)
        };

        self.metrics
            .responders_authenticated
            .fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            client = client.id(),
            address = %address,
            initiator_connected,
            "Responder authenticated"
        );

        if !initiator_connected {
            self.wake_initiator(room.initiator_key(), address);
        }
        Ok(())
    }

    fn send_server_auth(
        &self,
        client: &Client,
        state: &mut ClientState,
        initiator_connected: Option<bool>,
        responders: Option<Vec<Address>>,
    ) -> ProtocolResult<()> {
        let permanent_key = state
            .permanent_key
            .ok_or_else(|| ProtocolError::Internal("permanent key unknown".into()))?;
        let nonce = client.reserve_nonce(state)?;
        let signed_keys = envelope::signed_keys(
            &client.session().public_key(),
            &permanent_key,
            &nonce,
            &self.keys.private_key(),
        )?;
        let message = Message::ServerAuth(ServerAuth {
            your_cookie: state.incoming_cookie.unwrap_or_default(),
            signed_keys,
            initiator_connected,
            responders,
        });
        client.send_sealed_with(state, nonce, message)
    }

    async fn on_drop_responder(
        &self,
        client: &Client,
        request: DropResponder,
    ) -> ProtocolResult<()> {
        let code = match request.reason {
            None | Some(0) => CloseCode::DroppedByInitiator,
            Some(value) => match CloseCode::try_from(value) {
                Ok(code) if code.is_drop_reason() => code,
                _ => return Err(ProtocolError::InvalidDropReason(value)),
            },
        };

        let target = client.room().lock().await.responder(request.id).cloned();
        match target {
            Some(target) => {
                tracing::info!(client = target.id(), address = %request.id, %code, "Initiator dropped responder");
                self.drop_client(&target, code).await;
            }
            None => {
                tracing::debug!(address = %request.id, "drop-responder for unknown address ignored");
            }
        }
        Ok(())
    }

    async fn relay(&self, client: &Arc<Client>, nonce: &Nonce, frame: &[u8]) {
        let room = client.room();
        let room_state = room.lock().await;

        let (source, authenticated) = {
            let state = client.lock().await;
            (state.address, state.authenticated)
        };
        let destination = nonce.destination;
        let paired = (source.is_initiator() && destination.is_responder())
            || (source.is_responder() && destination.is_initiator());

        let target = match room_state.client_at(destination) {
            Some(target) if authenticated && paired => target,
            _ => {
                self.discard(source, destination);
                return;
            }
        };
        if !target.lock().await.authenticated {
            self.discard(source, destination);
            return;
        }

        match target.send_frame(frame.to_vec()) {
            Ok(()) => {
                self.metrics.frames_relayed.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::debug!(client = target.id(), "Relay target unavailable: {}", e);
                self.discard(source, destination);
            }
        }
    }

    fn discard(&self, source: Address, destination: Address) {
        self.metrics.frames_discarded.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(%source, %destination, "Discarded relay frame");
    }

    fn wake_initiator(&self, initiator_key: Key, responder: Address) {
        let devices = self.devices.clone();
        let notifier = self.notifier.clone();
        let metrics = self.metrics.clone();
        let title = self.notification_title.clone();
        let message = self.notification_message.clone();

        // Fire-and-forget; a failed wake-up never affects the handshake.
        tokio::spawn(async move {
            let initiator_hex = initiator_key.to_hex();
            let device = match devices.lookup(&initiator_hex).await {
                Ok(Some(device)) => device,
                Ok(None) => {
                    tracing::debug!(initiator = ?initiator_key, "No device registered for wake-up");
                    return;
                }
                Err(e) => {
                    tracing::warn!(initiator = ?initiator_key, "Device lookup failed: {}", e);
                    metrics.notification_failures.fetch_add(1, Ordering::Relaxed);
                    return;
                }
            };

            let data = wake_up_data(&initiator_hex, responder.value());
            match notifier.notify(&title, &message, data, &device.token).await {
                Ok(()) => {
                    metrics.notifications_sent.fetch_add(1, Ordering::Relaxed);
                    tracing::info!(initiator = ?initiator_key, "Sent wake-up notification");
                }
                Err(e) => {
                    metrics.notification_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(initiator = ?initiator_key, "Wake-up notification failed: {}", e);
                }
            }
        });
    }

    /// Log and count a protocol violation, then drop the client with the
    /// matching close code.
    pub async fn fail(&self, client: &Arc<Client>, error: ProtocolError) {
        let code = error.close_code();
        self.metrics.protocol_errors.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(client = client.id(), %code, "Dropping client: {}", error);
        self.drop_client(client, code).await;
    }

    /// Close a client's connection with `code` and clean it up.
    ///
    /// The keepalive stops first; room state is touched only after the close
    /// frame was flushed (or the writer is gone).
    pub async fn drop_client(&self, client: &Arc<Client>, code: CloseCode) {
        client.stop_keepalive();
        if tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, client.close(code))
            .await
            .is_err()
        {
            tracing::debug!(client = client.id(), "Close frame not flushed in time");
            client.shutdown();
        }
        self.cleanup(client).await;
    }

    /// Remove a client from its room. Safe to call more than once.
    ///
    /// Peers are told about the departure, then the responder address is
    /// released, then the client leaves the room, then its keepalive stops.
    pub async fn cleanup(&self, client: &Arc<Client>) {
        if !client.begin_cleanup() {
            return;
        }

        let room = client.room();
        {
            let mut room_state = room.lock().await;
            let (address, authenticated) = {
                let mut state = client.lock().await;
                let snapshot = (state.address, state.authenticated);
                state.authenticated = false;
                snapshot
            };

            if authenticated {
                let notice = Message::Disconnected(Disconnected { id: address });
                let peers: Vec<_> = if address.is_initiator() {
                    room_state.responders().cloned().collect()
                } else {
                    room_state.initiator().cloned().into_iter().collect()
                };
                for peer in peers {
                    let mut state = peer.lock().await;
                    if state.authenticated {
                        if let Err(e) = peer.send_sealed(&mut state, notice.clone()) {
                            tracing::debug!(client = peer.id(), "Failed to send disconnected: {}", e);
                        }
                    }
                }
            }

            if address.is_responder() {
                room_state.release(address, client.id());
            } else if address.is_initiator() {
                room_state.clear_initiator(client.id());
            }
            room_state.remove(client.id());
        }
        client.stop_keepalive();
        client.shutdown();
        self.rooms.leave(room);

        tracing::info!(client = client.id(), "Client cleaned up");
    }
}
