//! Per-connection client state.
//!
//! A [`Client`] exists for every live signaling WebSocket. Its mutable state
//! sits behind an async mutex; when a room lock is also needed, the room lock
//! is always taken first.

use crate::error::{ProtocolError, ProtocolResult};
use crate::room::Room;
use signaling_types::{
    Address, CloseCode, CombinedSequenceNumber, Cookie, Key, KeyPair, Message, Nonce,
    SignalingError, SignalingMessage,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, Mutex, MutexGuard, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Process-unique client identifier.
pub type ClientId = u64;

/// A write request for the connection's writer task.
#[derive(Debug)]
pub enum Outbound {
    /// Binary frame.
    Frame(Vec<u8>),
    /// Keepalive ping.
    Ping,
    /// Close frame; `ack` fires once it has been flushed.
    Close {
        /// Numeric close code.
        code: u16,
        /// Human-readable reason.
        reason: &'static str,
        /// Flush confirmation.
        ack: Option<oneshot::Sender<()>>,
    },
}

/// Mutable protocol state of a client.
#[derive(Debug)]
pub struct ClientState {
    /// Assigned address, [`Address::UNASSIGNED`] until authenticated.
    pub address: Address,
    /// Permanent public key, once learned.
    pub permanent_key: Option<Key>,
    /// Counter for the next server-to-client message.
    pub outgoing_csn: CombinedSequenceNumber,
    /// Cookie pinned from the first server-bound message.
    pub incoming_cookie: Option<Cookie>,
    /// Expected counter of the next server-bound message.
    pub incoming_csn: Option<CombinedSequenceNumber>,
    /// Whether client-auth completed.
    pub authenticated: bool,
}

/// One signaling connection.
pub struct Client {
    id: ClientId,
    room: Arc<Room>,
    session: KeyPair,
    outgoing_cookie: Cookie,
    state: Mutex<ClientState>,
    outbound: mpsc::UnboundedSender<Outbound>,
    shutdown: watch::Sender<bool>,
    keepalive: std::sync::Mutex<Option<JoinHandle<()>>>,
    expired: Notify,
    created: Instant,
    last_pong_ms: AtomicU64,
    cleaned: AtomicBool,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("room", &self.room.initiator_key())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client with a fresh session key pair, cookie and counter.
    pub fn new(
        id: ClientId,
        room: Arc<Room>,
        outbound: mpsc::UnboundedSender<Outbound>,
    ) -> Result<Arc<Self>, SignalingError> {
        let (shutdown, _) = watch::channel(false);
        Ok(Arc::new(Self {
            id,
            room,
            session: KeyPair::generate()?,
            outgoing_cookie: Cookie::random()?,
            state: Mutex::new(ClientState {
                address: Address::UNASSIGNED,
                permanent_key: None,
                outgoing_csn: CombinedSequenceNumber::random()?,
                incoming_cookie: None,
                incoming_csn: None,
                authenticated: false,
            }),
            outbound,
            shutdown,
            keepalive: std::sync::Mutex::new(None),
            expired: Notify::new(),
            created: Instant::now(),
            last_pong_ms: AtomicU64::new(0),
            cleaned: AtomicBool::new(false),
        }))
    }

    /// Identifier of this client.
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// The room this client joined.
    pub fn room(&self) -> &Arc<Room> {
        &self.room
    }

    /// Ephemeral session key pair.
    pub fn session(&self) -> &KeyPair {
        &self.session
    }

    /// Cookie the server uses towards this client.
    pub fn outgoing_cookie(&self) -> Cookie {
        self.outgoing_cookie
    }

    /// Lock the protocol state.
    pub async fn lock(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().await
    }

    /// Subscribe to the shutdown signal raised by [`Client::shutdown`].
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Ask the connection's read loop to stop.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Mark the client cleaned up. Returns `false` if it already was.
    pub(crate) fn begin_cleanup(&self) -> bool {
        !self.cleaned.swap(true, Ordering::AcqRel)
    }

    /// Queue a raw frame for sending.
    pub fn send_frame(&self, frame: Vec<u8>) -> ProtocolResult<()> {
        self.outbound
            .send(Outbound::Frame(frame))
            .map_err(|_| ProtocolError::Internal("connection writer is gone".into()))
    }

    /// Queue a close frame and wait until it has been flushed or the writer
    /// has gone away.
    pub async fn close(&self, code: CloseCode) {
        let (ack, flushed) = oneshot::channel();
        let queued = self.outbound.send(Outbound::Close {
            code: code.as_u16(),
            reason: code.reason(),
            ack: Some(ack),
        });
        if queued.is_ok() {
            let _ = flushed.await;
        }
        self.shutdown();
    }

    fn next_nonce(&self, state: &mut ClientState) -> ProtocolResult<Nonce> {
        let nonce = Nonce::new(
            self.outgoing_cookie,
            Address::SERVER,
            state.address,
            state.outgoing_csn,
        );
        state.outgoing_csn = state.outgoing_csn.increment()?;
        Ok(nonce)
    }

    /// Send an unencrypted message.
    pub fn send_plain(&self, state: &mut ClientState, message: Message) -> ProtocolResult<()> {
        let nonce = self.next_nonce(state)?;
        let frame = SignalingMessage::new(nonce, message).to_bytes()?;
        self.send_frame(frame)
    }

    /// Send a message sealed from the session key to the client's permanent
    /// key.
    pub fn send_sealed(&self, state: &mut ClientState, message: Message) -> ProtocolResult<()> {
        let nonce = self.next_nonce(state)?;
        self.send_sealed_with(state, nonce, message)
    }

    /// Seal `message` under a nonce obtained from [`Client::reserve_nonce`].
    pub(crate) fn send_sealed_with(
        &self,
        state: &ClientState,
        nonce: Nonce,
        message: Message,
    ) -> ProtocolResult<()> {
        let peer = state
            .permanent_key
            .ok_or_else(|| ProtocolError::Internal("permanent key unknown".into()))?;
        let frame = SignalingMessage::new(nonce, message).seal(&peer, &self.session.private_key())?;
        self.send_frame(frame)
    }

    /// Take the next outgoing nonce without sending anything yet.
    pub(crate) fn reserve_nonce(&self, state: &mut ClientState) -> ProtocolResult<Nonce> {
        self.next_nonce(state)
    }

    /// Check an inbound nonce and advance the expected counter.
    ///
    /// Cookie pinning and counter tracking apply to server-bound messages
    /// only.
    pub fn validate_nonce(&self, state: &mut ClientState, nonce: &Nonce) -> ProtocolResult<()> {
        if !nonce.destination.is_server()
            && (!state.authenticated || nonce.destination == state.address)
        {
            return Err(ProtocolError::InvalidDestination {
                source_address: nonce.source,
                destination: nonce.destination,
            });
        }

        if nonce.source != state.address {
            return Err(ProtocolError::InvalidSource {
                expected: state.address,
                actual: nonce.source,
            });
        }

        if !nonce.destination.is_server() {
            return Ok(());
        }

        match state.incoming_cookie {
            Some(pinned) if pinned != nonce.cookie => return Err(ProtocolError::InvalidCookie),
            Some(_) => {}
            None if nonce.cookie == self.outgoing_cookie => {
                return Err(ProtocolError::ReflectedCookie)
            }
            None => state.incoming_cookie = Some(nonce.cookie),
        }

        let received = nonce.combined_sequence_number();
        match state.incoming_csn {
            Some(expected) if expected != received => {
                return Err(ProtocolError::InvalidSequence {
                    expected: expected.to_string(),
                    actual: received.to_string(),
                })
            }
            Some(_) => {}
            None if received.overflow().value() != 0 => {
                return Err(ProtocolError::InvalidInitialOverflow(
                    received.overflow().value(),
                ))
            }
            None => {}
        }
        state.incoming_csn = Some(received.increment()?);
        Ok(())
    }

    /// Record a pong from the peer.
    pub fn record_pong(&self) {
        self.last_pong_ms
            .store(self.elapsed_ms(), Ordering::Release);
    }

    fn elapsed_ms(&self) -> u64 {
        // +1 keeps a pong at creation time distinguishable from "never"
        self.created.elapsed().as_millis() as u64 + 1
    }

    /// Start pinging every `interval`. If a pong does not arrive within
    /// `pong_wait` the task stops and [`Client::keepalive_expired`] resolves.
    /// Closing the connection is up to its owner.
    pub fn start_keepalive(self: &Arc<Self>, interval: Duration, pong_wait: Duration) {
        let weak = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let sent_at = match weak.upgrade() {
                    Some(client) => {
                        let sent_at = client.elapsed_ms();
                        if client.outbound.send(Outbound::Ping).is_err() {
                            return;
                        }
                        sent_at
                    }
                    None => return,
                };

                tokio::time::sleep(pong_wait).await;
                let Some(client) = weak.upgrade() else {
                    return;
                };
                if client.last_pong_ms.load(Ordering::Acquire) < sent_at {
                    tracing::info!(client = client.id, "Keepalive pong timed out");
                    client.expired.notify_one();
                    return;
                }
            }
        });
        self.replace_keepalive(Some(task));
    }

    fn replace_keepalive(&self, task: Option<JoinHandle<()>>) {
        let previous = match self.keepalive.lock() {
            Ok(mut slot) => std::mem::replace(&mut *slot, task),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), task),
        };
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Resolves once a keepalive ping went unanswered.
    pub async fn keepalive_expired(&self) {
        self.expired.notified().await;
    }

    /// Stop the keepalive timer, if running.
    pub fn stop_keepalive(&self) {
        self.replace_keepalive(None);
    }

    /// Whether a keepalive timer is running.
    pub fn has_keepalive(&self) -> bool {
        match self.keepalive.lock() {
            Ok(slot) => slot.as_ref().is_some_and(|t| !t.is_finished()),
            Err(_) => false,
        }
    }
}
