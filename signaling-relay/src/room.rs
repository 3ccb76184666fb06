//! A room: the clients sharing one initiator identity.

use crate::client::{Client, ClientId};
use signaling_types::{Address, Key};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// Clients connected under one initiator public key.
#[derive(Debug)]
pub struct Room {
    initiator_key: Key,
    state: Mutex<RoomState>,
    members: AtomicUsize,
}

/// Mutable room contents, guarded by the room lock.
#[derive(Debug, Default)]
pub struct RoomState {
    clients: HashMap<ClientId, Arc<Client>>,
    initiator: Option<Arc<Client>>,
    responders: BTreeMap<Address, Arc<Client>>,
}

impl Room {
    /// Create an empty room.
    pub fn new(initiator_key: Key) -> Self {
        Self {
            initiator_key,
            state: Mutex::new(RoomState::default()),
            members: AtomicUsize::new(0),
        }
    }

    /// Permanent public key of the room's initiator.
    pub fn initiator_key(&self) -> Key {
        self.initiator_key
    }

    /// Lock the room contents.
    pub async fn lock(&self) -> MutexGuard<'_, RoomState> {
        self.state.lock().await
    }

    /// Connections counted by the registry.
    pub fn members(&self) -> usize {
        self.members.load(Ordering::Acquire)
    }

    pub(crate) fn join(&self) {
        self.members.fetch_add(1, Ordering::AcqRel);
    }

    /// Returns the number of members left.
    pub(crate) fn leave(&self) -> usize {
        let previous = self
            .members
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_sub(1))
            })
            .unwrap_or_else(|n| n);
        previous.saturating_sub(1)
    }
}

impl RoomState {
    /// Register a connected client.
    pub fn add(&mut self, client: Arc<Client>) {
        self.clients.insert(client.id(), client);
    }

    /// Forget a client. Returns whether it was present.
    pub fn remove(&mut self, id: ClientId) -> bool {
        self.clients.remove(&id).is_some()
    }

    /// Whether a client is registered.
    pub fn contains(&self, id: ClientId) -> bool {
        self.clients.contains_key(&id)
    }

    /// Number of registered clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether no client is registered.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// The authenticated initiator, if any.
    pub fn initiator(&self) -> Option<&Arc<Client>> {
        self.initiator.as_ref()
    }

    /// Install a new initiator, returning the one it replaces.
    pub fn set_initiator(&mut self, client: Arc<Client>) -> Option<Arc<Client>> {
        self.initiator.replace(client)
    }

    /// Clear the initiator slot if `id` holds it.
    pub fn clear_initiator(&mut self, id: ClientId) -> bool {
        if self.initiator.as_ref().is_some_and(|c| c.id() == id) {
            self.initiator = None;
            true
        } else {
            false
        }
    }

    /// Lowest responder address that is not reserved.
    pub fn next_free_responder(&self) -> Option<Address> {
        Address::responders().find(|a| !self.responders.contains_key(a))
    }

    /// Reserve `address` for `client`.
    pub fn reserve(&mut self, address: Address, client: Arc<Client>) {
        debug_assert!(address.is_responder());
        self.responders.insert(address, client);
    }

    /// Release `address` if `id` holds it.
    pub fn release(&mut self, address: Address, id: ClientId) -> bool {
        if self.responders.get(&address).is_some_and(|c| c.id() == id) {
            self.responders.remove(&address);
            true
        } else {
            false
        }
    }

    /// Responder at `address`.
    pub fn responder(&self, address: Address) -> Option<&Arc<Client>> {
        self.responders.get(&address)
    }

    /// Reserved responder addresses in ascending order.
    pub fn responder_addresses(&self) -> Vec<Address> {
        self.responders.keys().copied().collect()
    }

    /// All reserved responders.
    pub fn responders(&self) -> impl Iterator<Item = &Arc<Client>> {
        self.responders.values()
    }

    /// Client currently holding `address`.
    pub fn client_at(&self, address: Address) -> Option<&Arc<Client>> {
        if address.is_initiator() {
            self.initiator()
        } else if address.is_responder() {
            self.responder(address)
        } else {
            None
        }
    }
}
