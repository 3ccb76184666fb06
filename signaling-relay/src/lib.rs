//! # signaling-relay
//!
//! SaltyRTC signaling server.
//!
//! This crate implements a rendezvous server that:
//! - Accepts WebSocket connections under `/<initiator public key hex>`
//! - Runs the SaltyRTC server handshake with every client
//! - Assigns addresses (initiator `0x01`, responders `0x02..=0xff`)
//! - Relays end-to-end encrypted frames between initiator and responders
//! - Wakes an absent initiator through a push notification
//!
//! ## Architecture
//!
//! ```text
//! Initiator ──┐                       ┌── Responder
//!             │  WebSocket (binary)   │
//!             ├──────────────────────►│
//!         ┌───┴───────────────────────┴───┐
//!         │        signaling-relay        │
//!         │  rooms ─► clients ─► writers  │
//!         │  ┌──────────────────────────┐ │
//!         │  │ SQLite (device tokens)   │ │
//!         │  └──────────────────────────┘ │
//!         └───────────────────────────────┘
//! ```
//!
//! ## Protocol
//!
//! The server takes part in these messages:
//! - server-hello → client
//! - client-hello (responders), client-auth → server-auth
//! - new-initiator, new-responder, disconnected (server → peers)
//! - drop-responder (initiator → server)
//!
//! A separate `/add-device` socket lets devices register push tokens.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod devices;
pub mod error;
pub mod http;
pub mod keypair;
pub mod notify;
pub mod room;
pub mod rooms;
pub mod server;
pub mod service;
pub mod session;
pub mod storage;
