//! HTTP endpoints for signaling-relay.
//!
//! Provides health checks, metrics, and the two WebSocket entry points.

pub mod health;
mod metrics;

use crate::server::SignalingRelay;
use crate::session;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Extension, Router};
use signaling_types::Key;
use std::sync::Arc;

pub use health::HealthStatus;

/// Build the HTTP router with all endpoints.
pub fn build_router(relay: Arc<SignalingRelay>) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/add-device", get(add_device_handler))
        .route("/:initiator_key", get(signaling_handler))
        .layer(Extension(relay))
}

/// Upgrade to a signaling socket in the room of the initiator key in the path.
async fn signaling_handler(
    Path(initiator_key): Path<String>,
    Extension(relay): Extension<Arc<SignalingRelay>>,
    ws: Option<WebSocketUpgrade>,
) -> Response {
    let key = match Key::from_hex(&initiator_key) {
        Ok(key) => key,
        Err(e) => {
            tracing::debug!("Rejected upgrade for {:?}: {}", initiator_key, e);
            return (StatusCode::BAD_REQUEST, format!("invalid initiator key: {e}"))
                .into_response();
        }
    };
    let Some(ws) = ws else {
        return (StatusCode::UPGRADE_REQUIRED, "expected a WebSocket upgrade").into_response();
    };

    let subprotocol = relay.config().server.subprotocol.clone();
    ws.protocols([subprotocol])
        .on_upgrade(move |socket| session::run_signaling(relay, key, socket))
}

/// Upgrade to an add-device socket.
async fn add_device_handler(
    Extension(relay): Extension<Arc<SignalingRelay>>,
    ws: Option<WebSocketUpgrade>,
) -> Response {
    match ws {
        Some(ws) => ws.on_upgrade(move |socket| session::run_add_device(relay, socket)),
        None => (StatusCode::UPGRADE_REQUIRED, "expected a WebSocket upgrade").into_response(),
    }
}
