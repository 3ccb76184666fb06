//! Prometheus metrics endpoint.

use crate::server::SignalingRelay;
use axum::{http::header::CONTENT_TYPE, response::IntoResponse, Extension};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Prometheus metrics handler.
///
/// Returns metrics in Prometheus text format.
/// Includes both gauges (current state) and counters (monotonic since startup).
pub async fn metrics_handler(
    Extension(relay): Extension<Arc<SignalingRelay>>,
) -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        render(&relay),
    )
}

fn render(relay: &SignalingRelay) -> String {
    let m = relay.metrics();

    // Gauges
    let rooms = relay.total_rooms();
    let clients = relay.total_clients();
    let pending = relay.add_device().pending();

    // Counters
    let connections = m.connections_total.load(Ordering::Relaxed);
    let received = m.frames_received.load(Ordering::Relaxed);
    let relayed = m.frames_relayed.load(Ordering::Relaxed);
    let discarded = m.frames_discarded.load(Ordering::Relaxed);
    let initiators = m.initiators_authenticated.load(Ordering::Relaxed);
    let responders = m.responders_authenticated.load(Ordering::Relaxed);
    let errors = m.protocol_errors.load(Ordering::Relaxed);
    let notified = m.notifications_sent.load(Ordering::Relaxed);
    let notify_failures = m.notification_failures.load(Ordering::Relaxed);
    let devices = m.devices_registered.load(Ordering::Relaxed);

    format!(
        r#"# HELP signaling_relay_rooms_active Number of live rooms
# TYPE signaling_relay_rooms_active gauge
signaling_relay_rooms_active {rooms}

# HELP signaling_relay_clients_active Number of live signaling connections
# TYPE signaling_relay_clients_active gauge
signaling_relay_clients_active {clients}

# HELP signaling_relay_add_device_pending Unanswered add-device challenges
# TYPE signaling_relay_add_device_pending gauge
signaling_relay_add_device_pending {pending}

# HELP signaling_relay_info Server information
# TYPE signaling_relay_info gauge
signaling_relay_info{{version="{version}"}} 1

# HELP signaling_relay_connections_total Total signaling connections accepted
# TYPE signaling_relay_connections_total counter
signaling_relay_connections_total {connections}

# HELP signaling_relay_frames_received_total Total binary frames received
# TYPE signaling_relay_frames_received_total counter
signaling_relay_frames_received_total {received}

# HELP signaling_relay_frames_relayed_total Total frames relayed between peers
# TYPE signaling_relay_frames_relayed_total counter
signaling_relay_frames_relayed_total {relayed}

# HELP signaling_relay_frames_discarded_total Total relay frames discarded
# TYPE signaling_relay_frames_discarded_total counter
signaling_relay_frames_discarded_total {discarded}

# HELP signaling_relay_initiators_authenticated_total Total initiators authenticated
# TYPE signaling_relay_initiators_authenticated_total counter
signaling_relay_initiators_authenticated_total {initiators}

# HELP signaling_relay_responders_authenticated_total Total responders authenticated
# TYPE signaling_relay_responders_authenticated_total counter
signaling_relay_responders_authenticated_total {responders}

# HELP signaling_relay_protocol_errors_total Total connections dropped for protocol violations
# TYPE signaling_relay_protocol_errors_total counter
signaling_relay_protocol_errors_total {errors}

# HELP signaling_relay_notifications_sent_total Total wake-up notifications sent
# TYPE signaling_relay_notifications_sent_total counter
signaling_relay_notifications_sent_total {notified}

# HELP signaling_relay_notification_failures_total Total failed wake-up attempts
# TYPE signaling_relay_notification_failures_total counter
signaling_relay_notification_failures_total {notify_failures}

# HELP signaling_relay_devices_registered_total Total device tokens registered or updated
# TYPE signaling_relay_devices_registered_total counter
signaling_relay_devices_registered_total {devices}
"#,
        version = env!("CARGO_PKG_VERSION"),
    )
}
