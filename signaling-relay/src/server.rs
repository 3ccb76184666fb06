//! Main SignalingRelay server coordination.
//!
//! SignalingRelay wires the protocol engine, the add-device service and the
//! metrics together and serves them over HTTP.

use crate::config::Config;
use crate::devices::AddDeviceService;
use crate::error::Result;
use crate::http::build_router;
use crate::keypair::{FileKeyPair, KeyPairStorage};
use crate::notify::{self, Notifier};
use crate::service::SaltyRtcService;
use crate::storage::{DeviceRepository, SqliteDeviceStore};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;

/// Operational metrics for monitoring relay activity.
///
/// All counters are monotonically increasing (reset only on restart).
/// Thread-safe via `AtomicU64`, no locks needed for incrementing.
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Total signaling connections accepted.
    pub connections_total: AtomicU64,
    /// Total binary frames received from clients.
    pub frames_received: AtomicU64,
    /// Total frames relayed between peers.
    pub frames_relayed: AtomicU64,
    /// Total relay frames discarded.
    pub frames_discarded: AtomicU64,
    /// Total initiators authenticated.
    pub initiators_authenticated: AtomicU64,
    /// Total responders authenticated.
    pub responders_authenticated: AtomicU64,
    /// Total connections dropped for protocol violations.
    pub protocol_errors: AtomicU64,
    /// Total wake-up notifications sent.
    pub notifications_sent: AtomicU64,
    /// Total failed device lookups or notification attempts.
    pub notification_failures: AtomicU64,
    /// Total device tokens registered or updated.
    pub devices_registered: AtomicU64,
}

/// Main relay server.
pub struct SignalingRelay {
    config: Config,
    metrics: Arc<RelayMetrics>,
    service: SaltyRtcService,
    add_device: AddDeviceService,
    started: Instant,
}

impl std::fmt::Debug for SignalingRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalingRelay")
            .field("config", &self.config)
            .field("metrics", &self.metrics)
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

impl SignalingRelay {
    /// Create a relay from loaded collaborators.
    pub fn new(
        config: Config,
        keys: Arc<dyn KeyPairStorage>,
        devices: Arc<dyn DeviceRepository>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let metrics = Arc::new(RelayMetrics::default());
        let service = SaltyRtcService::new(
            &config,
            keys.clone(),
            devices.clone(),
            notifier,
            metrics.clone(),
        );
        let add_device = AddDeviceService::new(keys, devices, metrics.clone());
        Self {
            config,
            metrics,
            service,
            add_device,
            started: Instant::now(),
        }
    }

    /// Load the permanent key pair and open the device database named in
    /// `config`, then build the relay.
    pub async fn open(config: Config) -> Result<Self> {
        let mut keys = FileKeyPair::new(&config.keys.public_key_path, &config.keys.private_key_path);
        keys.load()?;
        let devices = SqliteDeviceStore::new(&config.storage.database).await?;
        let notifier: Arc<dyn Notifier> = Arc::from(notify::from_config(&config.notifications));
        Ok(Self::new(config, Arc::new(keys), Arc::new(devices), notifier))
    }

    /// Get the relay configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get access to the operational metrics.
    pub fn metrics(&self) -> &RelayMetrics {
        &self.metrics
    }

    /// The protocol engine.
    pub fn service(&self) -> &SaltyRtcService {
        &self.service
    }

    /// The add-device registration service.
    pub fn add_device(&self) -> &AddDeviceService {
        &self.add_device
    }

    /// Seconds since the relay was created.
    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Number of live rooms.
    pub fn total_rooms(&self) -> usize {
        self.service.rooms().len()
    }

    /// Number of live signaling connections.
    pub fn total_clients(&self) -> usize {
        self.service.rooms().total_clients()
    }
}

/// Serve the relay on an already bound listener until the process stops.
pub async fn serve(relay: Arc<SignalingRelay>, listener: TcpListener) -> Result<()> {
    let address = listener.local_addr()?;
    tracing::info!("Listening on {}", address);
    axum::serve(listener, build_router(relay)).await?;
    Ok(())
}
