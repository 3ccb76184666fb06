//! signaling-relay binary entry point.
//!
//! Usage:
//! ```bash
//! signaling-relay --config relay.toml
//! signaling-relay keygen --out-dir ./keys
//! signaling-relay --help
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use saltyrtc_signaling_relay::config::Config;
use saltyrtc_signaling_relay::keypair;
use saltyrtc_signaling_relay::server::{self, SignalingRelay};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "signaling-relay", version, about = "SaltyRTC signaling server")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "relay.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the server (default).
    Serve,
    /// Generate a permanent key pair.
    Keygen {
        /// Directory for public.key and private.key.
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Keygen { out_dir } => {
            let (public, private) = keypair::generate_files(&out_dir)?;
            println!("Wrote {} and {}", public.display(), private.display());
            Ok(())
        }
        Command::Serve => serve(cli.config).await,
    }
}

async fn serve(config_path: PathBuf) -> anyhow::Result<()> {
    let config = if config_path.exists() {
        Config::from_file(&config_path)
            .with_context(|| format!("loading {}", config_path.display()))?
    } else {
        Config::default()
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log.level))
        .context("invalid log level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if !config_path.exists() {
        tracing::warn!("{} not found, using defaults", config_path.display());
    }

    let bind_address = config.server.bind_address.clone();
    let relay = Arc::new(SignalingRelay::open(config).await.context("starting relay")?);
    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("binding {bind_address}"))?;
    tracing::info!("signaling-relay v{} starting", env!("CARGO_PKG_VERSION"));

    server::serve(relay, listener).await?;
    Ok(())
}
