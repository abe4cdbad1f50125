//! FTL Comms Daemon (ftld)
//!
//! Hosts the simple line protocol and logs every event a client sends.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (port 6969)
//! ftld
//!
//! # Custom port, deliver robot-to-client lines to every client
//! ftld --port 7000 --delivery all
//!
//! # Print events as JSON lines on stdout
//! ftld --json
//!
//! # With configuration file
//! ftld --config /etc/ftl/ftld.toml
//! ```

mod config;

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use ftl_core::{CommsProtocol, Event, EventKind};
use ftl_transport::{DeliveryPolicy, SimpleProtocol};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{FileConfig, Overrides, Settings};

/// FTL Comms Daemon - robot communications over the simple line protocol
#[derive(Parser, Debug)]
#[command(name = "ftld")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TCP port to listen on [default: 6969]
    #[arg(short, long, env = "FTL_PORT")]
    port: Option<u16>,

    /// Bind address [default: 0.0.0.0]
    #[arg(long, env = "FTL_BIND")]
    bind: Option<IpAddr>,

    /// Configuration file path
    #[arg(short, long, env = "FTL_CONFIG")]
    config: Option<PathBuf>,

    /// Log level or filter directive (trace, debug, info, warn, error)
    #[arg(long, env = "FTL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Which clients receive robot-to-client lines [default: first]
    #[arg(long, env = "FTL_DELIVERY", value_enum)]
    delivery: Option<Delivery>,

    /// Print received events as JSON lines on stdout
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Delivery {
    /// Only the longest-connected client
    First,
    /// Every connected client
    All,
}

impl From<Delivery> for DeliveryPolicy {
    fn from(d: Delivery) -> Self {
        match d {
            Delivery::First => DeliveryPolicy::FirstClient,
            Delivery::All => DeliveryPolicy::AllClients,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let file = args.config.as_deref().map(FileConfig::load).transpose()?;
    let settings = Settings::resolve(
        file,
        Overrides {
            port: args.port,
            bind: args.bind,
            delivery: args.delivery.map(Into::into),
            log_level: args.log_level.clone(),
        },
    );

    // Initialize logging; RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .with_context(|| format!("Invalid log level: {}", settings.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let protocol = Arc::new(SimpleProtocol::with_config(settings.server.clone()));
    register_listeners(&protocol, args.json);

    info!(
        protocol = protocol.protocol_type(),
        port = protocol.port(),
        bind = %settings.server.bind,
        delivery = ?settings.server.delivery,
        "Starting FTL comms daemon"
    );

    protocol.start().await?;

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    protocol.stop().await?;

    Ok(())
}

fn register_listeners(protocol: &SimpleProtocol, json: bool) {
    for kind in EventKind::ALL {
        protocol.events().on(kind, move |event| log_event(event, json));
    }
}

fn log_event(event: &Event, json: bool) {
    if !json {
        info!(kind = %event.kind(), event = ?event, "Event received");
        return;
    }

    match serde_json::to_string(event) {
        Ok(line) => println!("{}", line),
        Err(e) => warn!(error = %e, "Failed to encode event"),
    }
}
