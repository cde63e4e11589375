//! Shop RPC server.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────────┐
//!                  │                     SHOP SERVER                       │
//!                  │                                                       │
//!   mTLS client    │  ┌──────────┐    ┌─────────┐    ┌───────────────┐     │
//!   ───────────────┼─▶│ rustls   │───▶│  http   │───▶│   service     │     │
//!                  │  │ acceptor │    │ routes  │    │ + item store  │     │
//!                  │  └────▲─────┘    └─────────┘    └───────────────┘     │
//!                  │       │ resolve per handshake                          │
//!                  │  ┌────┴────────────┐      ┌──────────────────┐         │
//!                  │  │ live credential │◀─────│ file watcher     │◀──── cert.pem / key.pem
//!                  │  └─────────────────┘      └──────────────────┘         │
//!                  │                                                       │
//!                  │  config · observability · lifecycle                   │
//!                  └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use shop_server::config::load_config;
use shop_server::error::StartupError;
use shop_server::lifecycle::signals::spawn_signal_listener;
use shop_server::lifecycle::{Application, Shutdown};
use shop_server::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "shop-server", version, about = "Item RPC server over mutual TLS")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(&args.config).map_err(StartupError::from)?;
    logging::init_logging(&config.observability).map_err(StartupError::from)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        "shop-server starting"
    );
    tracing::info!(
        bind_address = %config.server.bind_address,
        cert = %config.server.cert_path,
        key = %config.server.key_path,
        client_ca = %config.server.client_ca_path,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let address = &config.observability.metrics_address;
        let addr = address
            .parse()
            .map_err(|source| StartupError::MetricsAddress {
                address: address.clone(),
                source,
            })?;
        metrics::init_metrics(addr).map_err(StartupError::from)?;
    }

    let app = Application::build(&config)?;

    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());

    app.run(shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
