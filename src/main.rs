//! API relay (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌────────────────────────────────────────────────────┐
//!                  │                     API RELAY                       │
//!                  │                                                     │
//!   Admin client   │  ┌─────────┐      ┌──────────────┐                  │
//!   ───────────────┼─▶│  admin  │─────▶│ ConfigStore  │◀──── db.json     │
//!                  │  │ routes  │      └──────┬───────┘                  │
//!                  │  └─────────┘             │ get(id)                  │
//!   Proxy client   │  ┌─────────┐      ┌──────▼───────┐    ┌──────────┐ │
//!   ───────────────┼─▶│  proxy  │─────▶│ ProxyGateway │───▶│ upstream │─┼──▶ External API
//!   ◀──────────────┼──│ handler │◀─────│  pipeline    │◀───│  call    │◀┼───
//!                  │  └─────────┘      └──────────────┘    └──────────┘ │
//!                  │                                                     │
//!                  │  config · observability · lifecycle                 │
//!                  └────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use api_relay::config::{load_config, GatewayConfig};
use api_relay::lifecycle::{signals, Shutdown};
use api_relay::observability::{logging, metrics};
use api_relay::{ConfigStore, HttpServer, ProxyGateway};

#[derive(Parser)]
#[command(name = "api-relay")]
#[command(about = "Configurable external-API relay", long_about = None)]
struct Args {
    /// Settings file (TOML). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address.
    #[arg(long)]
    bind: Option<String>,

    /// Override store.path.
    #[arg(long)]
    store: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }
    if let Some(store) = args.store {
        config.store.path = store;
    }
    if let Err(errors) = api_relay::config::validation::validate_config(&config) {
        return Err(api_relay::config::ConfigError::Validation(errors).into());
    }

    logging::init_logging(&config.observability);

    tracing::info!("api-relay v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        store = %config.store.path,
        request_timeout_secs = config.upstream.request_timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = Arc::new(ConfigStore::open(&config.store.path).await?);
    let gateway = Arc::new(ProxyGateway::new(store, &config.upstream)?);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, gateway);
    let server_shutdown = shutdown.subscribe();
    let server_task = tokio::spawn(server.run(listener, server_shutdown));

    signals::wait_for_signal().await;
    shutdown.trigger();

    server_task.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
