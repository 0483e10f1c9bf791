//! mini-proxy
//!
//! A single-backend HTTP reverse proxy built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────┐
//!                      │                 MINI PROXY                   │
//!                      │                                              │
//!   Client Request     │  ┌────────┐   ┌──────────┐   ┌───────────┐  │
//!   ───────────────────┼─▶│  http  │──▶│ pipeline │──▶│ upstream  │──┼──▶ Backend
//!                      │  │ server │   │ rewrite  │   │ forwarder │  │
//!                      │  └────────┘   └──────────┘   └─────┬─────┘  │
//!                      │                                    │        │
//!   Client Response    │  ┌────────┐   ┌──────────┐         │        │
//!   ◀──────────────────┼──│  http  │◀──│transform │◀────────┘        │
//!                      │  │ server │   │ classify │                  │
//!                      │  └────────┘   └──────────┘                  │
//!                      │                                              │
//!                      │  config · observability · lifecycle          │
//!                      └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use mini_proxy::config::{load_config, validate_config, ConfigError, ProxyConfig};
use mini_proxy::lifecycle::{signals, Shutdown};
use mini_proxy::net::tls::load_tls_config;
use mini_proxy::observability::{logging, metrics};
use mini_proxy::HttpServer;

#[derive(Parser)]
#[command(name = "mini-proxy")]
#[command(about = "Single-backend HTTP reverse proxy", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,

    /// Override `upstream.address`.
    #[arg(short, long)]
    upstream: Option<String>,
}

fn resolve_config(cli: &Cli) -> Result<ProxyConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = &cli.bind {
        config.listener.bind_address = bind.clone();
    }
    if let Some(upstream) = &cli.upstream {
        config.upstream.address = upstream.clone();
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    logging::init_logging(&config.observability)?;
    tracing::info!("mini-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        max_connections = config.listener.max_connections,
        pool_max_connections = config.pool.max_connections,
        tls = config.listener.tls.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?);
    }

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let tls = config.listener.tls.clone();
    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::new(config)?;

    match tls {
        Some(tls) => {
            let rustls = load_tls_config(&tls).await?;
            server
                .run_tls(bind_address.parse()?, rustls, shutdown.clone())
                .await?;
        }
        None => {
            let listener = TcpListener::bind(&bind_address).await?;
            server.run(listener, shutdown.clone()).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
