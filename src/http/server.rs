//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with a single catch-all proxy handler
//! - Wire up middleware (tracing, in-flight limit, transport tag)
//! - Serve plain HTTP or HTTPS with graceful shutdown
//! - Tie each request's cancellation to the caller's connection

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Extension, Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::config::{ConfigError, ProxyConfig};
use crate::http::pipeline::ProxyPipeline;
use crate::lifecycle::Shutdown;
use crate::net::Transport;

/// How long TLS connections get to drain after shutdown is signalled.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ProxyPipeline>,
}

/// HTTP server for the reverse proxy.
pub struct HttpServer {
    config: ProxyConfig,
    pipeline: Arc<ProxyPipeline>,
    in_flight: Arc<Semaphore>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, ConfigError> {
        let pipeline = Arc::new(ProxyPipeline::new(&config)?);
        Ok(Self::with_pipeline(config, pipeline))
    }

    /// Create a server around an already-built pipeline.
    pub fn with_pipeline(config: ProxyConfig, pipeline: Arc<ProxyPipeline>) -> Self {
        let in_flight = Arc::new(Semaphore::new(config.listener.max_connections));
        Self {
            config,
            pipeline,
            in_flight,
        }
    }

    /// Build the Axum router with all middleware layers.
    pub fn router(&self, transport: Transport) -> Router {
        let state = AppState {
            pipeline: self.pipeline.clone(),
        };

        Router::new()
            .fallback(proxy_handler)
            .with_state(state)
            .layer(Extension(transport))
            .layer(middleware::from_fn_with_state(
                self.in_flight.clone(),
                limit_in_flight,
            ))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server on a plain TCP listener until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: Shutdown,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.pipeline.forwarder().authority(),
            "HTTP server starting"
        );

        let app = self
            .router(Transport::Plain)
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.signalled().await;
                tracing::info!("HTTP server received shutdown signal");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server with TLS termination until `shutdown` fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        shutdown: Shutdown,
    ) -> Result<(), std::io::Error> {
        tracing::info!(
            address = %addr,
            upstream = %self.pipeline.forwarder().authority(),
            "HTTPS server starting"
        );

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            shutdown.signalled().await;
            tracing::info!("HTTPS server received shutdown signal");
            drain.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
        });

        let app = self
            .router(Transport::Tls)
            .into_make_service_with_connect_info::<SocketAddr>();

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(app)
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Bound the number of requests processed at once.
async fn limit_in_flight(
    State(limit): State<Arc<Semaphore>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match limit.acquire_owned().await {
        Ok(_permit) => next.run(request).await,
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "Server shutting down").into_response(),
    }
}

/// Main proxy handler.
///
/// The pipeline runs on its own task. If this handler is dropped because the
/// caller disconnected, the drop guard cancels the token and the in-flight
/// forward ends as a client-closed request instead of running to completion.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let cancel = CancellationToken::new();
    let _disconnect = cancel.clone().drop_guard();

    let pipeline = state.pipeline.clone();
    let task = tokio::spawn(async move { pipeline.handle(request, cancel).await });

    match task.await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "Pipeline task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}
