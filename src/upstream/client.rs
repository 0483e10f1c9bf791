//! Backend forwarding.
//!
//! # Responsibilities
//! - Send one forwarding request to the backend per inbound request
//! - Bound idle and total connections, expire idle ones
//! - Fail fast on an unreachable backend (dial timeout)
//! - Stop waiting as soon as the caller cancels

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::uri::Authority;
use axum::http::{Request, Response};
use futures_util::StreamExt;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::{TokioExecutor, TokioTimer};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::config::{PoolConfig, TimeoutConfig};
use crate::resilience::ForwardError;

/// Client for the single configured backend.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    authority: Authority,
    connection_limit: Arc<Semaphore>,
    max_connections: usize,
}

impl Forwarder {
    pub fn new(authority: Authority, pool: &PoolConfig, timeouts: &TimeoutConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
        connector.set_keepalive(Some(Duration::from_secs(timeouts.keepalive_secs)));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(pool.idle_timeout_secs))
            .pool_max_idle_per_host(pool.max_idle_per_host)
            .pool_timer(TokioTimer::new())
            .build(connector);

        Self {
            client,
            authority,
            connection_limit: Arc::new(Semaphore::new(pool.max_connections)),
            max_connections: pool.max_connections,
        }
    }

    /// The backend authority requests are sent to.
    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Connection slots currently free.
    pub fn available_connections(&self) -> usize {
        self.connection_limit.available_permits()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Send `request` upstream. A single attempt; never retried.
    ///
    /// Waits for a connection slot first. The slot is held until the
    /// response body has been fully streamed (or dropped).
    pub async fn forward(
        &self,
        request: Request<Body>,
        cancel: &CancellationToken,
    ) -> Result<Response<Body>, ForwardError> {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ForwardError::Canceled),
            permit = self.connection_limit.clone().acquire_owned() => {
                permit.map_err(ForwardError::from_source)?
            }
        };

        tracing::trace!(
            uri = %request.uri(),
            available_connections = self.connection_limit.available_permits(),
            "Forwarding request"
        );

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ForwardError::Canceled),
            result = self.client.request(request) => result.map_err(ForwardError::from_source)?,
        };

        let (parts, body) = response.into_parts();
        let body = Body::new(body).into_data_stream().map(move |chunk| {
            let _slot = &permit;
            chunk
        });
        Ok(Response::from_parts(parts, Body::from_stream(body)))
    }
}
