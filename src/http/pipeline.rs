//! The request/response transformation pipeline.
//!
//! ```text
//! inbound ─▶ RequestContext::begin ─▶ rewrite_request ─▶ request log
//!        ─▶ Forwarder::forward ─┬─▶ Err ─▶ classify_error ─────────────▶ caller
//!                               └─▶ Ok  ─▶ transform_response ─▶ caller
//! ```
//!
//! The pipeline is built once at startup and shared behind an `Arc`. It holds
//! no per-request state; everything request-scoped lives in `RequestContext`.

use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::config::{validate_config, ConfigError, HealthConfig, ProxyConfig};
use crate::http::context::RequestContext;
use crate::http::request::{self, RequestId, X_REQUEST_ID};
use crate::http::response;
use crate::observability::access_log::{
    status_text, AccessLog, HeaderSnapshot, LogRecord, RequestLog, ResponseLog, TracingAccessLog,
};
use crate::observability::metrics;
use crate::resilience::{self, ForwardError};
use crate::upstream::Forwarder;

/// Failures inside the pipeline itself.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The response stage ran without a timing context: a wiring defect.
    #[error("request timing context missing")]
    MissingTimingContext,

    #[error(transparent)]
    Forward(#[from] ForwardError),
}

/// The named stages of a proxy pipeline.
pub trait Pipeline: Send + Sync {
    /// Produce the forwarding request from an inbound request.
    fn rewrite_request(&self, request: Request<Body>, ctx: &RequestContext) -> Request<Body>;

    /// Turn a forwarding failure into the response the caller sees.
    fn classify_error(&self, err: ForwardError, ctx: &RequestContext) -> Response<Body>;

    /// Rewrite a successful backend response before it reaches the caller.
    fn transform_response(
        &self,
        response: Response<Body>,
        path: &str,
        ctx: Option<&RequestContext>,
    ) -> impl Future<Output = Result<Response<Body>, PipelineError>> + Send;
}

/// Single-backend pipeline.
#[derive(Debug)]
pub struct ProxyPipeline {
    forwarder: Forwarder,
    health: HealthConfig,
    access_log: Arc<dyn AccessLog>,
}

impl ProxyPipeline {
    /// Build a pipeline that writes access records through `tracing`.
    pub fn new(config: &ProxyConfig) -> Result<Self, ConfigError> {
        Self::with_access_log(config, Arc::new(TracingAccessLog))
    }

    /// Build a pipeline with a custom access log sink.
    pub fn with_access_log(
        config: &ProxyConfig,
        access_log: Arc<dyn AccessLog>,
    ) -> Result<Self, ConfigError> {
        validate_config(config).map_err(ConfigError::Validation)?;
        let authority = config.upstream.authority().map_err(|_| {
            ConfigError::Validation(vec![crate::config::ValidationError::UpstreamAddress(
                config.upstream.address.clone(),
            )])
        })?;

        Ok(Self {
            forwarder: Forwarder::new(authority, &config.pool, &config.timeouts),
            health: config.health.clone(),
            access_log,
        })
    }

    pub fn forwarder(&self) -> &Forwarder {
        &self.forwarder
    }

    /// Run one request through every stage.
    ///
    /// `cancel` fires when the caller goes away; the in-flight forward then
    /// stops and is classified as client-closed.
    pub async fn handle(&self, request: Request<Body>, cancel: CancellationToken) -> Response<Body> {
        let ctx = RequestContext::begin(RequestId::resolve(request.headers()));
        let method = request.method().to_string();
        let path = request.uri().path().to_string();

        tracing::debug!(
            request_id = %ctx.request_id(),
            method = %method,
            path = %path,
            "Proxying request"
        );

        let remote_addr = request::remote_addr(&request)
            .map(|a| a.to_string())
            .unwrap_or_default();
        let forwarding = self.rewrite_request(request, &ctx);
        self.log_request(&forwarding, &ctx, remote_addr);

        let response = match self.forwarder.forward(forwarding, &cancel).await {
            Ok(response) => self.transform_response(response, &path, Some(&ctx)).await,
            Err(err) => Err(PipelineError::Forward(err)),
        };

        let response = match response {
            Ok(response) => response,
            Err(PipelineError::Forward(err)) => self.classify_error(err, &ctx),
            Err(err @ PipelineError::MissingTimingContext) => {
                tracing::error!(request_id = %ctx.request_id(), error = %err, "Pipeline wiring error");
                internal_error(ctx.request_id())
            }
        };

        metrics::record_request(&method, response.status().as_u16(), ctx.elapsed());
        response
    }

    fn log_request(&self, forwarding: &Request<Body>, ctx: &RequestContext, remote_addr: String) {
        let elapsed = ctx.elapsed();
        self.access_log.record(LogRecord::Request(RequestLog {
            id: ctx.request_id().to_string(),
            method: forwarding.method().to_string(),
            url: forwarding.uri().to_string(),
            headers: HeaderSnapshot::from(forwarding.headers()),
            body: String::new(),
            remote_addr,
            timestamp: Utc::now(),
            upstream_time: elapsed,
            processing_time: elapsed,
        }));
    }

    fn log_response(&self, response: &Response<Body>, ctx: &RequestContext, duration: std::time::Duration) {
        self.access_log.record(LogRecord::Response(ResponseLog {
            id: ctx.request_id().to_string(),
            status: status_text(response.status()),
            status_code: response.status().as_u16(),
            headers: HeaderSnapshot::from(response.headers()),
            body: String::new(),
            timestamp: Utc::now(),
            duration,
        }));
    }
}

impl Pipeline for ProxyPipeline {
    fn rewrite_request(&self, request: Request<Body>, ctx: &RequestContext) -> Request<Body> {
        request::forwarding_request(request, self.forwarder.authority(), ctx)
    }

    fn classify_error(&self, err: ForwardError, ctx: &RequestContext) -> Response<Body> {
        tracing::error!(
            request_id = %ctx.request_id(),
            kind = err.kind(),
            error = %err,
            "proxy error"
        );
        metrics::record_upstream_error(err.kind());

        let response = resilience::error_response(&err, ctx.request_id());
        self.log_response(&response, ctx, ctx.elapsed());
        response
    }

    async fn transform_response(
        &self,
        response: Response<Body>,
        path: &str,
        ctx: Option<&RequestContext>,
    ) -> Result<Response<Body>, PipelineError> {
        let ctx = ctx.ok_or(PipelineError::MissingTimingContext)?;
        let duration = ctx.elapsed();

        let mut response = response;
        response::strip_response_headers(&mut response);

        let mut response = if path == self.health.path {
            response::rewrite_health(response, self.health.max_body_bytes, Utc::now()).await?
        } else {
            response
        };

        if let Some(value) = ctx.request_id().header_value() {
            response.headers_mut().insert(X_REQUEST_ID, value);
        }

        self.log_response(&response, ctx, duration);
        Ok(response)
    }
}

fn internal_error(request_id: &RequestId) -> Response<Body> {
    let mut response = Response::new(Body::from("Internal Server Error\n"));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    if let Some(value) = request_id.header_value() {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}
