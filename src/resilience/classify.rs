//! Forwarding failure classification.
//!
//! | outcome                          | status |
//! |----------------------------------|--------|
//! | caller went away before response | 499    |
//! | dial deadline exceeded           | 504    |
//! | anything else                    | 502    |
//!
//! No failure is retried; every classification is terminal for the request.

use axum::body::Body;
use axum::http::{HeaderValue, Response, StatusCode};

use crate::http::request::{RequestId, X_REQUEST_ID};
use crate::resilience::timeouts::is_timeout;

/// Boxed error carried by upstream failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Non-standard status for a client that closed the request.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Why a forwarding attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("request canceled by caller")]
    Canceled,

    #[error("upstream timed out: {0}")]
    Timeout(#[source] BoxError),

    #[error("upstream request failed: {0}")]
    Upstream(#[source] BoxError),
}

impl ForwardError {
    /// Wrap a transport error, separating timeouts from other failures.
    pub fn from_source(err: impl Into<BoxError>) -> Self {
        let err = err.into();
        if is_timeout(&*err) {
            ForwardError::Timeout(err)
        } else {
            ForwardError::Upstream(err)
        }
    }

    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ForwardError::Canceled => "canceled",
            ForwardError::Timeout(_) => "timeout",
            ForwardError::Upstream(_) => "upstream",
        }
    }

    /// HTTP status the caller sees.
    pub fn status(&self) -> StatusCode {
        match self {
            ForwardError::Canceled => client_closed_request(),
            ForwardError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ForwardError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// The 499 status code.
pub fn client_closed_request() -> StatusCode {
    // 499 is within the 100..=999 range `from_u16` accepts.
    StatusCode::from_u16(CLIENT_CLOSED_REQUEST).unwrap_or(StatusCode::BAD_REQUEST)
}

/// Build the response the caller receives for a classified failure.
pub fn error_response(err: &ForwardError, request_id: &RequestId) -> Response<Body> {
    let status = err.status();
    let body = match err {
        ForwardError::Canceled => Body::empty(),
        ForwardError::Timeout(_) => Body::from("Gateway Timeout\n"),
        ForwardError::Upstream(_) => Body::from("Bad Gateway\n"),
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    if !matches!(err, ForwardError::Canceled) {
        response.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
    }
    if let Some(value) = request_id.header_value() {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}
