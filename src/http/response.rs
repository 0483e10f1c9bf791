//! Response handling and transformation.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers from the backend response
//! - Normalize health-check bodies into the proxy's own shape
//! - Mark rewritten responses (`X-Modified-By-Proxy`, `Via`)
//!
//! # Design Decisions
//! - Only the health path is buffered; everything else streams
//! - Buffering is capped; oversized bodies pass through untouched
//! - A body that does not decode is returned byte-for-byte

use axum::body::{Body, Bytes};
use axum::http::header::{self, HeaderName, HeaderValue};
use axum::http::Response;
use chrono::{DateTime, SecondsFormat, Utc};
use futures_util::{stream, StreamExt};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::http::request::strip_hop_by_hop;
use crate::resilience::ForwardError;

pub const X_MODIFIED_BY_PROXY: HeaderName = HeaderName::from_static("x-modified-by-proxy");

/// `Via` value added to health responses.
pub const VIA: &str = "1.1 mini-proxy";

/// Health payload as the backend reports it.
#[derive(Debug, Default)]
struct BackendHealth {
    status: String,
    time_stamp: Option<DateTime<Utc>>,
}

/// Why a backend health body could not be decoded.
#[derive(Debug, thiserror::Error)]
enum HealthDecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected shape: {0}")]
    Shape(&'static str),

    #[error("invalid timeStamp: {0}")]
    Timestamp(#[from] chrono::ParseError),
}

impl BackendHealth {
    /// Lenient decode: `null` is an empty payload, unknown keys are ignored
    /// and field names match case-insensitively (exact spelling wins).
    fn decode(body: &[u8]) -> Result<Self, HealthDecodeError> {
        let fields = match serde_json::from_slice::<Value>(body)? {
            Value::Null => return Ok(Self::default()),
            Value::Object(fields) => fields,
            _ => return Err(HealthDecodeError::Shape("body is not an object")),
        };

        let status = match field(&fields, "status") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(status)) => status.clone(),
            Some(_) => return Err(HealthDecodeError::Shape("status is not a string")),
        };
        let time_stamp = match field(&fields, "timeStamp") {
            None | Some(Value::Null) => None,
            Some(Value::String(raw)) => {
                Some(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
            }
            Some(_) => return Err(HealthDecodeError::Shape("timeStamp is not a string")),
        };

        Ok(Self { status, time_stamp })
    }
}

fn field<'a>(fields: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    fields.get(name).or_else(|| {
        fields
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    })
}

/// Health payload as the proxy returns it.
#[derive(Debug, Serialize)]
struct ProxyHealth<'a> {
    original_status: &'a str,
    status: &'a str,
    timestamp: String,
}

/// Outcome of reading a body up to a limit.
#[derive(Debug)]
pub enum Buffered {
    /// The whole body fit within the limit.
    Complete(Bytes),
    /// The body exceeded the limit; this is the unchanged original stream.
    Overflow(Body),
}

/// Read `body` into memory unless it is larger than `limit` bytes.
///
/// On overflow the bytes already read are chained back in front of the
/// remaining stream, so the caller still gets the original body.
pub async fn buffer_bounded(body: Body, limit: usize) -> Result<Buffered, axum::Error> {
    let mut data = body.into_data_stream();
    let mut buf: Vec<u8> = Vec::new();

    while let Some(chunk) = data.next().await {
        let chunk = chunk?;
        buf.extend_from_slice(&chunk);
        if buf.len() > limit {
            let prefix = Bytes::from(buf);
            let rest = stream::once(async move { Ok::<_, axum::Error>(prefix) }).chain(data);
            return Ok(Buffered::Overflow(Body::from_stream(rest)));
        }
    }

    Ok(Buffered::Complete(Bytes::from(buf)))
}

/// Rewrite a backend health body, or `None` if it does not decode.
pub fn normalize_health_body(original: &[u8], now: DateTime<Utc>) -> Option<Vec<u8>> {
    let health = match BackendHealth::decode(original) {
        Ok(h) => h,
        Err(e) => {
            tracing::debug!(error = %e, "Health body did not decode, passing through");
            return None;
        }
    };
    tracing::debug!(
        status = %health.status,
        backend_timestamp = ?health.time_stamp,
        "Normalizing health body"
    );

    let rewritten = ProxyHealth {
        original_status: &health.status,
        status: &health.status,
        timestamp: now.to_rfc3339_opts(SecondsFormat::Secs, true),
    };
    serde_json::to_vec(&rewritten).ok()
}

/// Remove headers that describe the backend connection rather than the response.
pub fn strip_response_headers(response: &mut Response<Body>) {
    strip_hop_by_hop(response.headers_mut());
}

/// Apply health normalization to a backend response.
///
/// Errors only when the backend body cannot be read.
pub async fn rewrite_health(
    response: Response<Body>,
    max_body_bytes: usize,
    now: DateTime<Utc>,
) -> Result<Response<Body>, ForwardError> {
    let (mut parts, body) = response.into_parts();
    parts
        .headers
        .insert(header::VIA, HeaderValue::from_static(VIA));

    let original = match buffer_bounded(body, max_body_bytes)
        .await
        .map_err(ForwardError::from_source)?
    {
        Buffered::Complete(bytes) => bytes,
        Buffered::Overflow(body) => {
            tracing::warn!(
                limit = max_body_bytes,
                "Health body exceeds buffer limit, passing through"
            );
            return Ok(Response::from_parts(parts, body));
        }
    };

    match normalize_health_body(&original, now) {
        Some(rewritten) => {
            parts
                .headers
                .insert(header::CONTENT_LENGTH, HeaderValue::from(rewritten.len()));
            parts
                .headers
                .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
            parts
                .headers
                .insert(X_MODIFIED_BY_PROXY, HeaderValue::from_static("true"));
            Ok(Response::from_parts(parts, Body::from(rewritten)))
        }
        None => Ok(Response::from_parts(parts, Body::from(original))),
    }
}
