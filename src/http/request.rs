//! Request handling and transformation.
//!
//! # Responsibilities
//! - Resolve the request ID (inbound value wins, otherwise generated)
//! - Append the client to `X-Forwarded-For`, set `X-Forwarded-Proto`
//!   and `X-Origin-Host`
//! - Point the URI at the backend, keeping path and query verbatim
//!
//! # Design Decisions
//! - Request ID resolved once per request, before anything is logged
//! - Hop-by-hop headers are not forwarded
//! - The rewrite is total: unrepresentable values are skipped, never fatal

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{Request, Uri, Version};

use crate::http::context::RequestContext;
use crate::net::Transport;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
pub const X_ORIGIN_HOST: HeaderName = HeaderName::from_static("x-origin-host");

/// Connection-scoped headers that never travel past a proxy.
pub(crate) static HOP_BY_HOP: [HeaderName; 9] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Last generated ID, so two requests stamped in the same nanosecond
/// still get distinct identifiers.
static LAST_GENERATED_ID: AtomicU64 = AtomicU64::new(0);

/// Opaque token correlating one request across logs and forwarding.
///
/// An inbound id keeps its exact header bytes for echoing; `as_str` is a
/// lossy UTF-8 rendering used in logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId {
    text: String,
    raw: Option<HeaderValue>,
}

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            text: id.into(),
            raw: None,
        }
    }

    /// Generate a time-derived identifier: Unix time in nanoseconds, as decimal.
    pub fn generate() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        let previous = LAST_GENERATED_ID
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        Self::new(now.max(previous + 1).to_string())
    }

    /// The inbound `X-Request-ID`, if present and non-empty. Any legal
    /// header bytes are accepted, including obs-text.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let raw = headers.get(X_REQUEST_ID).filter(|v| !v.is_empty())?;
        Some(Self {
            text: String::from_utf8_lossy(raw.as_bytes()).into_owned(),
            raw: Some(raw.clone()),
        })
    }

    /// Inbound ID if the caller sent one, otherwise a fresh one.
    pub fn resolve(headers: &HeaderMap) -> Self {
        Self::from_headers(headers).unwrap_or_else(Self::generate)
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Header value for echoing the id: the inbound bytes when there were any.
    pub fn header_value(&self) -> Option<HeaderValue> {
        match &self.raw {
            Some(raw) => Some(raw.clone()),
            None => HeaderValue::from_str(&self.text).ok(),
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Remote address of the inbound connection, if the server recorded one.
pub fn remote_addr<B>(request: &Request<B>) -> Option<SocketAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// The client IP without port; empty when unknown.
pub fn client_ip(addr: Option<SocketAddr>) -> String {
    addr.map(|a| a.ip().to_string()).unwrap_or_default()
}

/// Append `client_ip` to any existing forwarding chain. Prior entries are
/// copied byte for byte.
fn forwarded_for(headers: &HeaderMap, client_ip: &str) -> Vec<u8> {
    let mut chain: Vec<u8> = Vec::new();
    for prior in headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter(|v| !v.is_empty())
    {
        chain.extend_from_slice(prior.as_bytes());
        chain.extend_from_slice(b", ");
    }
    chain.extend_from_slice(client_ip.as_bytes());
    chain
}

fn set_header(headers: &mut HeaderMap, name: HeaderName, value: &[u8]) {
    match HeaderValue::from_bytes(value) {
        Ok(v) => {
            headers.insert(name, v);
        }
        Err(_) => {
            tracing::debug!(header = %name, "Skipping unrepresentable header value");
        }
    }
}

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub(crate) fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// Build the forwarding request for `upstream` from an inbound request.
///
/// Method, body, path, query and non-hop-by-hop headers are kept. The
/// forwarding headers are applied and `X-Request-ID` is set from `ctx`.
pub fn forwarding_request(
    request: Request<Body>,
    upstream: &Authority,
    ctx: &RequestContext,
) -> Request<Body> {
    let client = client_ip(remote_addr(&request));
    let transport = request
        .extensions()
        .get::<Transport>()
        .copied()
        .unwrap_or_default();

    let (mut parts, body) = request.into_parts();

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(upstream.clone());
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = Uri::from_parts(uri_parts).unwrap_or(parts.uri);
    parts.version = Version::HTTP_11;

    let headers = &mut parts.headers;
    strip_hop_by_hop(headers);

    let chain = forwarded_for(headers, &client);
    set_header(headers, X_FORWARDED_FOR, &chain);
    set_header(headers, X_FORWARDED_PROTO, transport.forwarded_proto().as_bytes());
    set_header(headers, X_ORIGIN_HOST, upstream.as_str().as_bytes());
    if RequestId::from_headers(headers).is_none() {
        if let Some(value) = ctx.request_id().header_value() {
            headers.insert(X_REQUEST_ID, value);
        }
    }

    parts.extensions.insert(ctx.clone());

    Request::from_parts(parts, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn upstream() -> Authority {
        Authority::from_str("localhost:4199").unwrap()
    }

    fn inbound(builder: axum::http::request::Builder) -> Request<Body> {
        let mut request = builder.body(Body::empty()).unwrap();
        let addr: SocketAddr = "203.0.113.7:51234".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    }

    fn rewrite(request: Request<Body>) -> Request<Body> {
        let ctx = RequestContext::begin(RequestId::resolve(request.headers()));
        forwarding_request(request, &upstream(), &ctx)
    }

    #[test]
    fn generates_request_id_when_absent() {
        let out = rewrite(inbound(Request::builder().uri("/users")));
        let id = out.headers()[X_REQUEST_ID].to_str().unwrap();
        assert!(!id.is_empty());
        assert!(id.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn preserves_inbound_request_id() {
        let out = rewrite(inbound(
            Request::builder().uri("/users").header("X-Request-ID", "abc-123"),
        ));
        assert_eq!(out.headers()[X_REQUEST_ID], "abc-123");
        assert_eq!(out.headers().get_all(X_REQUEST_ID).iter().count(), 1);
    }

    #[test]
    fn obs_text_request_id_is_kept_verbatim() {
        let mut request = inbound(Request::builder().uri("/users"));
        request.headers_mut().insert(
            X_REQUEST_ID,
            HeaderValue::from_bytes(b"caf\xe9-1").unwrap(),
        );
        let out = rewrite(request);

        assert_eq!(out.headers()[X_REQUEST_ID].as_bytes(), b"caf\xe9-1");
        let ctx = out.extensions().get::<RequestContext>().unwrap();
        assert_eq!(ctx.request_id().as_str(), "caf\u{fffd}-1");
        assert_eq!(
            ctx.request_id().header_value().unwrap().as_bytes(),
            b"caf\xe9-1"
        );
    }

    #[test]
    fn empty_inbound_request_id_is_replaced() {
        let out = rewrite(inbound(
            Request::builder().uri("/").header("X-Request-ID", ""),
        ));
        assert!(!out.headers()[X_REQUEST_ID].is_empty());
    }

    #[test]
    fn generated_ids_are_unique() {
        let ids: std::collections::HashSet<_> = (0..1000).map(|_| RequestId::generate()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn forwarded_for_set_when_absent() {
        let out = rewrite(inbound(Request::builder().uri("/")));
        assert_eq!(out.headers()[X_FORWARDED_FOR], "203.0.113.7");
    }

    #[test]
    fn forwarded_for_appends_to_chain() {
        let out = rewrite(inbound(
            Request::builder()
                .uri("/")
                .header("X-Forwarded-For", "198.51.100.1, 198.51.100.2"),
        ));
        assert_eq!(
            out.headers()[X_FORWARDED_FOR],
            "198.51.100.1, 198.51.100.2, 203.0.113.7"
        );
    }

    #[test]
    fn obs_text_forwarded_for_entries_are_kept() {
        let mut request = inbound(Request::builder().uri("/"));
        request.headers_mut().insert(
            X_FORWARDED_FOR,
            HeaderValue::from_bytes(b"proxy-\xe9").unwrap(),
        );
        let out = rewrite(request);
        assert_eq!(
            out.headers()[X_FORWARDED_FOR].as_bytes(),
            b"proxy-\xe9, 203.0.113.7"
        );
    }

    #[test]
    fn unknown_remote_addr_degrades_to_empty() {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let out = rewrite(request);
        assert_eq!(out.headers()[X_FORWARDED_FOR], "");
    }

    #[test]
    fn ipv6_client_has_no_brackets_or_port() {
        assert_eq!(client_ip(Some("[::1]:8080".parse().unwrap())), "::1");
    }

    #[test]
    fn forwarded_proto_follows_transport() {
        let out = rewrite(inbound(Request::builder().uri("/")));
        assert_eq!(out.headers()[X_FORWARDED_PROTO], "http");

        let mut tls = inbound(Request::builder().uri("/"));
        tls.extensions_mut().insert(Transport::Tls);
        let out = rewrite(tls);
        assert_eq!(out.headers()[X_FORWARDED_PROTO], "https");
    }

    #[test]
    fn origin_host_is_overwritten() {
        let out = rewrite(inbound(
            Request::builder().uri("/").header("X-Origin-Host", "spoofed"),
        ));
        assert_eq!(out.headers()[X_ORIGIN_HOST], "localhost:4199");
    }

    #[test]
    fn uri_points_at_backend_with_path_and_query() {
        let out = rewrite(inbound(
            Request::builder().uri("http://proxy.local:8089/echo?sleep=50&x=1"),
        ));
        assert_eq!(out.uri().to_string(), "http://localhost:4199/echo?sleep=50&x=1");
        assert_eq!(out.version(), Version::HTTP_11);
    }

    #[test]
    fn hop_by_hop_headers_are_stripped() {
        let out = rewrite(inbound(
            Request::builder()
                .uri("/")
                .header("Connection", "keep-alive, X-Secret")
                .header("X-Secret", "1")
                .header("Keep-Alive", "timeout=5")
                .header("Accept", "application/json"),
        ));
        assert!(out.headers().get("connection").is_none());
        assert!(out.headers().get("keep-alive").is_none());
        assert!(out.headers().get("x-secret").is_none());
        assert_eq!(out.headers()["accept"], "application/json");
    }

    #[test]
    fn context_travels_with_forwarding_request() {
        let request = inbound(Request::builder().uri("/"));
        let ctx = RequestContext::begin(RequestId::new("ctx-1"));
        let out = forwarding_request(request, &upstream(), &ctx);
        let attached = out.extensions().get::<RequestContext>().unwrap();
        assert_eq!(attached.request_id().as_str(), "ctx-1");
        assert_eq!(out.headers()[X_REQUEST_ID], "ctx-1");
    }
}
