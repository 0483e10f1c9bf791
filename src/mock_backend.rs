//! Mock backend services.
//!
//! Stand-ins for the services that sit behind the proxy. Used by the
//! `mock-backend` binary and by the integration tests.
//!
//! - `GET /echo?sleep=<ms>` echoes the request back after an optional delay
//! - `GET /health` reports `{"status", "timeStamp"}`
//! - anything else returns the selected service's canned JSON

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, Query},
    http::{Method, Request, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{any, get},
    Router,
};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::observability::HeaderSnapshot;

/// Which canned service the fallback route imitates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Service {
    /// Echo server only; unknown paths are 404.
    #[default]
    Echo,
    Users,
    Auth,
    Payments,
    Analytics,
}

impl Service {
    /// The JSON document the service returns for every request.
    pub fn canned_body(self) -> Option<Value> {
        match self {
            Service::Echo => None,
            Service::Users => Some(json!({ "service": "users", "data": [] })),
            Service::Auth => Some(json!({ "service": "auth", "status": "authenticated" })),
            Service::Payments => Some(json!({ "service": "payments", "balance": 1000 })),
            Service::Analytics => Some(json!({ "service": "analytics", "events": [] })),
        }
    }
}

/// Build the mock backend router.
pub fn router(service: Service) -> Router {
    Router::new()
        .route("/echo", any(echo))
        .route("/health", get(health))
        .fallback(move || async move {
            match service.canned_body() {
                Some(body) => Json(body).into_response(),
                None => (StatusCode::NOT_FOUND, "Not Found").into_response(),
            }
        })
}

/// Parse the `sleep` query value as a non-negative millisecond delay.
///
/// A missing value means no delay.
pub fn parse_sleep(raw: Option<&str>) -> Result<Duration, std::num::ParseIntError> {
    match raw {
        None => Ok(Duration::ZERO),
        Some(value) => value.parse::<u64>().map(Duration::from_millis),
    }
}

async fn echo(request: Request<Body>) -> Response {
    if request.method() != Method::GET {
        return (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed").into_response();
    }

    let pairs = Query::<Vec<(String, String)>>::try_from_uri(request.uri())
        .map(|Query(pairs)| pairs)
        .unwrap_or_default();
    let mut query: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (key, value) in &pairs {
        query.entry(key).or_default().push(value);
    }
    let sleep = query.get("sleep").and_then(|values| values.first().copied());

    let delay = match parse_sleep(sleep) {
        Ok(delay) => delay,
        Err(_) => return (StatusCode::BAD_REQUEST, "Invalid sleep parameter").into_response(),
    };
    tokio::time::sleep(delay).await;

    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_default();

    Json(json!({
        "method": request.method().as_str(),
        "path": request.uri().path(),
        "query": query,
        "headers": HeaderSnapshot::from(request.headers()),
        "remote_addr": remote_addr,
        "sleep": sleep.unwrap_or_default(),
    }))
    .into_response()
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timeStamp": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    }))
}
