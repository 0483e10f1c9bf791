//! Structured request/response records.
//!
//! Every request produces one `RequestLog` and one `ResponseLog`, written as
//! JSON through an `AccessLog` sink. Records are write-only: nothing in the
//! pipeline reads them back.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use axum::http::{HeaderMap, StatusCode};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Header names mapped to all of their values, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct HeaderSnapshot(BTreeMap<String, Vec<String>>);

impl HeaderSnapshot {
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.0.get(&name.to_ascii_lowercase()).map(Vec::as_slice)
    }
}

impl From<&HeaderMap> for HeaderSnapshot {
    fn from(headers: &HeaderMap) -> Self {
        let mut snapshot: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in headers {
            snapshot
                .entry(name.as_str().to_string())
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }
        Self(snapshot)
    }
}

fn as_nanos<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_nanos() as u64)
}

/// Record of a request as it is forwarded.
#[derive(Debug, Clone, Serialize)]
pub struct RequestLog {
    pub id: String,
    pub method: String,
    pub url: String,
    pub headers: HeaderSnapshot,
    /// Reserved; bodies are never logged.
    pub body: String,
    pub remote_addr: String,
    pub timestamp: DateTime<Utc>,
    #[serde(serialize_with = "as_nanos")]
    pub upstream_time: Duration,
    #[serde(serialize_with = "as_nanos")]
    pub processing_time: Duration,
}

/// Record of the response returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseLog {
    pub id: String,
    pub status: String,
    pub status_code: u16,
    pub headers: HeaderSnapshot,
    /// Reserved; bodies are never logged.
    pub body: String,
    pub timestamp: DateTime<Utc>,
    #[serde(serialize_with = "as_nanos")]
    pub duration: Duration,
}

/// Status line text, e.g. `200 OK`.
pub fn status_text(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogRecord {
    Request(RequestLog),
    Response(ResponseLog),
}

impl LogRecord {
    pub fn id(&self) -> &str {
        match self {
            LogRecord::Request(r) => &r.id,
            LogRecord::Response(r) => &r.id,
        }
    }
}

/// Append-only destination for log records.
pub trait AccessLog: Send + Sync + fmt::Debug {
    fn record(&self, record: LogRecord);
}

/// Writes each record as a JSON line through `tracing` (target `access_log`).
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAccessLog;

impl AccessLog for TracingAccessLog {
    fn record(&self, record: LogRecord) {
        let json = match serde_json::to_string(&record) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, request_id = %record.id(), "Failed to serialize access log record");
                return;
            }
        };
        match &record {
            LogRecord::Request(r) => {
                tracing::info!(target: "access_log", request_id = %r.id, record = %json, "Request Received")
            }
            LogRecord::Response(r) => {
                tracing::info!(target: "access_log", request_id = %r.id, record = %json, "Response Received")
            }
        }
    }
}

/// Keeps records in memory. Used by tests and embedders that collect logs.
#[derive(Debug, Default)]
pub struct MemoryAccessLog {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryAccessLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn requests(&self) -> Vec<RequestLog> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                LogRecord::Request(r) => Some(r),
                LogRecord::Response(_) => None,
            })
            .collect()
    }

    pub fn responses(&self) -> Vec<ResponseLog> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                LogRecord::Response(r) => Some(r),
                LogRecord::Request(_) => None,
            })
            .collect()
    }
}

impl AccessLog for MemoryAccessLog {
    fn record(&self, record: LogRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }
}
