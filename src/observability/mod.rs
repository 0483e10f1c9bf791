//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline stages produce:
//!     → access_log.rs (one JSON record per request and per response)
//!     → logging.rs    (tracing subscriber: pretty or JSON)
//!     → metrics.rs    (counters, histograms)
//! ```
//!
//! # Design Decisions
//! - Request ID is a field on every event
//! - Metrics are cheap (no-op without a recorder)

pub mod access_log;
pub mod logging;
pub mod metrics;

pub use access_log::{
    AccessLog, HeaderSnapshot, LogRecord, MemoryAccessLog, RequestLog, ResponseLog,
    TracingAccessLog,
};
