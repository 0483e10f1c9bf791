//! Per-request timing scope.
//!
//! A `RequestContext` is created when a request enters the pipeline and is
//! threaded explicitly through every stage. It is never shared between
//! requests and is dropped once the response has been produced.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::http::request::RequestId;

/// Start time and identity of one in-flight request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: RequestId,
    started: Instant,
    started_at: DateTime<Utc>,
}

impl RequestContext {
    /// Stamp the start of processing for `request_id`.
    pub fn begin(request_id: RequestId) -> Self {
        Self {
            request_id,
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Wall-clock time the request entered the pipeline.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Monotonic time since the request entered the pipeline.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_is_monotonic() {
        let ctx = RequestContext::begin(RequestId::new("t"));
        let first = ctx.elapsed();
        std::thread::sleep(Duration::from_millis(5));
        let second = ctx.elapsed();
        assert!(second >= first + Duration::from_millis(5));
        assert!(ctx.started_at() <= Utc::now());
        assert_eq!(ctx.request_id().as_str(), "t");
    }
}
