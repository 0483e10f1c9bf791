//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, in-flight limit, cancellation guard)
//!     → pipeline.rs (stage orchestration)
//!         → context.rs (start timestamp + request ID)
//!         → request.rs (forwarding headers, URI rewrite)
//!         → [upstream::Forwarder sends it]
//!         → response.rs (health normalization, header cleanup)
//!     → Send to client
//! ```

pub mod context;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod server;

pub use context::RequestContext;
pub use pipeline::{Pipeline, PipelineError, ProxyPipeline};
pub use request::{RequestId, X_FORWARDED_FOR, X_FORWARDED_PROTO, X_ORIGIN_HOST, X_REQUEST_ID};
pub use response::X_MODIFIED_BY_PROXY;
pub use server::HttpServer;
