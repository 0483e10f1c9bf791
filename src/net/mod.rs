//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → plain: axum::serve                 (Transport::Plain)
//!     → tls.rs: rustls handshake, axum-server (Transport::Tls)
//!     → Hand off to HTTP layer with the transport tagged on every request
//! ```
//!
//! # Design Decisions
//! - TLS is optional; the proxy only records whether it was used
//! - The transport is attached as a typed request extension

pub mod tls;

/// How an inbound request reached the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    /// Plain TCP.
    #[default]
    Plain,
    /// TLS-terminated connection.
    Tls,
}

impl Transport {
    /// Value for the `X-Forwarded-Proto` header.
    pub fn forwarded_proto(self) -> &'static str {
        match self {
            Transport::Plain => "http",
            Transport::Tls => "https",
        }
    }
}
