//! Upstream subsystem.
//!
//! # Data Flow
//! ```text
//! Forwarding request
//!     → client.rs (acquire connection slot, pooled hyper client)
//!     → backend
//!     → response (slot released when the body finishes)
//! ```
//!
//! # Design Decisions
//! - Exactly one backend; no load balancing
//! - Pool limits are configuration, not algorithm
//! - No retries

pub mod client;

pub use client::Forwarder;
