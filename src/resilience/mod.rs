//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Forwarding failure
//!     → timeouts.rs (is this a deadline failure?)
//!     → classify.rs (canceled / timeout / upstream → 499 / 504 / 502)
//! ```
//!
//! # Design Decisions
//! - One attempt per inbound request; nothing here retries
//! - Cancellation, timeout and connection failure stay distinguishable

pub mod classify;
pub mod timeouts;

pub use classify::{error_response, ForwardError, CLIENT_CLOSED_REQUEST};
