//! Timeout detection.
//!
//! # Responsibilities
//! - Recognise deadline failures anywhere in an error's source chain
//!
//! # Design Decisions
//! - Only the dial is bounded (`timeouts.connect_secs`); there is no
//!   end-to-end request deadline beyond the caller's own cancellation
//! - Timeout errors are distinct from other errors
//! - Timed-out requests return 504 Gateway Timeout

use std::error::Error;
use std::io;

/// Returns true if `err` or any of its sources is a timeout.
pub fn is_timeout(err: &(dyn Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<tokio::time::error::Elapsed>() {
            return true;
        }
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::TimedOut {
                return true;
            }
        }
        current = e.source();
    }
    false
}
