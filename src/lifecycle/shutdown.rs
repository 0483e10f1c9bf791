//! Process-wide stop signal.
//!
//! One `Shutdown` is created in `main` and cloned into every task that has to
//! stop with the process. The signal handler triggers it; the servers wait on
//! it and then drain. Dropping a clone never counts as a trigger.

use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves once any clone has called `trigger`.
    pub fn signalled(&self) -> WaitForCancellationFutureOwned {
        self.token.clone().cancelled_owned()
    }

    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }
}
