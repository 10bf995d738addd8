//! Cancellation signal shared by a run and its transfers

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::TransportError;

/// A cloneable flag that aborts a run when raised
///
/// Every clone observes the same flag, so the token handed to a signal handler
/// cancels the transfers started with any other clone.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that has not been cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether the flag has been raised
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fail with `TransportError::Cancelled` once the flag is raised
    pub fn check(&self) -> Result<(), TransportError> {
        if self.is_cancelled() {
            Err(TransportError::Cancelled)
        } else {
            Ok(())
        }
    }
}
