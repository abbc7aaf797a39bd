#![forbid(unsafe_code)]

//! Cooperative cancellation checked at iteration boundaries.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag that long-running loops poll between iterations.
///
/// Clones share the same flag, so a caller can hand one clone to each
/// concurrent run and cancel the whole ensemble at once.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Clear the flag so the token can be reused for a new batch of runs.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Release);
    }
}
