//! Advisory interrupt signal for the generation in progress

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag asking the running generator to stop early.
///
/// The queue never aborts a generator itself. Generators poll
/// [`is_requested`](Self::is_requested) at convenient points and bail out
/// with [`AppError::Interrupted`](crate::error::AppError::Interrupted).
/// Each queue owns its own token, so independent queues do not interfere.
#[derive(Debug, Clone, Default)]
pub struct InterruptToken {
    flag: Arc<AtomicBool>,
}

impl InterruptToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the current generation, if any, to stop
    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Reset the flag. Called by the worker when a new job is dispatched.
    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
