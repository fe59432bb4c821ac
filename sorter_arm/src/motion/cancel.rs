//! Cooperative cancellation.
//!
//! Actuators poll the token between trajectory steps. A step that has
//! started always completes, so the servo never sees a torn write.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared abort flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request every move polling this token to stop at its next step.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Allow motion again.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}
