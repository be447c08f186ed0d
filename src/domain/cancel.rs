//! Cooperative cancellation shared between a caller and a running backtest.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::error::BacktestError;

/// Cloneable flag; every clone observes the same cancellation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// `Err(Cancelled)` once [`cancel`](Self::cancel) has been called.
    pub fn check(&self) -> Result<(), BacktestError> {
        if self.is_cancelled() {
            Err(BacktestError::Cancelled)
        } else {
            Ok(())
        }
    }
}
