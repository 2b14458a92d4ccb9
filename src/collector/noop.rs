//! Non-macOS (noop) implementation of tap collection.
//!
//! This exists so the crate (and binary) can compile on non-Apple targets
//! without pulling in CoreGraphics/CoreFoundation dependencies. No hook is
//! installed, so the accumulator only ever sees taps registered by hand.

use crate::collector::CollectorError;
use crate::core::SharedTapAccumulator;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A collector that never registers taps.
pub struct NoopCollector {
    _accumulator: SharedTapAccumulator,
    running: Arc<AtomicBool>,
}

impl NoopCollector {
    pub fn new(accumulator: SharedTapAccumulator) -> Self {
        Self {
            _accumulator: accumulator,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// On non-macOS platforms, this simply marks the collector as running.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// On non-macOS platforms there is no Input Monitoring permission gate.
pub fn check_permission() -> bool {
    true
}
