//! Keyboard tap windows.
//!
//! Taps are counted into fixed-duration windows (default 10 seconds). The
//! counter is fed from the event-tap callback and drained by the sampler.

use crate::clock::Clock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Default tap window length.
pub const DEFAULT_TAP_WINDOW: Duration = Duration::from_secs(10);

/// A point-in-time view of the current tap window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TapWindow {
    /// Taps registered since the window started
    pub count: u64,
    /// When the current window started
    pub window_start: Instant,
}

/// Process-wide keyboard tap counter.
///
/// `register_tap` is lock-free and safe to call from the event-tap callback.
/// `check_and_reset` is the only consumer-visible transition.
pub struct TapAccumulator {
    count: AtomicU64,
    window_start: Mutex<Instant>,
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl TapAccumulator {
    /// Create an accumulator with the default 10 second window.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_window(clock, DEFAULT_TAP_WINDOW)
    }

    /// Create an accumulator with a custom window length.
    pub fn with_window(clock: Arc<dyn Clock>, window: Duration) -> Self {
        let start = clock.now();
        Self {
            count: AtomicU64::new(0),
            window_start: Mutex::new(start),
            window,
            clock,
        }
    }

    /// Record one key press.
    pub fn register_tap(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Drain the window if it has run its full length.
    ///
    /// Returns `None` while the window is still open. `Some(0)` means the
    /// window closed with no taps in it.
    pub fn check_and_reset(&self) -> Option<u64> {
        self.check_and_reset_at(self.clock.now())
    }

    /// [`check_and_reset`](Self::check_and_reset) measured at `now`.
    ///
    /// Periodic consumers pass the instant their tick was scheduled for, so
    /// a late wake-up cannot make a full window look short. `now` becomes
    /// the start of the next window.
    pub fn check_and_reset_at(&self, now: Instant) -> Option<u64> {
        let mut start = self
            .window_start
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if now.saturating_duration_since(*start) < self.window {
            return None;
        }

        *start = now;
        Some(self.count.swap(0, Ordering::AcqRel))
    }

    /// Current window state without resetting it.
    pub fn peek(&self) -> TapWindow {
        let start = self
            .window_start
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        TapWindow {
            count: self.count.load(Ordering::Relaxed),
            window_start: *start,
        }
    }

    /// Window length.
    pub fn window(&self) -> Duration {
        self.window
    }
}

impl std::fmt::Debug for TapAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TapAccumulator")
            .field("window", &self.window)
            .field("current", &self.peek())
            .finish()
    }
}

/// Tap accumulator shared between the collector thread and the sampler.
pub type SharedTapAccumulator = Arc<TapAccumulator>;
