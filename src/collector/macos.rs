//! macOS implementation of keyboard tap collection using a CGEvent tap.
//!
//! The tap is installed at the HID level (the lowest-level event source) in
//! listen-only mode, so events are observed but never consumed or altered.
//! It requires Input Monitoring permission.

use crate::collector::types::KeyEventKind;
use crate::collector::CollectorError;
use crate::core::SharedTapAccumulator;
use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::event::{
    CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement, CGEventType,
    CallbackResult,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// The macOS tap collector.
pub struct MacOSCollector {
    accumulator: SharedTapAccumulator,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl MacOSCollector {
    /// Create a collector that feeds every key press into `accumulator`.
    pub fn new(accumulator: SharedTapAccumulator) -> Self {
        Self {
            accumulator,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Install the event tap on a dedicated run-loop thread.
    ///
    /// Blocks until the tap is either installed or has failed, so a missing
    /// Input Monitoring permission surfaces here as an error.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }

        self.running.store(true, Ordering::SeqCst);

        let accumulator = self.accumulator.clone();
        let running = self.running.clone();
        let (ready_tx, ready_rx) = sync_channel(1);

        let handle = thread::Builder::new()
            .name("key-tap".to_string())
            .spawn(move || {
                if let Err(e) = run_event_loop(accumulator, running.clone(), ready_tx) {
                    tracing::error!(error = %e, "keyboard tap loop failed");
                }
                running.store(false, Ordering::SeqCst);
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                CollectorError::ThreadSpawn(e.to_string())
            })?;

        self.thread_handle = Some(handle);

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.stop();
                Err(e)
            }
            Err(_) => {
                self.stop();
                Err(CollectorError::TapCreationFailed)
            }
        }
    }

    /// Stop the run loop and remove the tap.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    /// Check if the tap is currently installed.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for MacOSCollector {
    fn drop(&mut self) {
        self.stop();
    }
}

fn classify(event_type: CGEventType) -> Option<KeyEventKind> {
    match event_type {
        CGEventType::KeyDown => Some(KeyEventKind::KeyDown),
        CGEventType::KeyUp => Some(KeyEventKind::KeyUp),
        CGEventType::FlagsChanged => Some(KeyEventKind::FlagsChanged),
        _ => None,
    }
}

fn subscribed_event_types() -> Vec<CGEventType> {
    KeyEventKind::SUBSCRIBED
        .iter()
        .map(|kind| match kind {
            KeyEventKind::KeyDown => CGEventType::KeyDown,
            KeyEventKind::KeyUp => CGEventType::KeyUp,
            KeyEventKind::FlagsChanged => CGEventType::FlagsChanged,
        })
        .collect()
}

fn run_event_loop(
    accumulator: SharedTapAccumulator,
    running: Arc<AtomicBool>,
    ready: SyncSender<Result<(), CollectorError>>,
) -> Result<(), CollectorError> {
    // The callback runs on the tap's run loop; it must not block, so it only
    // bumps the atomic counter.
    let tap = match CGEventTap::new(
        CGEventTapLocation::HID,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        subscribed_event_types(),
        move |_proxy, event_type, _event| {
            if classify(event_type).is_some_and(KeyEventKind::counts_as_tap) {
                accumulator.register_tap();
            }
            CallbackResult::Keep
        },
    ) {
        Ok(tap) => tap,
        Err(_) => {
            let _ = ready.send(Err(CollectorError::TapCreationFailed));
            return Err(CollectorError::TapCreationFailed);
        }
    };

    let source = match tap.mach_port().create_runloop_source(0) {
        Ok(source) => source,
        Err(_) => {
            let _ = ready.send(Err(CollectorError::RunLoopSourceFailed));
            return Err(CollectorError::RunLoopSourceFailed);
        }
    };

    let run_loop = CFRunLoop::get_current();
    unsafe {
        run_loop.add_source(&source, kCFRunLoopCommonModes);
    }

    tap.enable();
    let _ = ready.send(Ok(()));

    while running.load(Ordering::SeqCst) {
        CFRunLoop::run_in_mode(
            unsafe { kCFRunLoopDefaultMode },
            Duration::from_millis(100),
            false,
        );
    }

    Ok(())
}

/// Check if the process has Input Monitoring permission.
///
/// macOS has no direct query for this; creating a passive tap fails when the
/// permission is missing.
pub fn check_permission() -> bool {
    CGEventTap::new(
        CGEventTapLocation::HID,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::KeyDown],
        |_proxy, _type, _event| CallbackResult::Keep,
    )
    .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::core::TapAccumulator;

    #[test]
    fn test_collector_creation() {
        let accumulator = Arc::new(TapAccumulator::new(Arc::new(SystemClock)));
        let collector = MacOSCollector::new(accumulator);
        assert!(!collector.is_running());
    }

    #[test]
    fn test_subscribed_types_round_trip() {
        let kinds: Vec<_> = subscribed_event_types()
            .into_iter()
            .filter_map(classify)
            .collect();
        assert_eq!(kinds, KeyEventKind::SUBSCRIBED.to_vec());
    }
}
