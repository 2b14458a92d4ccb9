//! Keyboard tap collection.
//!
//! This module installs the system-level keyboard hook that feeds the tap
//! accumulator. Only key presses are counted; no key content is ever read.

pub mod types;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(not(target_os = "macos"))]
pub mod noop;

use thiserror::Error;

pub use types::KeyEventKind;

#[cfg(target_os = "macos")]
pub use macos::{check_permission, MacOSCollector};

/// Platform-agnostic collector type alias
#[cfg(target_os = "macos")]
pub type Collector = MacOSCollector;

#[cfg(not(target_os = "macos"))]
pub use noop::{check_permission, NoopCollector};

/// Platform-agnostic collector type alias
#[cfg(not(target_os = "macos"))]
pub type Collector = NoopCollector;

/// Errors that can occur while installing the keyboard hook.
///
/// Any of these is fatal for the sampling feature.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("Collector is already running")]
    AlreadyRunning,

    #[error("Input Monitoring permission not granted")]
    PermissionDenied,

    #[error("Failed to create CGEvent tap")]
    TapCreationFailed,

    #[error("Failed to create run loop source")]
    RunLoopSourceFailed,

    #[error("Failed to spawn tap thread: {0}")]
    ThreadSpawn(String),
}

/// [`check_permission`] as a `Result`, for callers that treat a missing
/// permission as fatal.
pub fn ensure_permission() -> Result<(), CollectorError> {
    permission_status(check_permission())
}

fn permission_status(granted: bool) -> Result<(), CollectorError> {
    if granted {
        Ok(())
    } else {
        Err(CollectorError::PermissionDenied)
    }
}
