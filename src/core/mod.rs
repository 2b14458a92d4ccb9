//! Core sampling functionality.
//!
//! This module contains:
//! - Tap windows fed by the keyboard collector
//! - Snapshot records and their JSON form
//! - The periodic sampler that joins system and biometrics readings
//! - Per-session JSON Lines export

pub mod export;
pub mod sampler;
pub mod snapshot;
pub mod windowing;

// Re-export commonly used types
pub use export::SessionExport;
pub use sampler::{SnapshotSampler, DEFAULT_LOOKBACK, DEFAULT_SAMPLE_INTERVAL};
pub use snapshot::{BiometricsReadings, Snapshot};
pub use windowing::{SharedTapAccumulator, TapAccumulator, TapWindow, DEFAULT_TAP_WINDOW};
