//! Transparency log.
//!
//! Tracks and exposes counts of what the agent collected and emitted, without
//! storing any of the data itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Transparency statistics for the current session.
#[derive(Debug)]
pub struct TransparencyLog {
    /// Keyboard taps read out of completed windows
    taps_counted: AtomicU64,
    /// Sampler ticks attempted
    ticks: AtomicU64,
    /// Snapshots emitted
    snapshots_emitted: AtomicU64,
    /// Snapshots dropped because a biometrics query failed
    snapshots_dropped: AtomicU64,
    /// Mindfulness reminders fired
    reminders_fired: AtomicU64,
    /// Audit-log appends that failed
    log_appends_failed: AtomicU64,
    /// Identifies this run in exports and logs
    session_id: Uuid,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl TransparencyLog {
    pub fn new() -> Self {
        Self {
            taps_counted: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
            snapshots_emitted: AtomicU64::new(0),
            snapshots_dropped: AtomicU64::new(0),
            reminders_fired: AtomicU64::new(0),
            log_appends_failed: AtomicU64::new(0),
            session_id: Uuid::new_v4(),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a transparency log that continues from stats saved at `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!(error = %e, "could not load previous transparency stats");
        }

        log
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn record_taps(&self, count: u64) {
        self.taps_counted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_snapshot_emitted(&self) {
        self.snapshots_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_snapshot_dropped(&self) {
        self.snapshots_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reminder_fired(&self) {
        self.reminders_fired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_log_append_failed(&self) {
        self.log_appends_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> TransparencyStats {
        TransparencyStats {
            taps_counted: self.taps_counted.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
            snapshots_emitted: self.snapshots_emitted.load(Ordering::Relaxed),
            snapshots_dropped: self.snapshots_dropped.load(Ordering::Relaxed),
            reminders_fired: self.reminders_fired.load(Ordering::Relaxed),
            log_appends_failed: self.log_appends_failed.load(Ordering::Relaxed),
            session_id: self.session_id,
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session {}:\n\
             - Keyboard taps counted: {}\n\
             - Sampler ticks: {}\n\
             - Snapshots emitted: {}\n\
             - Snapshots dropped: {}\n\
             - Reminders fired: {}\n\
             - Failed log appends: {}\n\
             - Session duration: {} seconds\n\
             \n\
             Privacy Guarantee:\n\
             - No key content captured\n\
             - Snapshots are printed, never uploaded",
            stats.session_id,
            stats.taps_counted,
            stats.ticks,
            stats.snapshots_emitted,
            stats.snapshots_dropped,
            stats.reminders_fired,
            stats.log_appends_failed,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                taps_counted: stats.taps_counted,
                ticks: stats.ticks,
                snapshots_emitted: stats.snapshots_emitted,
                snapshots_dropped: stats.snapshots_dropped,
                reminders_fired: stats.reminders_fired,
                log_appends_failed: stats.log_appends_failed,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.taps_counted
                    .store(persisted.taps_counted, Ordering::Relaxed);
                self.ticks.store(persisted.ticks, Ordering::Relaxed);
                self.snapshots_emitted
                    .store(persisted.snapshots_emitted, Ordering::Relaxed);
                self.snapshots_dropped
                    .store(persisted.snapshots_dropped, Ordering::Relaxed);
                self.reminders_fired
                    .store(persisted.reminders_fired, Ordering::Relaxed);
                self.log_appends_failed
                    .store(persisted.log_appends_failed, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Default for TransparencyLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of transparency statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransparencyStats {
    pub taps_counted: u64,
    pub ticks: u64,
    pub snapshots_emitted: u64,
    pub snapshots_dropped: u64,
    pub reminders_fired: u64,
    pub log_appends_failed: u64,
    pub session_id: Uuid,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    #[serde(default)]
    taps_counted: u64,
    #[serde(default)]
    ticks: u64,
    #[serde(default)]
    snapshots_emitted: u64,
    #[serde(default)]
    snapshots_dropped: u64,
    #[serde(default)]
    reminders_fired: u64,
    #[serde(default)]
    log_appends_failed: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared transparency log.
pub type SharedTransparencyLog = Arc<TransparencyLog>;

/// Create a new shared transparency log.
pub fn create_shared_log() -> SharedTransparencyLog {
    Arc::new(TransparencyLog::new())
}

/// Create a new shared transparency log with persistence.
pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedTransparencyLog {
    Arc::new(TransparencyLog::with_persistence(path))
}
