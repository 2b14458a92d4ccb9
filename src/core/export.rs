//! Session export.
//!
//! Each emitted snapshot is appended to `session_<start>_<id>.jsonl` as one
//! JSON line, so nothing is held in memory for the length of a session. The
//! file is created on the first append; a session with no snapshots leaves
//! no file behind.

use crate::core::snapshot::Snapshot;
use chrono::{DateTime, Utc};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Append-only JSON Lines file for one sampling session.
#[derive(Debug)]
pub struct SessionExport {
    path: PathBuf,
    file: Option<File>,
    written: u64,
}

impl SessionExport {
    /// Export for the session `session_id` started at `started`, under `dir`.
    pub fn new(dir: impl AsRef<Path>, session_id: Uuid, started: DateTime<Utc>) -> Self {
        let id = session_id.simple().to_string();
        let path = dir.as_ref().join(format!(
            "session_{}_{}.jsonl",
            started.format("%Y%m%d_%H%M%S"),
            &id[..8]
        ));
        Self {
            path,
            file: None,
            written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshots appended so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Append one snapshot as a single line.
    pub fn append(&mut self, snapshot: &Snapshot) -> io::Result<()> {
        let value = serde_json::to_value(snapshot).map_err(io::Error::other)?;
        let line = serde_json::to_string(&value).map_err(io::Error::other)?;

        let file = match &mut self.file {
            Some(file) => file,
            None => {
                if let Some(parent) = self.path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?;
                self.file.insert(file)
            }
        };

        writeln!(file, "{line}")?;
        self.written += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BiometricsReadings;
    use chrono::TimeZone;

    fn snapshot(taps: u64) -> Snapshot {
        Snapshot::assemble(
            Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap(),
            Some(0.5),
            Some(taps),
            None,
            BiometricsReadings::default(),
        )
    }

    #[test]
    fn test_file_is_created_on_first_append() {
        let dir = tempfile::tempdir().unwrap();
        let started = Utc.with_ymd_and_hms(2025, 3, 10, 8, 59, 50).unwrap();
        let mut export = SessionExport::new(dir.path().join("exports"), Uuid::new_v4(), started);

        assert!(!export.path().exists());
        let name = export.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("session_20250310_085950_"));
        assert!(name.ends_with(".jsonl"));

        export.append(&snapshot(3)).unwrap();
        export.append(&snapshot(5)).unwrap();
        assert_eq!(export.written(), 2);

        let content = std::fs::read_to_string(export.path()).unwrap();
        let lines: Vec<Snapshot> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines, vec![snapshot(3), snapshot(5)]);
    }
}
