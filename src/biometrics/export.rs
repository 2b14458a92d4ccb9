//! Biometrics backed by a JSON health-data export.
//!
//! An external exporter can keep rewriting the file while the sampler runs.
//! The parsed export is cached and reloaded only when the file's modification
//! time or length changes.
//!
//! ```json
//! {
//!   "quantities": [
//!     {"metric": "heart_rate", "unit": "count/min", "value": 71.0,
//!      "start": "2025-03-10T08:00:00Z", "end": "2025-03-10T08:00:00Z"}
//!   ],
//!   "sleep": [
//!     {"category": "asleep_core", "start": "2025-03-10T00:00:00Z", "end": "2025-03-10T02:00:00Z"}
//!   ]
//! }
//! ```

use super::{
    sleep_hours, BiometricsError, BiometricsProvider, Metric, SleepSample, TimeRange, Unit,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::Mutex;

/// One recorded quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantitySample {
    pub metric: Metric,
    pub unit: Unit,
    pub value: f64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// An in-memory set of health samples.
///
/// Also usable directly as a provider; the empty export is a provider that is
/// always authorized and never has data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BiometricsExport {
    #[serde(default)]
    pub quantities: Vec<QuantitySample>,
    #[serde(default)]
    pub sleep: Vec<SleepSample>,
}

impl BiometricsExport {
    /// Parse an export from JSON.
    pub fn from_json(json: &str) -> Result<Self, BiometricsError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Values of `metric` whose sample starts inside `range`.
    pub fn query_samples(
        &self,
        metric: Metric,
        unit: Unit,
        range: TimeRange,
    ) -> Result<Vec<f64>, BiometricsError> {
        let mut values = Vec::new();
        for sample in self.quantities.iter().filter(|s| s.metric == metric) {
            if sample.unit != unit {
                return Err(BiometricsError::UnitMismatch {
                    metric,
                    requested: unit,
                    recorded: sample.unit,
                });
            }
            if range.contains(sample.start) {
                values.push(sample.value);
            }
        }
        Ok(values)
    }

    /// Sum of `metric` over `range`.
    pub fn query_sum(
        &self,
        metric: Metric,
        unit: Unit,
        range: TimeRange,
    ) -> Result<f64, BiometricsError> {
        Ok(self.query_samples(metric, unit, range)?.iter().sum())
    }

    /// Hours asleep across sleep intervals overlapping `range`.
    pub fn query_sleep_hours(&self, range: TimeRange) -> f64 {
        let overlapping: Vec<SleepSample> = self
            .sleep
            .iter()
            .filter(|s| range.overlaps(s.start, s.end))
            .cloned()
            .collect();
        sleep_hours(&overlapping)
    }
}

#[async_trait]
impl BiometricsProvider for BiometricsExport {
    async fn authorize(&self) -> Result<(), BiometricsError> {
        Ok(())
    }

    async fn samples(
        &self,
        metric: Metric,
        unit: Unit,
        range: TimeRange,
    ) -> Result<Vec<f64>, BiometricsError> {
        self.query_samples(metric, unit, range)
    }

    async fn sum(
        &self,
        metric: Metric,
        unit: Unit,
        range: TimeRange,
    ) -> Result<f64, BiometricsError> {
        self.query_sum(metric, unit, range)
    }

    async fn sleep_hours(&self, range: TimeRange) -> Result<f64, BiometricsError> {
        Ok(self.query_sleep_hours(range))
    }
}

/// Provider reading a [`BiometricsExport`] from disk.
#[derive(Debug)]
pub struct FileBiometrics {
    path: PathBuf,
    cache: Mutex<Option<CachedExport>>,
}

#[derive(Debug)]
struct CachedExport {
    modified: SystemTime,
    len: u64,
    export: Arc<BiometricsExport>,
}

impl FileBiometrics {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Arc<BiometricsExport>, BiometricsError> {
        // Held across the read so concurrent queries parse the file once.
        let mut cache = self.cache.lock().await;

        let metadata = tokio::fs::metadata(&self.path).await?;
        let modified = metadata.modified()?;
        let len = metadata.len();

        if let Some(cached) = cache.as_ref() {
            if cached.modified == modified && cached.len == len {
                return Ok(Arc::clone(&cached.export));
            }
        }

        let content = tokio::fs::read_to_string(&self.path).await?;
        let export = Arc::new(BiometricsExport::from_json(&content)?);
        *cache = Some(CachedExport {
            modified,
            len,
            export: Arc::clone(&export),
        });
        Ok(export)
    }
}

#[async_trait]
impl BiometricsProvider for FileBiometrics {
    async fn authorize(&self) -> Result<(), BiometricsError> {
        self.load().await.map(|_| ()).map_err(|e| {
            BiometricsError::AuthorizationDenied(format!("{}: {e}", self.path.display()))
        })
    }

    async fn samples(
        &self,
        metric: Metric,
        unit: Unit,
        range: TimeRange,
    ) -> Result<Vec<f64>, BiometricsError> {
        self.load().await?.query_samples(metric, unit, range)
    }

    async fn sum(
        &self,
        metric: Metric,
        unit: Unit,
        range: TimeRange,
    ) -> Result<f64, BiometricsError> {
        self.load().await?.query_sum(metric, unit, range)
    }

    async fn sleep_hours(&self, range: TimeRange) -> Result<f64, BiometricsError> {
        Ok(self.load().await?.query_sleep_hours(range))
    }
}

/// Provider with no recorded data. Always authorized.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyBiometrics;

#[async_trait]
impl BiometricsProvider for EmptyBiometrics {
    async fn authorize(&self) -> Result<(), BiometricsError> {
        Ok(())
    }

    async fn samples(
        &self,
        _metric: Metric,
        _unit: Unit,
        _range: TimeRange,
    ) -> Result<Vec<f64>, BiometricsError> {
        Ok(Vec::new())
    }

    async fn sum(
        &self,
        _metric: Metric,
        _unit: Unit,
        _range: TimeRange,
    ) -> Result<f64, BiometricsError> {
        Ok(0.0)
    }

    async fn sleep_hours(&self, _range: TimeRange) -> Result<f64, BiometricsError> {
        Ok(0.0)
    }
}
