//! Biometrics provider interface.
//!
//! The sampler asks a [`BiometricsProvider`] for point samples, cumulative
//! sums and sleep totals over a time range. Providers are external
//! collaborators; this crate ships one backed by a JSON health export.

pub mod export;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use export::{BiometricsExport, EmptyBiometrics, FileBiometrics, QuantitySample};

/// Quantity metrics the sampler requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    HeartRate,
    /// Blood oxygen saturation, recorded as a fraction (0-1)
    OxygenSaturation,
    RespiratoryRate,
    ActiveEnergyBurned,
    StepCount,
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Metric::HeartRate => "heart_rate",
            Metric::OxygenSaturation => "oxygen_saturation",
            Metric::RespiratoryRate => "respiratory_rate",
            Metric::ActiveEnergyBurned => "active_energy_burned",
            Metric::StepCount => "step_count",
        };
        f.write_str(name)
    }
}

/// Units a quantity can be requested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "count/min")]
    CountPerMinute,
    #[serde(rename = "%")]
    Percent,
    #[serde(rename = "kcal")]
    Kilocalorie,
    #[serde(rename = "count")]
    Count,
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Unit::CountPerMinute => "count/min",
            Unit::Percent => "%",
            Unit::Kilocalorie => "kcal",
            Unit::Count => "count",
        };
        f.write_str(name)
    }
}

/// Sleep analysis categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SleepCategory {
    InBed,
    AsleepUnspecified,
    Awake,
    AsleepCore,
    AsleepDeep,
    AsleepRem,
}

impl SleepCategory {
    /// Whether this category counts toward sleep time.
    pub fn is_asleep(self) -> bool {
        matches!(
            self,
            SleepCategory::AsleepUnspecified
                | SleepCategory::AsleepCore
                | SleepCategory::AsleepDeep
                | SleepCategory::AsleepRem
        )
    }
}

/// One sleep analysis interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepSample {
    pub category: SleepCategory,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SleepSample {
    pub fn new(category: SleepCategory, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            category,
            start,
            end,
        }
    }

    /// Length of the interval in seconds (never negative).
    pub fn duration_secs(&self) -> f64 {
        ((self.end - self.start).num_milliseconds().max(0)) as f64 / 1000.0
    }
}

/// Total hours asleep across `samples`.
///
/// In-bed and awake intervals are ignored; every asleep variant counts in full.
pub fn sleep_hours(samples: &[SleepSample]) -> f64 {
    let seconds: f64 = samples
        .iter()
        .filter(|s| s.category.is_asleep())
        .map(SleepSample::duration_secs)
        .sum();
    seconds / 3600.0
}

/// Half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The `lookback` period ending at `now`.
    pub fn trailing(now: DateTime<Utc>, lookback: chrono::Duration) -> Self {
        Self::new(now - lookback, now)
    }

    /// The calendar day containing `now`, from local midnight to the next
    /// local midnight in `now`'s timezone.
    pub fn day_of<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        let tz = now.timezone();
        let today = now.date_naive();
        let fallback = now.with_timezone(&Utc);

        let start = local_midnight(&tz, today).unwrap_or(fallback);
        let end = today
            .succ_opt()
            .and_then(|tomorrow| local_midnight(&tz, tomorrow))
            .unwrap_or(start + chrono::Duration::days(1));

        Self::new(start, end)
    }

    /// Whether `instant` falls inside the range.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    /// Whether an interval overlaps the range at all.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.end && end > self.start
    }
}

/// Midnight of `date` in `tz`; if midnight is skipped by a DST jump, the
/// first hour after it.
fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> Option<DateTime<Utc>> {
    let midnight = date.and_hms_opt(0, 0, 0)?;
    tz.from_local_datetime(&midnight)
        .earliest()
        .or_else(|| tz.from_local_datetime(&date.and_hms_opt(1, 0, 0)?).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Biometrics query errors.
#[derive(Debug, Error)]
pub enum BiometricsError {
    #[error("Biometrics access denied: {0}")]
    AuthorizationDenied(String),

    #[error("{metric} is recorded in {recorded}, not {requested}")]
    UnitMismatch {
        metric: Metric,
        requested: Unit,
        recorded: Unit,
    },

    #[error("Biometrics query failed: {0}")]
    Query(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid biometrics export: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A source of health data.
///
/// Every method is independent so callers can issue several queries
/// concurrently.
#[async_trait]
pub trait BiometricsProvider: Send + Sync {
    /// Request read access. Fails if the user denied or revoked it.
    async fn authorize(&self) -> Result<(), BiometricsError>;

    /// Values of all samples of `metric` starting within `range`, in any order.
    ///
    /// Returns an empty list if the metric has never been recorded.
    async fn samples(
        &self,
        metric: Metric,
        unit: Unit,
        range: TimeRange,
    ) -> Result<Vec<f64>, BiometricsError>;

    /// Cumulative sum of `metric` over `range`; 0 if nothing was recorded.
    async fn sum(&self, metric: Metric, unit: Unit, range: TimeRange)
        -> Result<f64, BiometricsError>;

    /// Hours asleep across all sleep intervals overlapping `range`.
    async fn sleep_hours(&self, range: TimeRange) -> Result<f64, BiometricsError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_sleep_hours_counts_only_asleep_variants() {
        let samples = vec![
            SleepSample::new(SleepCategory::AsleepCore, at(0, 0), at(2, 0)),
            SleepSample::new(SleepCategory::Awake, at(2, 0), at(2, 30)),
            SleepSample::new(SleepCategory::AsleepRem, at(2, 30), at(3, 0)),
            SleepSample::new(SleepCategory::InBed, at(3, 0), at(7, 0)),
        ];

        assert!((sleep_hours(&samples) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_sleep_hours_includes_deep_and_unspecified() {
        let samples = vec![
            SleepSample::new(SleepCategory::AsleepDeep, at(1, 0), at(1, 45)),
            SleepSample::new(SleepCategory::AsleepUnspecified, at(4, 0), at(4, 15)),
        ];

        assert!((sleep_hours(&samples) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_trailing_range() {
        let now = at(12, 0);
        let range = TimeRange::trailing(now, chrono::Duration::hours(1));

        assert_eq!(range.start, at(11, 0));
        assert!(range.contains(at(11, 0)));
        assert!(range.contains(at(11, 59)));
        assert!(!range.contains(at(12, 0)));
    }

    #[test]
    fn test_day_of_uses_local_midnight() {
        let tz = chrono_tz::America::New_York;
        // 02:30 UTC on the 11th is 22:30 on the 10th in New York (EDT, UTC-4).
        let now = Utc
            .with_ymd_and_hms(2025, 6, 11, 2, 30, 0)
            .unwrap()
            .with_timezone(&tz);

        let day = TimeRange::day_of(&now);

        assert_eq!(day.start, Utc.with_ymd_and_hms(2025, 6, 10, 4, 0, 0).unwrap());
        assert_eq!(day.end, Utc.with_ymd_and_hms(2025, 6, 11, 4, 0, 0).unwrap());
    }

    #[test]
    fn test_day_of_across_dst_change_is_23_hours() {
        let tz = chrono_tz::Europe::Berlin;
        let now = Utc
            .with_ymd_and_hms(2025, 3, 30, 12, 0, 0)
            .unwrap()
            .with_timezone(&tz);

        let day = TimeRange::day_of(&now);

        assert_eq!((day.end - day.start).num_hours(), 23);
    }

    #[test]
    fn test_overlaps() {
        let range = TimeRange::new(at(0, 0), at(6, 0));
        assert!(range.overlaps(at(5, 0), at(7, 0)));
        assert!(!range.overlaps(at(6, 0), at(7, 0)));
    }
}
