//! Snapshot records emitted once per sampler tick.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Biometrics gathered for one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BiometricsReadings {
    pub heart_rate: Vec<f64>,
    /// Oxygen saturation as fractions (0-1), as the provider records it
    pub oxygen_saturation: Vec<f64>,
    pub respiratory_rate: Vec<f64>,
    pub active_energy: Vec<f64>,
    pub step_count: f64,
    pub sleep_hours: f64,
}

/// One immutable sample of system and biometric signals.
///
/// Optional fields are absent when their source was unavailable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tap_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_count: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep_hours: Option<f64>,
    #[serde(default)]
    pub heart_rate_samples: Vec<f64>,
    /// Percent (0-100)
    #[serde(default)]
    pub spo2_samples: Vec<f64>,
    #[serde(default)]
    pub respiratory_rate_samples: Vec<f64>,
    #[serde(default)]
    pub calories_samples: Vec<f64>,
}

impl Snapshot {
    /// Assemble a snapshot from one tick's readings.
    pub fn assemble(
        timestamp: DateTime<Utc>,
        brightness: Option<f32>,
        tap_count: Option<u64>,
        uptime_seconds: Option<f64>,
        biometrics: BiometricsReadings,
    ) -> Self {
        Self {
            timestamp,
            brightness,
            tap_count,
            uptime_seconds,
            step_count: Some(biometrics.step_count),
            sleep_hours: Some(biometrics.sleep_hours),
            heart_rate_samples: biometrics.heart_rate,
            spo2_samples: biometrics
                .oxygen_saturation
                .into_iter()
                .map(|fraction| fraction * 100.0)
                .collect(),
            respiratory_rate_samples: biometrics.respiratory_rate,
            calories_samples: biometrics.active_energy,
        }
    }

    /// Pretty-printed JSON with keys in lexicographic order.
    pub fn to_sorted_json(&self) -> Result<String, serde_json::Error> {
        // serde_json's Map is a BTreeMap, so going through Value sorts keys
        // at every level.
        let value = serde_json::to_value(self)?;
        serde_json::to_string_pretty(&value)
    }

    /// One-line description for logs.
    pub fn summary(&self) -> String {
        let spread = |values: &[f64]| {
            if values.is_empty() {
                "-".to_string()
            } else if values.len() == 1 {
                format!("{:.1}", values[0])
            } else {
                format!("{:.1}±{:.1}", values.mean(), values.std_dev())
            }
        };
        format!(
            "taps: {} | hr: {} ({} samples) | spo2: {} | steps: {} | sleep: {}h",
            self.tap_count
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".to_string()),
            spread(&self.heart_rate_samples),
            self.heart_rate_samples.len(),
            spread(&self.spo2_samples),
            self.step_count.map(|s| format!("{s:.0}")).unwrap_or_default(),
            self.sleep_hours.map(|h| format!("{h:.2}")).unwrap_or_default(),
        )
    }
}
