//! Configuration for SenseShift.

use crate::core::{DEFAULT_LOOKBACK, DEFAULT_SAMPLE_INTERVAL, DEFAULT_TAP_WINDOW};
use crate::effects::RemoteLogConfig;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const APP_DIR: &str = "sense-shift";

/// Main configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Period between snapshots
    #[serde(with = "duration_serde")]
    pub sample_interval: Duration,

    /// Length of a tap-count window
    #[serde(with = "duration_serde")]
    pub tap_window: Duration,

    /// Trailing window for biometrics samples and the step sum
    #[serde(with = "duration_serde")]
    pub biometrics_lookback: Duration,

    /// Health-data export to read biometrics from. No biometrics when unset.
    pub biometrics_path: Option<PathBuf>,

    /// IANA zone for calendar-day bounds; the system zone when unset
    pub timezone: Option<String>,

    /// Owner of the audit log
    pub user_id: String,

    /// Path for session exports
    pub export_path: PathBuf,

    /// Path for audit logs and transparency stats
    pub data_path: PathBuf,

    /// Whether sampling is currently paused
    pub paused: bool,

    /// Whether reminders raise desktop notifications
    pub notifications: bool,

    /// Hosted audit-log store. Logs stay local when unset.
    pub remote_log: Option<RemoteLogConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);

        Self {
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            tap_window: DEFAULT_TAP_WINDOW,
            biometrics_lookback: DEFAULT_LOOKBACK,
            biometrics_path: None,
            timezone: None,
            user_id: default_user_id(),
            export_path: data_dir.join("exports"),
            data_path: data_dir,
            paused: false,
            notifications: true,
            remote_log: None,
        }
    }
}

fn default_user_id() -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    format!("local-{host}")
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_json(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Config =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the sampler cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("sample_interval"));
        }
        if self.tap_window.is_zero() {
            return Err(ConfigError::ZeroDuration("tap_window"));
        }
        self.timezone()?;
        Ok(())
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(&config_path, content)?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.json")
    }

    /// File holding persisted transparency counters.
    pub fn transparency_path(&self) -> PathBuf {
        self.data_path.join("transparency.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.export_path)?;
        std::fs::create_dir_all(&self.data_path)?;
        Ok(())
    }

    /// The configured zone, parsed.
    pub fn timezone(&self) -> Result<Option<Tz>, ConfigError> {
        self.timezone
            .as_deref()
            .map(|name| {
                name.parse::<Tz>()
                    .map_err(|_| ConfigError::InvalidTimezone(name.to_string()))
            })
            .transpose()
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),

    #[error("Unknown timezone: {0}")]
    InvalidTimezone(String),

    #[error("{0} must be at least one second")]
    ZeroDuration(&'static str),
}

/// Serde support for Duration, as whole seconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sample_interval, Duration::from_secs(10));
        assert_eq!(config.tap_window, Duration::from_secs(10));
        assert_eq!(config.biometrics_lookback, Duration::from_secs(3600));
        assert!(config.user_id.starts_with("local-"));
        assert!(config.notifications);
        assert!(!config.paused);
        assert!(config.remote_log.is_none());
    }

    #[test]
    fn test_json_round_trip() {
        let mut config = Config::default();
        config.sample_interval = Duration::from_secs(30);
        config.timezone = Some("Europe/Berlin".to_string());
        config.remote_log = Some(RemoteLogConfig::new("https://logs.example.com", "t0k"));

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"sample_interval\":30"));

        let back = Config::from_json(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config = Config::from_json(r#"{"paused": true, "user_id": "alice"}"#).unwrap();
        assert!(config.paused);
        assert_eq!(config.user_id, "alice");
        assert_eq!(config.sample_interval, DEFAULT_SAMPLE_INTERVAL);
    }

    #[test]
    fn test_timezone_parsing() {
        let config = Config::from_json(r#"{"timezone": "America/New_York"}"#).unwrap();
        assert_eq!(config.timezone().unwrap(), Some(chrono_tz::America::New_York));

        let err = Config::from_json(r#"{"timezone": "Mars/Olympus"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimezone(_)));
    }

    #[test]
    fn test_zero_durations_are_rejected() {
        let err = Config::from_json(r#"{"sample_interval": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroDuration("sample_interval")));

        let err = Config::from_json(r#"{"tap_window": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroDuration("tap_window")));

        assert!(Config::from_json(r#"{"sample_interval": 1, "tap_window": 1}"#).is_ok());
    }
}
