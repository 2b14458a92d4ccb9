//! Outward effects of the reminder engine: desktop notifications and the
//! per-user audit log.
//!
//! Both are fire-and-forget from the engine's point of view. Callers log
//! failures and move on.

pub mod notify;
#[cfg(feature = "remote")]
pub mod remote;
pub mod store;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use notify::{system_notifier, ConsoleNotifier, OsaScriptNotifier};
#[cfg(feature = "remote")]
pub use remote::RemoteLogStore;
pub use store::{JsonLogStore, MemoryLogStore, UserDocument};

/// A title/body pair for the OS notification center.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// What produced an audit-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    /// Reminder raised automatically by the engine
    AiPrompt,
    /// Reminder requested by the user
    ManualTrigger,
}

/// One audit-log entry. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Remote store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLogConfig {
    /// Base URL, e.g. `https://logs.example.com`
    pub base_url: String,
    /// Bearer authentication token
    pub token: String,
}

impl RemoteLogConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    /// Copy safe to print: the token is masked.
    pub fn redacted(&self) -> Self {
        Self {
            base_url: self.base_url.clone(),
            token: "*".repeat(self.token.len().min(8)),
        }
    }
}

/// Reject ids that cannot name a per-user document or URL path segment.
pub(crate) fn validate_user_id(user_id: &str) -> Result<(), LogStoreError> {
    let invalid = user_id.is_empty()
        || user_id == "."
        || user_id == ".."
        || user_id.contains(['/', '\\']);
    if invalid {
        return Err(LogStoreError::InvalidUser(user_id.to_string()));
    }
    Ok(())
}

/// Notification delivery errors.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Failed to launch notifier: {0}")]
    Launch(#[from] std::io::Error),

    #[error("Notifier exited with {0}")]
    Failed(String),
}

/// Audit-log store errors.
#[derive(Debug, Error)]
pub enum LogStoreError {
    #[error("Invalid user id: {0:?}")]
    InvalidUser(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid log document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid log store URL: {0}")]
    InvalidUrl(String),

    #[error("Log store network error: {0}")]
    Network(String),

    #[error("Log store server error ({status}): {message}")]
    Server { status: u16, message: String },
}

/// Delivers user-facing notifications. No delivery confirmation.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Append-only per-user audit log.
///
/// Appends are not idempotent: the same entry appended twice is stored twice.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Append `entry` to the user's log, creating the log if absent.
    async fn append(&self, user_id: &str, entry: &LogEntry) -> Result<(), LogStoreError>;

    /// All entries for `user_id`, oldest first.
    async fn entries(&self, user_id: &str) -> Result<Vec<LogEntry>, LogStoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_log_entry_wire_format() {
        let entry = LogEntry {
            kind: LogKind::AiPrompt,
            message: "breathe".to_string(),
            risk_score: Some(0.67),
            timestamp: Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap(),
        };

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["type"], "ai_prompt");
        assert_eq!(value["riskScore"], 0.67);
        assert_eq!(value["timestamp"], "2025-03-10T09:00:00Z");
    }

    #[test]
    fn test_manual_entry_omits_risk_score() {
        let entry = LogEntry {
            kind: LogKind::ManualTrigger,
            message: "Mindfulness prompt triggered".to_string(),
            risk_score: None,
            timestamp: Utc::now(),
        };

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["type"], "manual_trigger");
        assert!(value.get("riskScore").is_none());
    }

    #[test]
    fn test_redacted_config_hides_token() {
        let config = RemoteLogConfig::new("https://logs.example.com", "sk-live-123456789");
        let shown = config.redacted();
        assert_eq!(shown.base_url, config.base_url);
        assert_eq!(shown.token, "********");

        let json = serde_json::to_string(&shown).unwrap();
        assert!(!json.contains("sk-live"));
    }

    #[test]
    fn test_user_id_validation() {
        assert!(validate_user_id("local-mbp").is_ok());
        for bad in ["", ".", "..", "a/b", "a\\b"] {
            assert!(matches!(
                validate_user_id(bad),
                Err(LogStoreError::InvalidUser(_))
            ));
        }
    }

    #[test]
    fn test_config_round_trip() {
        let config = RemoteLogConfig::new("http://127.0.0.1:8080", "t");
        let json = serde_json::to_string(&config).unwrap();
        let back: RemoteLogConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
