//! Desktop notifiers.

use super::{Notification, Notifier, NotifyError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::process::Command;

/// Logs notifications instead of displaying them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(title = %notification.title, "{}", notification.body);
        Ok(())
    }
}

/// Posts to the macOS notification center through `osascript`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsaScriptNotifier;

impl OsaScriptNotifier {
    fn script(notification: &Notification) -> String {
        format!(
            "display notification {} with title {}",
            applescript_string(&notification.body),
            applescript_string(&notification.title)
        )
    }
}

#[async_trait]
impl Notifier for OsaScriptNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let status = Command::new("osascript")
            .arg("-e")
            .arg(Self::script(notification))
            .status()
            .await?;

        if status.success() {
            Ok(())
        } else {
            Err(NotifyError::Failed(status.to_string()))
        }
    }
}

/// Quote `text` as an AppleScript string literal.
fn applescript_string(text: &str) -> String {
    let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// The notifier for this platform.
pub fn system_notifier() -> Arc<dyn Notifier> {
    if cfg!(target_os = "macos") {
        Arc::new(OsaScriptNotifier)
    } else {
        Arc::new(ConsoleNotifier)
    }
}
