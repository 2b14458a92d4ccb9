//! Remote audit-log store.
//!
//! Appends each entry to a hosted document store with a bearer token. The
//! endpoint is `POST {base}/v1/users/{user_id}/logs`, with the user id
//! percent-encoded as one path segment.

use super::{validate_user_id, LogEntry, LogStore, LogStoreError, RemoteLogConfig};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct LogsResponse {
    #[serde(default)]
    logs: Vec<LogEntry>,
}

/// [`LogStore`] talking to a remote document store.
pub struct RemoteLogStore {
    base_url: Url,
    token: String,
    client: reqwest::Client,
}

impl RemoteLogStore {
    pub fn new(config: RemoteLogConfig) -> Result<Self, LogStoreError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| LogStoreError::InvalidUrl(format!("{}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(LogStoreError::InvalidUrl(config.base_url));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LogStoreError::Network(e.to_string()))?;

        Ok(Self {
            base_url,
            token: config.token,
            client,
        })
    }

    /// Endpoint holding `user_id`'s log.
    pub fn logs_url(&self, user_id: &str) -> Result<Url, LogStoreError> {
        validate_user_id(user_id)?;

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| LogStoreError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["v1", "users", user_id, "logs"]);
        Ok(url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, LogStoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(LogStoreError::Server {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl LogStore for RemoteLogStore {
    async fn append(&self, user_id: &str, entry: &LogEntry) -> Result<(), LogStoreError> {
        let response = self
            .client
            .post(self.logs_url(user_id)?)
            .bearer_auth(&self.token)
            .json(entry)
            .send()
            .await
            .map_err(|e| LogStoreError::Network(e.to_string()))?;

        Self::check(response).await?;
        Ok(())
    }

    async fn entries(&self, user_id: &str) -> Result<Vec<LogEntry>, LogStoreError> {
        let response = self
            .client
            .get(self.logs_url(user_id)?)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| LogStoreError::Network(e.to_string()))?;

        let body: LogsResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| LogStoreError::Network(e.to_string()))?;
        Ok(body.logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(base_url: &str) -> RemoteLogStore {
        RemoteLogStore::new(RemoteLogConfig::new(base_url, "secret")).unwrap()
    }

    #[test]
    fn test_logs_url() {
        assert_eq!(
            store("https://logs.example.com/").logs_url("alice").unwrap().as_str(),
            "https://logs.example.com/v1/users/alice/logs"
        );
        assert_eq!(
            store("https://example.com/api").logs_url("alice").unwrap().as_str(),
            "https://example.com/api/v1/users/alice/logs"
        );
    }

    #[test]
    fn test_user_id_is_one_encoded_segment() {
        let url = store("https://logs.example.com")
            .logs_url("local-my mac?x#y")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://logs.example.com/v1/users/local-my%20mac%3Fx%23y/logs"
        );
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_unsafe_user_ids_are_rejected() {
        let store = store("https://logs.example.com");
        for bad in ["", "..", "../admin", "a\\b"] {
            assert!(matches!(
                store.logs_url(bad),
                Err(LogStoreError::InvalidUser(_))
            ));
        }
    }

    #[test]
    fn test_invalid_base_url() {
        let result = RemoteLogStore::new(RemoteLogConfig::new("not a url", "t"));
        assert!(matches!(result, Err(LogStoreError::InvalidUrl(_))));
    }
}
