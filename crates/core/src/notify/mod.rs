//! Webhook notifier.
//!
//! Fire-and-forget POST of `{title, body}` on terminal outcomes. Delivery
//! failures are logged and never propagate into the pipeline.

use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Webhook request failed: {0}")]
    RequestFailed(String),

    #[error("Webhook returned HTTP {0}")]
    Http(u16),
}

#[derive(Debug, Serialize)]
struct Payload<'a> {
    title: &'a str,
    body: &'a str,
}

/// Webhook notifier; a no-op when no URL is configured.
pub struct Notifier {
    client: Client,
    webhook_url: Option<String>,
}

impl Notifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            webhook_url,
        }
    }

    /// Send a notification, swallowing failures.
    pub async fn notify(&self, title: &str, body: &str) {
        if let Err(e) = self.send(title, body).await {
            warn!(error = %e, "Notification delivery failed");
        }
    }

    /// Send and report the outcome, for `test-notification`.
    pub async fn send(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        let Some(url) = &self.webhook_url else {
            debug!("No webhook configured, skipping notification");
            return Ok(());
        };
        let response = self
            .client
            .post(url)
            .json(&Payload { title, body })
            .send()
            .await
            .map_err(|e| NotifyError::RequestFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(NotifyError::Http(response.status().as_u16()));
        }
        debug!(title, "Notification delivered");
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.webhook_url.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_send_is_ok() {
        let notifier = Notifier::new(None);
        assert!(!notifier.is_configured());
        assert!(notifier.send("t", "b").await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_webhook_errors_on_send() {
        // Port 1 on loopback: connection refused immediately.
        let notifier = Notifier::new(Some("http://127.0.0.1:1/notify".to_string()));
        assert!(notifier.is_configured());
        assert!(notifier.send("t", "b").await.is_err());
        // notify() swallows the failure.
        notifier.notify("t", "b").await;
    }

    #[test]
    fn test_payload_shape() {
        let payload = Payload {
            title: "Matched",
            body: "details",
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, r#"{"title":"Matched","body":"details"}"#);
    }
}
