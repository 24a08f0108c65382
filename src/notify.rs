//! Outbound alert delivery.
//!
//! Cap alerts go to a Slack-compatible incoming webhook. Delivery is best
//! effort: the admission engine spawns each send on its own task and only
//! logs failures, so a slow or broken webhook never touches request latency.

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::config::NotifierConfig;

/// Bound on a single webhook round trip.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors surfaced to the caller's log line.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("webhook did not acknowledge: {0:?}")]
    Rejected(String),
}

/// Incoming-webhook message shape.
#[derive(Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
    channel: &'a str,
    username: &'a str,
    icon_emoji: &'a str,
}

/// Webhook client, disabled when no URL is configured.
pub struct Notifier {
    target: Option<Target>,
}

struct Target {
    client: reqwest::Client,
    url: String,
    channel: String,
    username: String,
    icon_emoji: String,
}

impl Notifier {
    pub fn new(config: &NotifierConfig) -> Self {
        let target = config.webhook_url.as_ref().map(|url| Target {
            client: reqwest::Client::new(),
            url: url.clone(),
            channel: config.channel.clone(),
            username: config.username.clone(),
            icon_emoji: config.icon_emoji.clone(),
        });
        Self { target }
    }

    /// True when a webhook URL is configured.
    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    /// Post `message` to the webhook. Succeeds silently when disabled.
    ///
    /// The webhook is expected to acknowledge with a literal `ok` body;
    /// anything else is treated as a failed delivery.
    pub async fn notify(&self, message: &str) -> Result<(), NotifyError> {
        let Some(target) = &self.target else {
            return Ok(());
        };

        let payload = WebhookPayload {
            text: message,
            channel: &target.channel,
            username: &target.username,
            icon_emoji: &target.icon_emoji,
        };

        let response = target
            .client
            .post(&target.url)
            .timeout(DELIVERY_TIMEOUT)
            .json(&payload)
            .send()
            .await?;

        let body = response.text().await?;
        if body != "ok" {
            return Err(NotifyError::Rejected(body));
        }
        Ok(())
    }
}
