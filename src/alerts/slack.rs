use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;

use crate::config::AppConfig;
use crate::error::Result;

use super::{DispatchOutcome, Notifier};

/// Posts alerts to a Slack incoming webhook.
pub struct SlackNotifier {
    client: Client,
    webhook_url: Option<String>,
    username: Option<String>,
    icon_emoji: Option<String>,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct SlackMessage<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon_emoji: Option<&'a str>,
}

impl SlackNotifier {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let timeout = config.outbound_timeout();
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            webhook_url: config.slack_webhook_url().map(str::to_string),
            username: config.slack.username.clone(),
            icon_emoji: config.slack.icon_emoji.clone(),
            timeout,
        })
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    fn is_configured(&self) -> bool {
        self.webhook_url.is_some()
    }

    async fn notify(&self, message: &str) -> DispatchOutcome {
        let Some(url) = self.webhook_url.as_deref() else {
            tracing::warn!("Slack webhook URL not configured, skipping notification");
            return DispatchOutcome::skipped("slack webhook URL not configured");
        };

        let body = SlackMessage {
            text: message,
            username: self.username.as_deref(),
            icon_emoji: self.icon_emoji.as_deref(),
        };

        let outcome = match self.client.post(url).json(&body).send().await {
            Ok(response) => DispatchOutcome::from_status(response.status(), StatusCode::OK),
            Err(e) => DispatchOutcome::from_transport_error(&e, self.timeout),
        };

        if outcome.succeeded {
            tracing::info!("Slack alert sent");
        } else {
            tracing::warn!(detail = %outcome.detail, "Failed to send Slack alert");
        }

        outcome
    }
}
