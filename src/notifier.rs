use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;

/// Operator alerts over a Slack incoming webhook. Without a webhook every
/// alert is dropped.
#[derive(Clone)]
pub struct Notifier {
    webhook_url: Option<String>,
    http: Client,
}

#[derive(Serialize)]
struct WebhookMessage {
    text: String,
}

impl Notifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self { webhook_url, http: Client::new() }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    pub async fn alert(&self, event: &str, detail: &str) -> Result<()> {
        let Some(url) = self.webhook_url.as_deref() else {
            return Ok(());
        };

        let message = WebhookMessage { text: format!(":warning: credit-oracle `{event}`: {detail}") };
        let status = self.http.post(url).json(&message).send().await?.status();
        if !status.is_success() {
            return Err(anyhow!("alert webhook returned {status} for {event}"));
        }
        Ok(())
    }
}
