use std::sync::Arc;

use anyhow::{Context, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::actors::messages::AlertEvent;
use crate::config::{AlertChannel, AlertConfig, Email, Webhook};
use crate::discord::DiscordNotifier;

/// Delivers alert events to the outside world
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    /// Deliver `event` to `recipient`
    ///
    /// Notifiers without a notion of recipient ignore it.
    async fn notify(&self, event: &AlertEvent, recipient: &str) -> anyhow::Result<()>;
}

/// Build the notifier selected by the alert configuration
pub fn build_notifier(config: &AlertConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    let notifier: Arc<dyn Notifier> = match &config.channel {
        AlertChannel::Email(email) => {
            if config.access_key.is_none() {
                warn!("no access key configured for the e-mail API");
            }
            Arc::new(EmailNotifier::new(email, config.access_key.clone())?)
        }
        AlertChannel::Webhook(webhook) => Arc::new(WebhookNotifier::new(webhook)?),
        AlertChannel::Discord(discord) => Arc::new(DiscordNotifier::new(discord)?),
        AlertChannel::Log => Arc::new(LogNotifier),
    };

    info!("delivering alerts through {}", notifier.name());
    Ok(notifier)
}

pub(crate) fn http_client() -> anyhow::Result<Client> {
    Client::builder()
        .user_agent(concat!("heartbeat/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")
}

/// Sends alerts through an HTTP e-mail API
#[derive(Debug, Clone)]
pub struct EmailNotifier {
    client: Client,
    api_url: String,
    from: String,
    access_key: Option<String>,
}

impl EmailNotifier {
    pub fn new(config: &Email, access_key: Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client()?,
            api_url: config.api_url.clone(),
            from: config.from.clone(),
            access_key,
        })
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &'static str {
        "email"
    }

    #[instrument(skip(self, event), fields(monitor_id = %event.monitor_id))]
    async fn notify(&self, event: &AlertEvent, recipient: &str) -> anyhow::Result<()> {
        let payload = json!({
            "from": self.from,
            "to": recipient,
            "subject": event.subject(),
            "text": event.summary(),
        });

        let mut request = self.client.post(&self.api_url).json(&payload);
        if let Some(key) = &self.access_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.context("failed to reach e-mail API")?;
        if !response.status().is_success() {
            bail!("e-mail API responded with status {}", response.status());
        }

        info!("sent alert e-mail");
        Ok(())
    }
}

/// Posts a JSON payload to a generic webhook
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(config: &Webhook) -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client()?,
            url: config.url.clone(),
        })
    }

    fn format_message(event: &AlertEvent) -> String {
        let target = if event.url.is_empty() {
            event.monitor_id.to_string()
        } else {
            event.url.clone()
        };

        match event.failure_count {
            0 | 1 => format!("🔴 **Monitor DOWN**: `{target}` ({})", event.error),
            count => format!("🔴 **Monitor still DOWN**: `{target}` failed {count} times in a row ({})", event.error),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &'static str {
        "webhook"
    }

    #[instrument(skip(self, event), fields(monitor_id = %event.monitor_id))]
    async fn notify(&self, event: &AlertEvent, _recipient: &str) -> anyhow::Result<()> {
        let payload = json!({
            "message": Self::format_message(event),
            "monitor": event.monitor_id,
            "url": event.url,
            "severity": event.severity,
            "error": event.error,
            "status_code": event.status_code,
            "failure_count": event.failure_count,
            "timestamp": event.timestamp.to_rfc3339(),
        });

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .context("failed to reach webhook")?;

        if !response.status().is_success() {
            bail!("webhook alert failed with status: {}", response.status());
        }

        info!("successfully sent webhook alert");
        Ok(())
    }
}

/// Writes alerts to the log only
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, event: &AlertEvent, recipient: &str) -> anyhow::Result<()> {
        warn!(
            monitor_id = %event.monitor_id,
            severity = %event.severity,
            recipient,
            "{}: {}",
            event.subject(),
            event.error
        );
        Ok(())
    }
}
