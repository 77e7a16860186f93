use anyhow::{Context, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::actors::messages::{AlertEvent, Severity};
use crate::alerts::{Notifier, http_client};
use crate::config::Discord;

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl EmbedField {
    fn new(name: &str, value: impl ToString, inline: bool) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            inline,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Default)]
pub struct MessageBuilder {
    content: Option<String>,
    embeds: Vec<Embed>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, content: impl ToString) -> Self {
        self.content = Some(content.to_string());
        self
    }

    pub fn add_embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn build(self) -> Message {
        Message {
            content: self.content,
            embeds: self.embeds,
        }
    }
}

const RED: u32 = 15158332;
const ORANGE: u32 = 15105570;

/// Posts alert embeds to a Discord webhook
#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    client: Client,
    url: String,
    user_id: Option<String>,
}

impl DiscordNotifier {
    pub fn new(config: &Discord) -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client()?,
            url: config.url.clone(),
            user_id: config.user_id.clone(),
        })
    }

    pub fn build_failure_embed(event: &AlertEvent) -> Embed {
        let (title, color) = match event.severity {
            Severity::Critical => ("🔴 Monitor Down", RED),
            Severity::Warning => ("🟠 Monitor Still Down", ORANGE),
        };

        let target = if event.url.is_empty() {
            event.monitor_id.to_string()
        } else {
            event.url.clone()
        };

        let mut fields = vec![
            EmbedField::new("🌐 URL", &target, false),
            EmbedField::new("❌ Error", &event.error, false),
        ];
        if let Some(code) = event.status_code {
            fields.push(EmbedField::new("📟 Status", code, true));
        }
        if let Some(latency) = event.latency_ms {
            fields.push(EmbedField::new("⏱️ Latency", format!("{latency}ms"), true));
        }
        fields.push(EmbedField::new("🔁 Failures", event.failure_count, true));

        Embed {
            title: Some(title.to_string()),
            description: Some(format!("Check of **{target}** failed")),
            color: Some(color),
            fields,
            footer: Some(EmbedFooter {
                text: format!("Monitor: {}", event.monitor_id),
            }),
            timestamp: Some(event.timestamp.to_rfc3339()),
        }
    }

    pub fn build_message(&self, event: &AlertEvent) -> Message {
        let mut message_builder = MessageBuilder::new().add_embed(Self::build_failure_embed(event));
        if let Some(user_id) = &self.user_id {
            message_builder = message_builder.content(format!("🔴 `{}` <@{user_id}>", event.url));
        }
        message_builder.build()
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    fn name(&self) -> &'static str {
        "discord"
    }

    #[instrument(skip(self, event), fields(monitor_id = %event.monitor_id))]
    async fn notify(&self, event: &AlertEvent, _recipient: &str) -> anyhow::Result<()> {
        let message = self.build_message(event);
        let response = self
            .client
            .post(&self.url)
            .json(&message)
            .send()
            .await
            .context("failed to send Discord message")?;

        if !response.status().is_success() {
            let status = response.status();
            if let Ok(error_text) = response.text().await {
                error!("Discord API error response: {}", error_text);
            }
            bail!("Discord message failed with status: {status}");
        }

        info!("successfully sent Discord message");
        Ok(())
    }
}
