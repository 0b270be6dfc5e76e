use super::traits::{Channel, ChannelMessage, SendMessage, SenderIdentity};
use crate::config::TelegramConfig;
use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

/// Pause after a failed poll before trying again.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Telegram channel — long-polls the Bot API for updates
pub struct TelegramChannel {
    bot_token: String,
    api_base: String,
    poll_timeout_secs: u64,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            poll_timeout_secs: 30,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &TelegramConfig) -> Self {
        Self::new(config.bot_token.clone(), config.api_base.clone())
            .with_poll_timeout(config.poll_timeout_secs)
    }

    pub fn with_poll_timeout(mut self, secs: u64) -> Self {
        self.poll_timeout_secs = secs;
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.bot_token)
    }

    /// Fetch one batch of updates at or after `offset`.
    async fn get_updates(&self, offset: i64) -> anyhow::Result<Vec<serde_json::Value>> {
        let body = serde_json::json!({
            "offset": offset,
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["message"]
        });

        let data: serde_json::Value = self
            .client
            .post(self.api_url("getUpdates"))
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if data.get("ok").and_then(serde_json::Value::as_bool) == Some(false) {
            let description = data
                .get("description")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown error");
            anyhow::bail!("getUpdates rejected: {description}");
        }

        Ok(data
            .get("result")
            .and_then(serde_json::Value::as_array)
            .cloned()
            .unwrap_or_default())
    }
}

/// Turn one `getUpdates` entry into a command message.
///
/// Returns `None` for anything that is not a plain text message: edits,
/// stickers, photos, and slash commands such as `/start`.
pub(crate) fn parse_update(update: &serde_json::Value) -> Option<ChannelMessage> {
    let message = update.get("message")?;
    let text = message.get("text").and_then(serde_json::Value::as_str)?;
    if text.starts_with('/') {
        return None;
    }

    let from = message.get("from")?;
    let sender = SenderIdentity {
        id: from.get("id").and_then(serde_json::Value::as_i64)?,
        username: from
            .get("username")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string),
        is_bot: from
            .get("is_bot")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false),
    };

    let chat_id = message
        .get("chat")
        .and_then(|c| c.get("id"))
        .and_then(serde_json::Value::as_i64)?;

    Some(ChannelMessage {
        id: Uuid::new_v4().to_string(),
        sender,
        reply_target: chat_id.to_string(),
        content: text.to_string(),
        channel: "telegram".to_string(),
        timestamp: message
            .get("date")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or_else(crate::util::unix_timestamp),
    })
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, message: &SendMessage) -> anyhow::Result<()> {
        // Plain text: command output is full of characters Markdown would eat.
        let body = serde_json::json!({
            "chat_id": message.recipient,
            "text": message.content,
        });

        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let err = resp.text().await.unwrap_or_default();
            anyhow::bail!("Telegram sendMessage failed ({status}): {err}");
        }

        Ok(())
    }

    async fn listen(&self, tx: tokio::sync::mpsc::Sender<ChannelMessage>) -> anyhow::Result<()> {
        let mut offset: i64 = 0;

        tracing::info!("Telegram channel listening for messages...");

        loop {
            let updates = match self.get_updates(offset).await {
                Ok(updates) => updates,
                Err(e) => {
                    tracing::warn!("Telegram poll error: {e}");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                }
            };

            for update in &updates {
                // Advance offset past this update
                if let Some(uid) = update.get("update_id").and_then(serde_json::Value::as_i64) {
                    offset = uid + 1;
                }

                let Some(msg) = parse_update(update) else {
                    continue;
                };

                if tx.send(msg).await.is_err() {
                    return Ok(());
                }
            }
        }
    }

    async fn health_check(&self) -> bool {
        self.client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}
