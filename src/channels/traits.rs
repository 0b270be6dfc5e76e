use async_trait::async_trait;

/// Who sent a message, as far as the gate needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderIdentity {
    /// Numeric platform id.
    pub id: i64,
    /// Platform handle without the leading `@`, if the sender has one.
    pub username: Option<String>,
    /// Set for automated senders (other bots).
    pub is_bot: bool,
}

impl SenderIdentity {
    pub fn new(id: i64, username: Option<&str>) -> Self {
        Self {
            id,
            username: username.map(str::to_string),
            is_bot: false,
        }
    }
}

/// A message received from a channel
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    pub id: String,
    pub sender: SenderIdentity,
    /// Where replies go (chat id for Telegram).
    pub reply_target: String,
    pub content: String,
    pub channel: String,
    pub timestamp: u64,
}

/// A message to deliver through a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessage {
    pub content: String,
    pub recipient: String,
}

impl SendMessage {
    pub fn new(content: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            recipient: recipient.into(),
        }
    }
}

/// Core channel trait — implement for any messaging platform
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name
    fn name(&self) -> &str;

    /// Send a message through this channel
    async fn send(&self, message: &SendMessage) -> anyhow::Result<()>;

    /// Start listening for incoming messages (long-running)
    async fn listen(&self, tx: tokio::sync::mpsc::Sender<ChannelMessage>) -> anyhow::Result<()>;

    /// Check if channel is healthy
    async fn health_check(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DummyChannel;

    #[async_trait]
    impl Channel for DummyChannel {
        fn name(&self) -> &str {
            "dummy"
        }

        async fn send(&self, _message: &SendMessage) -> anyhow::Result<()> {
            Ok(())
        }

        async fn listen(
            &self,
            tx: tokio::sync::mpsc::Sender<ChannelMessage>,
        ) -> anyhow::Result<()> {
            tx.send(ChannelMessage {
                id: "1".into(),
                sender: SenderIdentity::new(7, Some("tester")),
                reply_target: "7".into(),
                content: "uptime".into(),
                channel: "dummy".into(),
                timestamp: 123,
            })
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))
        }
    }

    #[test]
    fn sender_identity_new_is_human() {
        let sender = SenderIdentity::new(42, Some("alice"));
        assert_eq!(sender.id, 42);
        assert_eq!(sender.username.as_deref(), Some("alice"));
        assert!(!sender.is_bot);
    }

    #[tokio::test]
    async fn default_health_check_and_send_succeed() {
        let channel = DummyChannel;

        assert!(channel.health_check().await);
        assert!(channel.send(&SendMessage::new("hello", "bob")).await.is_ok());
    }

    #[tokio::test]
    async fn listen_sends_message_to_channel() {
        let channel = DummyChannel;
        let (tx, mut rx) = tokio::sync::mpsc::channel(1);

        channel.listen(tx).await.unwrap();

        let received = rx.recv().await.expect("message should be sent");
        assert_eq!(received.sender.username.as_deref(), Some("tester"));
        assert_eq!(received.content, "uptime");
        assert_eq!(received.reply_target, "7");
    }
}
