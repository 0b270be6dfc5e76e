use super::traits::{Channel, ChannelMessage, SendMessage, SenderIdentity};
use async_trait::async_trait;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use uuid::Uuid;

/// Sender id used for commands typed on the local terminal.
pub const OPERATOR_ID: i64 = 0;

/// CLI channel — stdin/stdout, for trying handlers without a bot token.
pub struct CliChannel;

impl CliChannel {
    pub fn new() -> Self {
        Self
    }

    /// The identity attached to every terminal line.
    pub fn operator() -> SenderIdentity {
        SenderIdentity::new(OPERATOR_ID, Some("operator"))
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn send(&self, message: &SendMessage) -> anyhow::Result<()> {
        println!("{}", message.content);
        Ok(())
    }

    async fn listen(&self, tx: tokio::sync::mpsc::Sender<ChannelMessage>) -> anyhow::Result<()> {
        let stdin = io::stdin();
        let reader = BufReader::new(stdin);
        let mut lines = reader.lines();

        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            if line == "/quit" || line == "/exit" {
                break;
            }

            let msg = ChannelMessage {
                id: Uuid::new_v4().to_string(),
                sender: Self::operator(),
                reply_target: "operator".to_string(),
                content: line,
                channel: "cli".to_string(),
                timestamp: crate::util::unix_timestamp(),
            };

            if tx.send(msg).await.is_err() {
                break;
            }
        }
        Ok(())
    }
}
