//! Allow-list gate over Telegram sender identity.

use super::traits::Gate;
use crate::channels::traits::SenderIdentity;
use crate::config::TelegramConfig;

/// Reply sent to any sender that fails the gate.
pub const FORBIDDEN_REPLY: &str = "Forbidden access!";

/// Admits a sender only if it is human, its numeric id is allow-listed, and
/// its handle is allow-listed. All three checks must pass.
#[derive(Debug, Clone, Default)]
pub struct AllowlistGate {
    allowed_ids: Vec<i64>,
    allowed_usernames: Vec<String>,
}

impl AllowlistGate {
    pub fn new(allowed_ids: Vec<i64>, allowed_usernames: Vec<String>) -> Self {
        Self {
            allowed_ids,
            allowed_usernames: allowed_usernames
                .into_iter()
                .map(|u| u.trim_start_matches('@').to_string())
                .collect(),
        }
    }

    pub fn from_config(config: &TelegramConfig) -> Self {
        Self::new(
            config.allowed_ids.clone(),
            config.allowed_usernames.clone(),
        )
    }

    fn is_username_allowed(&self, username: Option<&str>) -> bool {
        username.is_some_and(|name| self.allowed_usernames.iter().any(|u| u == name))
    }
}

impl Gate for AllowlistGate {
    fn is_authorised(&self, sender: &SenderIdentity) -> bool {
        if sender.is_bot {
            tracing::warn!(sender_id = sender.id, "Bot user attempted access");
            return false;
        }

        if !self.allowed_ids.contains(&sender.id) {
            tracing::warn!(sender_id = sender.id, "Unauthorised user id");
            return false;
        }

        if !self.is_username_allowed(sender.username.as_deref()) {
            tracing::warn!(
                sender_id = sender.id,
                username = sender.username.as_deref().unwrap_or("<none>"),
                "Unauthorised username"
            );
            return false;
        }

        true
    }

    fn name(&self) -> &str {
        "allowlist"
    }
}
