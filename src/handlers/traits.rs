use crate::channels::traits::{Channel, SendMessage};
use crate::chunker::{self, NO_TEXT_PLACEHOLDER};
use async_trait::async_trait;
use std::ops::{Add, AddAssign};

/// Completion signal returned by [`Handler::execute`]: how many messages the
/// handler delivered to the sender.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[must_use]
pub struct Delivery {
    pub messages: usize,
}

impl Delivery {
    pub fn sent(messages: usize) -> Self {
        Self { messages }
    }

    /// `true` when nothing reached the sender.
    pub fn is_empty(&self) -> bool {
        self.messages == 0
    }
}

impl Add for Delivery {
    type Output = Delivery;

    fn add(self, rhs: Delivery) -> Delivery {
        Delivery {
            messages: self.messages + rhs.messages,
        }
    }
}

impl AddAssign for Delivery {
    fn add_assign(&mut self, rhs: Delivery) {
        self.messages += rhs.messages;
    }
}

/// Contract violations a handler can report instead of replying.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// `execute` was given a command its own `can_handle` would refuse.
    #[error("handler '{handler}' cannot handle command '{command}'")]
    Unrecognized { handler: String, command: String },
}

impl HandlerError {
    pub fn unrecognized(handler: &str, command: &str) -> Self {
        Self::Unrecognized {
            handler: handler.to_string(),
            command: command.to_string(),
        }
    }
}

/// Reply handle passed to a handler for one dispatch cycle.
///
/// Binds the channel, the recipient, and the per-message size ceiling, so
/// handlers only decide *what* to say.
pub struct Responder<'a> {
    channel: &'a dyn Channel,
    recipient: &'a str,
    chunk_size: usize,
}

impl<'a> Responder<'a> {
    pub fn new(channel: &'a dyn Channel, recipient: &'a str, chunk_size: usize) -> Self {
        Self {
            channel,
            recipient,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Send `text` as a single message.
    ///
    /// Blank text becomes the placeholder; text over the ceiling is chunked
    /// rather than rejected by the transport.
    pub async fn send(&self, text: &str) -> anyhow::Result<Delivery> {
        if text.trim().is_empty() {
            return self.deliver(NO_TEXT_PLACEHOLDER).await;
        }
        if text.chars().count() > self.chunk_size {
            return self.send_chunked(text).await;
        }
        self.deliver(text).await
    }

    /// Send `text` split into ordered chunks; chunk *i* is sent before *i+1*.
    pub async fn send_chunked(&self, text: &str) -> anyhow::Result<Delivery> {
        let mut delivery = Delivery::default();
        for chunk in chunker::split(text, self.chunk_size) {
            delivery += self.deliver(&chunk).await?;
        }
        Ok(delivery)
    }

    async fn deliver(&self, text: &str) -> anyhow::Result<Delivery> {
        self.channel
            .send(&SendMessage::new(text, self.recipient))
            .await?;
        Ok(Delivery::sent(1))
    }
}

/// A pluggable unit that recognises and services a subset of commands.
///
/// `can_handle` and `execute` must agree: once `can_handle` accepts a command,
/// `execute` must not treat it as unrecognised. A handler is responsible for
/// its own reply and reports what it sent through the returned [`Delivery`].
#[async_trait]
pub trait Handler: Send + Sync {
    /// Stable handler name (used in logs)
    fn name(&self) -> &str;

    /// Whether this handler services `command` (already trimmed).
    fn can_handle(&self, command: &str) -> bool;

    /// Run the command and reply through `out`.
    async fn execute(&self, command: &str, out: &Responder<'_>) -> anyhow::Result<Delivery>;

    /// One help entry for the aggregated help text. Empty means "omit".
    fn help(&self) -> String;
}
