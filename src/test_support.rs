//! Shared fixtures for unit tests.

use crate::channels::traits::{Channel, ChannelMessage, SendMessage, SenderIdentity};
use crate::handlers::{Delivery, Handler, Responder};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Channel that records every outbound message.
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<SendMessage>>,
    fail_sends: bool,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel whose `send` always errors.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_sends: true,
        }
    }

    pub fn sent(&self) -> Vec<SendMessage> {
        self.sent.lock().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|m| m.content.clone()).collect()
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, message: &SendMessage) -> anyhow::Result<()> {
        if self.fail_sends {
            anyhow::bail!("transport unavailable");
        }
        self.sent.lock().push(message.clone());
        Ok(())
    }

    async fn listen(&self, _tx: tokio::sync::mpsc::Sender<ChannelMessage>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Counters shared between a [`StubHandler`] and the test that owns it.
#[derive(Default)]
pub struct StubCalls {
    pub predicate: AtomicUsize,
    pub execute: AtomicUsize,
}

impl StubCalls {
    pub fn predicate_calls(&self) -> usize {
        self.predicate.load(Ordering::SeqCst)
    }

    pub fn execute_calls(&self) -> usize {
        self.execute.load(Ordering::SeqCst)
    }
}

/// What a [`StubHandler`] does when executed.
#[derive(Clone)]
pub enum StubBehaviour {
    Reply(String),
    Silent,
    Fail(String),
}

/// Handler that matches one exact command and counts its calls.
pub struct StubHandler {
    name: String,
    command: String,
    help: String,
    behaviour: StubBehaviour,
    pub calls: Arc<StubCalls>,
}

impl StubHandler {
    pub fn new(name: &str, command: &str, behaviour: StubBehaviour) -> Self {
        Self {
            name: name.to_string(),
            command: command.to_string(),
            help: format!("{name}: {command}"),
            behaviour,
            calls: Arc::new(StubCalls::default()),
        }
    }

    pub fn with_help(mut self, help: &str) -> Self {
        self.help = help.to_string();
        self
    }
}

#[async_trait]
impl Handler for StubHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_handle(&self, command: &str) -> bool {
        self.calls.predicate.fetch_add(1, Ordering::SeqCst);
        command == self.command
    }

    async fn execute(&self, _command: &str, out: &Responder<'_>) -> anyhow::Result<Delivery> {
        self.calls.execute.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            StubBehaviour::Reply(text) => out.send(text).await,
            StubBehaviour::Silent => Ok(Delivery::default()),
            StubBehaviour::Fail(message) => anyhow::bail!("{message}"),
        }
    }

    fn help(&self) -> String {
        self.help.clone()
    }
}

pub fn message_from(sender: SenderIdentity, content: &str) -> ChannelMessage {
    ChannelMessage {
        id: "test-msg".into(),
        reply_target: sender.id.to_string(),
        sender,
        content: content.to_string(),
        channel: "recording".into(),
        timestamp: 0,
    }
}
