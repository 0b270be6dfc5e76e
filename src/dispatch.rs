//! Per-message dispatch: gate, match, execute or fall back to help.
//!
//! One call to [`Dispatcher::dispatch`] is one cycle:
//! `RECEIVED -> AUTHORISED? -> MATCHING -> {EXECUTED | UNMATCHED}`.
//! Every cycle ends with at least one reply to the sender (or the fixed
//! rejection), and nothing a handler does propagates past this boundary.

use crate::channels::traits::{Channel, ChannelMessage};
use crate::chunker::{NO_TEXT_PLACEHOLDER, TELEGRAM_CHUNK_SIZE};
use crate::handlers::{Delivery, Handler, HandlerRegistry, Responder};
use crate::observability::{Observer, ObserverEvent, ObserverMetric};
use crate::security::{FORBIDDEN_REPLY, Gate};
use crate::util::truncate_with_ellipsis;
use std::sync::Arc;
use std::time::Instant;

/// Prefix of the reply sent when a handler faults.
const FAULT_REPLY_PREFIX: &str = "Error executing command: ";

const COMMAND_LOG_PREVIEW_CHARS: usize = 120;

/// How a dispatch cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The gate refused the sender; no handler was consulted.
    Rejected,
    /// A handler matched and completed.
    Handled { handler: String, messages: usize },
    /// A handler matched and then faulted; `messages` counts the error reply.
    Failed { handler: String, messages: usize },
    /// Nothing matched; aggregated help was sent.
    Help { messages: usize },
}

impl DispatchOutcome {
    /// Messages this cycle delivered, excluding the fixed rejection.
    pub fn messages(&self) -> usize {
        match self {
            Self::Handled { messages, .. }
            | Self::Failed { messages, .. }
            | Self::Help { messages } => *messages,
            Self::Rejected => 0,
        }
    }
}

pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    gate: Arc<dyn Gate>,
    observer: Arc<dyn Observer>,
    chunk_size: usize,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<HandlerRegistry>,
        gate: Arc<dyn Gate>,
        observer: Arc<dyn Observer>,
    ) -> Self {
        Self {
            registry,
            gate,
            observer,
            chunk_size: TELEGRAM_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Swap in a freshly built registry. Takes `&mut self`, so it cannot
    /// overlap a dispatch cycle.
    pub fn replace_registry(&mut self, registry: Arc<HandlerRegistry>) {
        self.registry = registry;
    }

    /// Run one dispatch cycle for `msg`, replying through `channel`.
    pub async fn dispatch(&self, msg: &ChannelMessage, channel: &dyn Channel) -> DispatchOutcome {
        let started = Instant::now();
        self.observer.record_event(&ObserverEvent::ChannelMessage {
            channel: msg.channel.clone(),
            direction: "inbound".into(),
        });

        let out = Responder::new(channel, &msg.reply_target, self.chunk_size);

        let outcome = if self.gate.is_authorised(&msg.sender) {
            let command = msg.content.trim();
            tracing::info!(
                channel = %msg.channel,
                sender_id = msg.sender.id,
                "Got command: {}",
                truncate_with_ellipsis(command, COMMAND_LOG_PREVIEW_CHARS)
            );
            match self.route(command) {
                Some((key, handler)) => self.execute(key, handler, command, &out).await,
                None => self.show_help(&out).await,
            }
        } else {
            self.reject(msg, &out).await
        };

        self.observer
            .record_metric(&ObserverMetric::DispatchLatency(started.elapsed()));
        self.observer
            .record_metric(&ObserverMetric::MessagesSent(outcome.messages() as u64));
        outcome
    }

    /// First handler, in registry order, whose predicate accepts `command`.
    fn route(&self, command: &str) -> Option<(&str, &dyn Handler)> {
        self.registry
            .iter()
            .find(|(_, handler)| handler.can_handle(command))
    }

    async fn reject(&self, msg: &ChannelMessage, out: &Responder<'_>) -> DispatchOutcome {
        self.observer.record_event(&ObserverEvent::AuthRejected {
            channel: msg.channel.clone(),
            sender_id: msg.sender.id,
            username: msg.sender.username.clone(),
        });
        if let Err(e) = out.send(FORBIDDEN_REPLY).await {
            self.report_send_failure(&e);
        }
        DispatchOutcome::Rejected
    }

    async fn execute(
        &self,
        key: &str,
        handler: &dyn Handler,
        command: &str,
        out: &Responder<'_>,
    ) -> DispatchOutcome {
        self.observer.record_event(&ObserverEvent::HandlerMatched {
            handler: key.to_string(),
        });
        let started = Instant::now();

        match handler.execute(command, out).await {
            Ok(delivery) => {
                let delivery = if delivery.is_empty() {
                    tracing::warn!(handler = key, "Handler completed without replying");
                    self.send_or_report(out, NO_TEXT_PLACEHOLDER).await
                } else {
                    delivery
                };
                self.observer.record_event(&ObserverEvent::HandlerCompleted {
                    handler: key.to_string(),
                    duration: started.elapsed(),
                    success: true,
                    messages: delivery.messages,
                });
                DispatchOutcome::Handled {
                    handler: key.to_string(),
                    messages: delivery.messages,
                }
            }
            Err(e) => {
                tracing::error!(handler = key, "Error in handler: {e:#}");
                self.observer.record_event(&ObserverEvent::HandlerCompleted {
                    handler: key.to_string(),
                    duration: started.elapsed(),
                    success: false,
                    messages: 0,
                });
                self.observer.record_event(&ObserverEvent::Error {
                    component: "dispatch".into(),
                    message: format!("{key}: {e}"),
                });
                let delivery = self
                    .send_or_report(out, &format!("{FAULT_REPLY_PREFIX}{e}"))
                    .await;
                DispatchOutcome::Failed {
                    handler: key.to_string(),
                    messages: delivery.messages,
                }
            }
        }
    }

    async fn show_help(&self, out: &Responder<'_>) -> DispatchOutcome {
        let delivery = match out.send_chunked(&self.registry.help_text()).await {
            Ok(delivery) => delivery,
            Err(e) => {
                self.report_send_failure(&e);
                Delivery::default()
            }
        };
        self.observer.record_event(&ObserverEvent::HelpShown {
            messages: delivery.messages,
        });
        DispatchOutcome::Help {
            messages: delivery.messages,
        }
    }

    async fn send_or_report(&self, out: &Responder<'_>, text: &str) -> Delivery {
        match out.send(text).await {
            Ok(delivery) => delivery,
            Err(e) => {
                self.report_send_failure(&e);
                Delivery::default()
            }
        }
    }

    fn report_send_failure(&self, e: &anyhow::Error) {
        tracing::error!("Failed to deliver reply: {e:#}");
        self.observer.record_event(&ObserverEvent::Error {
            component: "dispatch".into(),
            message: format!("reply delivery failed: {e}"),
        });
    }
}
