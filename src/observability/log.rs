use super::traits::{Observer, ObserverEvent, ObserverMetric};
use std::any::Any;
use tracing::{info, warn};

/// Log-based observer: one structured tracing line per event.
pub struct LogObserver;

impl LogObserver {
    pub fn new() -> Self {
        Self
    }
}

fn millis(d: std::time::Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl Observer for LogObserver {
    fn record_event(&self, event: &ObserverEvent) {
        match event {
            ObserverEvent::ChannelMessage { channel, direction } => {
                info!(channel = %channel, direction = %direction, "channel.message");
            }
            ObserverEvent::AuthRejected {
                channel,
                sender_id,
                username,
            } => {
                warn!(
                    channel = %channel,
                    sender_id = sender_id,
                    username = ?username,
                    "auth.rejected"
                );
            }
            ObserverEvent::HandlerMatched { handler } => {
                info!(handler = %handler, "handler.matched");
            }
            ObserverEvent::HandlerCompleted {
                handler,
                duration,
                success,
                messages,
            } => {
                info!(
                    handler = %handler,
                    duration_ms = millis(*duration),
                    success = success,
                    messages = messages,
                    "handler.completed"
                );
            }
            ObserverEvent::HelpShown { messages } => {
                info!(messages = messages, "dispatch.help");
            }
            ObserverEvent::HandlerLoadFailed { handler, error } => {
                warn!(handler = %handler, error = %error, "handler.load_failed");
            }
            ObserverEvent::Error { component, message } => {
                info!(component = %component, error = %message, "error");
            }
        }
    }

    fn record_metric(&self, metric: &ObserverMetric) {
        match metric {
            ObserverMetric::DispatchLatency(d) => {
                info!(latency_ms = millis(*d), "metric.dispatch_latency");
            }
            ObserverMetric::MessagesSent(n) => {
                info!(messages = n, "metric.messages_sent");
            }
        }
    }

    fn name(&self) -> &str {
        "log"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
