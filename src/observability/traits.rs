use std::time::Duration;

/// Discrete events emitted by the relay for observability.
///
/// Events carry identities and outcomes only, never command output, so
/// backends can forward them without leaking what ran on the host.
#[derive(Debug, Clone)]
pub enum ObserverEvent {
    /// A message was sent or received through a channel.
    ChannelMessage {
        /// Channel name (e.g., `"telegram"`, `"cli"`).
        channel: String,
        /// `"inbound"` or `"outbound"`.
        direction: String,
    },
    /// A sender failed the gate. Recorded for audit.
    AuthRejected {
        channel: String,
        sender_id: i64,
        username: Option<String>,
    },
    /// A handler's predicate accepted the command.
    HandlerMatched { handler: String },
    /// A handler finished executing.
    HandlerCompleted {
        handler: String,
        duration: Duration,
        success: bool,
        /// Messages the handler reported as delivered.
        messages: usize,
    },
    /// No handler matched; aggregated help was sent.
    HelpShown { messages: usize },
    /// A handler factory failed while building the registry.
    HandlerLoadFailed { handler: String, error: String },
    /// An error occurred in a named component.
    Error {
        /// Subsystem where the error originated (e.g., `"dispatch"`, `"telegram"`).
        component: String,
        /// Human-readable error description. Must not contain secrets or tokens.
        message: String,
    },
}

/// Numeric metrics emitted by the relay.
#[derive(Debug, Clone)]
pub enum ObserverMetric {
    /// Wall time of one dispatch cycle, gate to last reply.
    DispatchLatency(Duration),
    /// Outbound messages produced by one dispatch cycle.
    MessagesSent(u64),
}

/// Core observability trait for recording relay telemetry.
///
/// The dispatcher and registry builder receive an `Arc<dyn Observer>` at
/// construction and call [`record_event`](Observer::record_event) and
/// [`record_metric`](Observer::record_metric) at key points of a dispatch
/// cycle.
pub trait Observer: Send + Sync + 'static {
    /// Record a discrete event. Called on the hot path; must not block.
    fn record_event(&self, event: &ObserverEvent);

    /// Record a numeric metric sample.
    fn record_metric(&self, metric: &ObserverMetric);

    /// Flush any buffered telemetry. Called during graceful shutdown.
    fn flush(&self) {}

    /// Return the human-readable name of this observer backend.
    fn name(&self) -> &str;

    /// Downcast to `Any` for backend-specific operations.
    fn as_any(&self) -> &dyn std::any::Any;
}
