//! Gate trait for sender authorisation.
//!
//! A [`Gate`] is consulted once per inbound message, before any handler sees
//! the command. It is a pure predicate over the sender's identity.

use crate::channels::traits::SenderIdentity;

/// Authorisation predicate evaluated before dispatch.
///
/// Implementations must be `Send + Sync` because the gate is shared with the
/// dispatcher across tasks. Rejections should be logged by the implementation
/// with the reason, so the audit trail says why a sender was refused.
pub trait Gate: Send + Sync {
    /// `true` when the sender may issue commands.
    fn is_authorised(&self, sender: &SenderIdentity) -> bool;

    /// Return the human-readable name of this gate, for logs and `doctor`.
    fn name(&self) -> &str;
}

/// Gate that admits every sender.
///
/// Only for local channels (stdin, one-shot `exec`) where the operator is
/// already on the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenGate;

impl Gate for OpenGate {
    fn is_authorised(&self, _sender: &SenderIdentity) -> bool {
        true
    }

    fn name(&self) -> &str {
        "open"
    }
}
