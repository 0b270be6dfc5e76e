//! Sender authorisation.
//!
//! Every inbound message passes a [`Gate`] before the dispatcher consults any
//! handler. [`AllowlistGate`] is the production gate for chat transports;
//! [`OpenGate`] is for local use where the operator already has a shell.
//!
//! The relay does not sandbox the commands it runs. Handlers map fixed names
//! to fixed argument vectors, so the gate is the only line of defence.

pub mod gate;
pub mod traits;

pub use gate::{AllowlistGate, FORBIDDEN_REPLY};
pub use traits::{Gate, OpenGate};
