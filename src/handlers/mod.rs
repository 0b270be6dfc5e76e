//! Command handlers and the registry that orders them.
//!
//! Each handler owns a slice of the command space: a predicate
//! ([`Handler::can_handle`]), an action that replies through a
//! [`Responder`], and one line (or block) of help. The [`HandlerRegistry`]
//! holds them in registration order, which is also dispatch priority.
//!
//! # Extension
//!
//! Add a module implementing [`Handler`], then register a constructor in
//! [`registry::default_factories`]. Its position in that list decides which
//! handler wins when two predicates overlap.

pub mod registry;
pub mod restart;
pub mod table;
pub mod traits;
pub mod url_fetch;

pub use registry::{HandlerContext, HandlerFactory, HandlerRegistry, default_factories};
pub use restart::RestartHandler;
pub use table::CommandTableHandler;
pub use traits::{Delivery, Handler, HandlerError, Responder};
pub use url_fetch::UrlFetchHandler;
