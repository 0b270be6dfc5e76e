#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::assigning_clones,
    clippy::bool_to_int_with_if,
    clippy::case_sensitive_file_extension_comparisons,
    clippy::cast_possible_wrap,
    clippy::doc_markdown,
    clippy::field_reassign_with_default,
    clippy::float_cmp,
    clippy::implicit_clone,
    clippy::items_after_statements,
    clippy::map_unwrap_or,
    clippy::manual_let_else,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::needless_pass_by_value,
    clippy::needless_raw_string_hashes,
    clippy::redundant_closure_for_method_calls,
    clippy::return_self_not_must_use,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::struct_field_names,
    clippy::too_many_lines,
    clippy::uninlined_format_args,
    clippy::unnecessary_cast,
    clippy::unnecessary_lazy_evaluations,
    clippy::unnecessary_literal_bound,
    clippy::unnecessary_map_or,
    clippy::unused_self,
    clippy::cast_precision_loss,
    clippy::unnecessary_wraps,
    dead_code
)]

//! Telegram remote-administration relay.
//!
//! Inbound chat messages pass a [`security::Gate`], then a
//! [`dispatch::Dispatcher`] asks each registered [`handlers::Handler`] in
//! order whether it can service the command. Handlers run external programs
//! through the [`executor`] and reply through the [`chunker`], so output of
//! any size reaches the sender in transport-sized pieces.

pub mod channels;
pub mod chunker;
pub mod config;
pub mod dispatch;
pub mod executor;
pub mod handlers;
pub mod observability;
pub mod security;
pub mod util;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Config;
pub use dispatch::{DispatchOutcome, Dispatcher};
