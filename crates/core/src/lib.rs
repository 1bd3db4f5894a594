//! Shared domain types for the sendhooks outcome recorder.
//!
//! - [`hook`] — the persisted [`HookRecord`](hook::HookRecord) and the
//!   decoder that turns raw stream payloads into records.
//! - [`error`] — [`CoreError`](error::CoreError), the domain error surfaced
//!   to the HTTP layer.
//! - [`types`] — common type aliases.

pub mod error;
pub mod hook;
pub mod types;
