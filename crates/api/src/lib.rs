//! Sendhooks API server library.
//!
//! Exposes configuration, state, error handling, and routes so integration
//! tests and the binary entrypoint build the exact same application.

pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
pub mod routes;
pub mod service;
pub mod state;

/// Path prefix the hook routes are mounted under.
pub const API_PREFIX: &str = "/api/sendhooks/v1";
