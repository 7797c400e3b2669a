//! HTTP/REST API layer for Cadence.
//!
//! Axum router with bearer-token authentication and a JSON error envelope.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod router;
