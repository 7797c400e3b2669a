//! Repository trait definitions (ports) for relational persistence.
//!
//! Implementations live in cadence-infra (SQLite via sqlx).

pub mod message;
pub mod playlist;
pub mod user;
