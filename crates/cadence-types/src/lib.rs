//! Shared domain types for Cadence.
//!
//! This crate contains only data types, enums, and error definitions.
//! It has no IO and no async runtime dependency.

pub mod config;
pub mod environment;
pub mod error;
pub mod knowledge;
pub mod llm;
pub mod memory;
pub mod message;
pub mod playlist;
pub mod usage;
pub mod user;
