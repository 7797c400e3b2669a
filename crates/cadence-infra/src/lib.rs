//! Infrastructure layer for Cadence.
//!
//! Contains implementations of the ports defined in `cadence-core`: LanceDB
//! memory and knowledge indices, the fastembed embedder, SQLite repositories,
//! the Gemini chat model, the HTTP environment provider and the config loader.

pub mod config;
pub mod environment;
pub mod llm;
pub mod sqlite;
pub mod token;
pub mod vector;
