//! Business logic and port definitions for Cadence.
//!
//! This crate defines the traits (chat model, embedder, indices,
//! repositories, environment provider) that cadence-infra implements, plus
//! everything that runs on top of them: request context propagation, usage
//! accounting, the memory and knowledge services, the tool surface, the
//! tool-calling agent and chat orchestration. It depends only on
//! `cadence-types`, never on `cadence-infra` or any database/IO crate.

pub mod agent;
pub mod chat;
pub mod context;
pub mod environment;
pub mod index_slot;
pub mod knowledge;
pub mod llm;
pub mod memory;
pub mod repository;
pub mod tools;
pub mod usage;

#[cfg(test)]
mod testing;
