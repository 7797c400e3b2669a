//! Semantic memory: per-user append-only log of interaction summaries,
//! embedded and indexed for nearest-neighbour retrieval.
//!
//! `Embedder` and `MemoryIndex` are the ports; `SemanticMemory` is the
//! service the tools and chat orchestration call.

pub mod box_embedder;
pub mod embedder;
pub mod index;
pub mod service;
