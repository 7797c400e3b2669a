//! MemoryIndex trait: vector storage for memory records.

use cadence_types::error::RepositoryError;
use cadence_types::memory::{MemoryRecord, OwnerScope, ScoredMemory};

/// Append-only vector index over memory records.
///
/// Implementations live in cadence-infra (e.g., `LanceMemoryIndex`).
pub trait MemoryIndex: Send + Sync {
    /// Append a record with its embedding.
    fn add(
        &self,
        record: &MemoryRecord,
        embedding: &[f32],
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Nearest neighbours of `embedding` within `scope`, most similar first.
    fn search(
        &self,
        embedding: &[f32],
        top_k: usize,
        scope: OwnerScope,
    ) -> impl std::future::Future<Output = Result<Vec<ScoredMemory>, RepositoryError>> + Send;

    /// Number of stored records.
    fn count(&self) -> impl std::future::Future<Output = Result<usize, RepositoryError>> + Send;
}
