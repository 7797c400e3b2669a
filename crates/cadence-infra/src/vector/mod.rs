//! Vector database infrastructure for memory and knowledge embeddings.
//!
//! Provides LanceDB connection management, the memory and knowledge indices
//! built on it, and fastembed-based local embedding generation. Arrow schemas
//! define the table structures.

pub mod embedder;
pub mod knowledge;
pub mod lance;
pub mod memory;
pub mod schema;

use arrow_array::{Array, RecordBatch, StringArray};

use cadence_types::error::RepositoryError;

/// Downcast a named column of a result batch.
pub(crate) fn column<'a, T: Array + 'static>(
    batch: &'a RecordBatch,
    name: &str,
) -> Result<&'a T, RepositoryError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| RepositoryError::Query(format!("missing or mistyped column '{name}'")))
}

pub(crate) fn optional_string(col: &StringArray, row: usize) -> Option<String> {
    if col.is_null(row) {
        None
    } else {
        Some(col.value(row).to_string())
    }
}
