//! Arrow schema definitions for LanceDB vector tables.
//!
//! Each schema includes a 384-dimensional float32 vector field for
//! all-MiniLM-L6-v2 embeddings.
//!
//! Arrow versions MUST match lancedb's transitive dependency (57.3 for lancedb 0.26).

use std::sync::Arc;

use arrow_array::{FixedSizeListArray, Float32Array};
use arrow_schema::{DataType, Field, Schema};

use cadence_types::error::RepositoryError;

/// all-MiniLM-L6-v2 embedding dimension.
pub const EMBEDDING_DIMENSION: i32 = 384;

pub const MEMORY_TABLE: &str = "memories";

pub const KNOWLEDGE_TABLE: &str = "music_knowledge";

fn vector_field() -> Field {
    Field::new(
        "vector",
        DataType::FixedSizeList(
            Arc::new(Field::new("item", DataType::Float32, true)),
            EMBEDDING_DIMENSION,
        ),
        false,
    )
}

/// Schema for the semantic memory table.
///
/// `user_id` is null for records saved outside a user context. The four tag
/// columns are null when the text carries no matching marker.
pub fn memory_schema() -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("text", DataType::Utf8, false),
        Field::new("timestamp", DataType::Utf8, false),
        Field::new("user_id", DataType::Int64, true),
        Field::new("mood", DataType::Utf8, true),
        Field::new("weather", DataType::Utf8, true),
        Field::new("time_period", DataType::Utf8, true),
        Field::new("playlist_recommended", DataType::Utf8, true),
        vector_field(),
    ])
}

/// Schema for the knowledge corpus table. Metadata is stored as a JSON object.
pub fn knowledge_schema() -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("text", DataType::Utf8, false),
        Field::new("metadata", DataType::Utf8, false),
        vector_field(),
    ])
}

/// Build the FixedSizeList vector column from row-major embeddings.
pub fn vector_column(embeddings: &[&[f32]]) -> Result<FixedSizeListArray, RepositoryError> {
    let mut values = Vec::with_capacity(embeddings.len() * EMBEDDING_DIMENSION as usize);
    for embedding in embeddings {
        if embedding.len() != EMBEDDING_DIMENSION as usize {
            return Err(RepositoryError::Embedding(format!(
                "expected {EMBEDDING_DIMENSION} dimensions, got {}",
                embedding.len()
            )));
        }
        values.extend_from_slice(embedding);
    }
    let field = Arc::new(Field::new("item", DataType::Float32, true));
    Ok(FixedSizeListArray::new(
        field,
        EMBEDDING_DIMENSION,
        Arc::new(Float32Array::from(values)),
        None,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_schema_fields() {
        let schema = memory_schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(
            names,
            vec![
                "id",
                "text",
                "timestamp",
                "user_id",
                "mood",
                "weather",
                "time_period",
                "playlist_recommended",
                "vector"
            ]
        );
        assert!(schema.field_with_name("user_id").unwrap().is_nullable());
        assert!(!schema.field_with_name("text").unwrap().is_nullable());
    }

    #[test]
    fn test_vector_field_dimension() {
        let schema = knowledge_schema();
        match schema.field_with_name("vector").unwrap().data_type() {
            DataType::FixedSizeList(item, size) => {
                assert_eq!(*size, EMBEDDING_DIMENSION);
                assert_eq!(item.data_type(), &DataType::Float32);
            }
            other => panic!("unexpected vector type: {other:?}"),
        }
    }

    #[test]
    fn test_vector_column_rejects_wrong_dimension() {
        let short = vec![0.0_f32; 3];
        let err = vector_column(&[short.as_slice()]).unwrap_err();
        assert!(err.to_string().contains("expected 384 dimensions, got 3"));
    }

    #[test]
    fn test_vector_column_rows() {
        let a = vec![0.5_f32; EMBEDDING_DIMENSION as usize];
        let b = vec![0.25_f32; EMBEDDING_DIMENSION as usize];
        let column = vector_column(&[a.as_slice(), b.as_slice()]).unwrap();
        assert_eq!(arrow_array::Array::len(&column), 2);
    }
}
