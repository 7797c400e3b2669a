//! LanceDB-backed semantic memory index.
//!
//! Implements `MemoryIndex` from `cadence-core`. All memories live in one
//! `memories` table; owner scoping is a `user_id = N` prefilter on the
//! vector search, so `top_k` always counts records of the requested owner.
//!
//! The table handle is opened lazily through an [`IndexSlot`] the first time
//! any operation needs it and is reused afterwards. [`LanceMemoryIndex::reset`]
//! drops it so the next operation reopens, possibly from another directory.

use std::path::PathBuf;
use std::sync::Arc;

use arrow_array::{Array, Float32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray};
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use tracing::debug;
use uuid::Uuid;

use cadence_core::index_slot::IndexSlot;
use cadence_core::memory::index::MemoryIndex;
use cadence_types::error::RepositoryError;
use cadence_types::memory::{MemoryRecord, MemoryTags, OwnerScope, ScoredMemory};
use cadence_types::user::UserId;

use super::lance::open_table;
use super::schema::{MEMORY_TABLE, memory_schema, vector_column};
use super::{column, optional_string};

pub struct LanceMemoryIndex {
    slot: IndexSlot<lancedb::Table>,
}

impl LanceMemoryIndex {
    /// Nothing is opened until the first operation.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            slot: IndexSlot::new(dir),
        }
    }

    /// Drop the cached table handle. With `Some(dir)` later operations use `dir`.
    pub async fn reset(&self, dir: Option<PathBuf>) {
        self.slot.reset(dir).await;
    }

    pub async fn dir(&self) -> PathBuf {
        self.slot.dir().await
    }

    async fn table(&self) -> Result<Arc<lancedb::Table>, RepositoryError> {
        self.slot
            .get_or_try_init(|dir| async move {
                debug!(dir = %dir.display(), "Opening memory index");
                open_table(&dir, MEMORY_TABLE, Arc::new(memory_schema())).await
            })
            .await
    }

    fn build_record_batch(
        record: &MemoryRecord,
        embedding: &[f32],
    ) -> Result<RecordBatch, RepositoryError> {
        let schema = Arc::new(memory_schema());
        let tags = &record.tags;

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec![record.id.to_string()])),
                Arc::new(StringArray::from(vec![record.text.clone()])),
                Arc::new(StringArray::from(vec![record.timestamp.to_rfc3339()])),
                Arc::new(Int64Array::from(vec![record.user_id.map(|u| u.0)])),
                Arc::new(StringArray::from(vec![tags.mood.clone()])),
                Arc::new(StringArray::from(vec![tags.weather.clone()])),
                Arc::new(StringArray::from(vec![tags.time_period.clone()])),
                Arc::new(StringArray::from(vec![tags.playlist_recommended.clone()])),
                Arc::new(vector_column(&[embedding])?),
            ],
        )
        .map_err(|e| RepositoryError::Query(format!("Failed to build record batch: {e}")))
    }

    fn batch_to_scored(batch: &RecordBatch) -> Result<Vec<ScoredMemory>, RepositoryError> {
        let ids = column::<StringArray>(batch, "id")?;
        let texts = column::<StringArray>(batch, "text")?;
        let timestamps = column::<StringArray>(batch, "timestamp")?;
        let users = column::<Int64Array>(batch, "user_id")?;
        let moods = column::<StringArray>(batch, "mood")?;
        let weathers = column::<StringArray>(batch, "weather")?;
        let periods = column::<StringArray>(batch, "time_period")?;
        let playlists = column::<StringArray>(batch, "playlist_recommended")?;
        let distances = batch
            .column_by_name("_distance")
            .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

        let mut scored = Vec::with_capacity(batch.num_rows());
        for i in 0..batch.num_rows() {
            let timestamp = DateTime::parse_from_rfc3339(timestamps.value(i))
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| RepositoryError::Query(format!("invalid timestamp: {e}")))?;
            let user_id = if users.is_null(i) {
                None
            } else {
                Some(UserId(users.value(i)))
            };
            let distance = distances.map_or(0.0, |d| d.value(i));

            scored.push(ScoredMemory {
                record: MemoryRecord {
                    id: Uuid::parse_str(ids.value(i)).unwrap_or_else(|_| Uuid::nil()),
                    text: texts.value(i).to_string(),
                    timestamp,
                    user_id,
                    tags: MemoryTags {
                        mood: optional_string(moods, i),
                        weather: optional_string(weathers, i),
                        time_period: optional_string(periods, i),
                        playlist_recommended: optional_string(playlists, i),
                    },
                },
                score: 1.0 - distance,
            });
        }
        Ok(scored)
    }
}

impl MemoryIndex for LanceMemoryIndex {
    async fn add(&self, record: &MemoryRecord, embedding: &[f32]) -> Result<(), RepositoryError> {
        let table = self.table().await?;
        let batch = Self::build_record_batch(record, embedding)?;
        let schema = batch.schema();

        table
            .add(RecordBatchIterator::new(vec![Ok(batch)], schema))
            .execute()
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to add memory: {e}")))?;

        Ok(())
    }

    async fn search(
        &self,
        embedding: &[f32],
        top_k: usize,
        scope: OwnerScope,
    ) -> Result<Vec<ScoredMemory>, RepositoryError> {
        if top_k == 0 || self.count().await? == 0 {
            return Ok(Vec::new());
        }
        let table = self.table().await?;

        let mut query = table
            .vector_search(embedding)
            .map_err(|e| RepositoryError::Query(format!("Vector search setup failed: {e}")))?
            .distance_type(lancedb::DistanceType::Cosine)
            .limit(top_k);
        if let OwnerScope::User(user) = scope {
            query = query.only_if(format!("user_id = {}", user.0));
        }

        let batches: Vec<RecordBatch> = query
            .execute()
            .await
            .map_err(|e| RepositoryError::Query(format!("Vector search failed: {e}")))?
            .try_collect()
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to collect results: {e}")))?;

        let mut scored = Vec::new();
        for batch in &batches {
            scored.extend(Self::batch_to_scored(batch)?);
        }
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn count(&self) -> Result<usize, RepositoryError> {
        let table = self.table().await?;
        table
            .count_rows(None)
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to count rows: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::schema::EMBEDDING_DIMENSION;

    /// Deterministic unit vector; nearby seeds give similar vectors.
    fn make_embedding(seed: f32) -> Vec<f32> {
        let mut vec = vec![0.0_f32; EMBEDDING_DIMENSION as usize];
        for (i, val) in vec.iter_mut().enumerate() {
            *val = ((i as f32 + seed) * 0.01).sin();
        }
        let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        for val in vec.iter_mut() {
            *val /= norm;
        }
        vec
    }

    fn setup() -> (LanceMemoryIndex, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let index = LanceMemoryIndex::new(temp_dir.path().join("memory_index"));
        (index, temp_dir)
    }

    #[tokio::test]
    async fn test_add_and_count() {
        let (index, _tmp) = setup();
        assert_eq!(index.count().await.unwrap(), 0);

        let record = MemoryRecord::new("Mood: feliz, Playlist: Focus Flow", Some(UserId(1)));
        index.add(&record, &make_embedding(1.0)).await.unwrap();
        index
            .add(&MemoryRecord::new("sin dueño", None), &make_embedding(2.0))
            .await
            .unwrap();

        assert_eq!(index.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_search_roundtrips_fields_and_scores() {
        let (index, _tmp) = setup();
        let record = MemoryRecord::new(
            "Mood: feliz, Clima: soleado, Hora: mañana, Playlist: Focus Flow",
            Some(UserId(1)),
        );
        index.add(&record, &make_embedding(1.0)).await.unwrap();
        index
            .add(&MemoryRecord::new("otra cosa", Some(UserId(1))), &make_embedding(500.0))
            .await
            .unwrap();

        let results = index
            .search(&make_embedding(1.0), 2, OwnerScope::User(UserId(1)))
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        let best = &results[0];
        assert_eq!(best.record.id, record.id);
        assert_eq!(best.record.tags, record.tags);
        assert_eq!(best.record.user_id, Some(UserId(1)));
        assert_eq!(best.record.timestamp.timestamp(), record.timestamp.timestamp());
        assert!(best.score > 0.99, "score {}", best.score);
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn test_owner_scope_filters_before_limit() {
        let (index, _tmp) = setup();
        index
            .add(&MemoryRecord::new("de user 2", Some(UserId(2))), &make_embedding(1.0))
            .await
            .unwrap();
        index
            .add(&MemoryRecord::new("de user 1", Some(UserId(1))), &make_embedding(300.0))
            .await
            .unwrap();
        index
            .add(&MemoryRecord::new("global", None), &make_embedding(1.5))
            .await
            .unwrap();

        let mine = index
            .search(&make_embedding(1.0), 1, OwnerScope::User(UserId(1)))
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].record.text, "de user 1");

        let nobody = index
            .search(&make_embedding(1.0), 5, OwnerScope::User(UserId(3)))
            .await
            .unwrap();
        assert!(nobody.is_empty());

        let all = index
            .search(&make_embedding(1.0), 5, OwnerScope::Global)
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].record.text, "de user 2");
    }

    #[tokio::test]
    async fn test_search_empty_index() {
        let (index, _tmp) = setup();
        let results = index
            .search(&make_embedding(0.0), 10, OwnerScope::Global)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_records_persist_across_reopen() {
        let (index, tmp) = setup();
        index
            .add(&MemoryRecord::new("persistente", Some(UserId(1))), &make_embedding(1.0))
            .await
            .unwrap();
        drop(index);

        let reopened = LanceMemoryIndex::new(tmp.path().join("memory_index"));
        assert_eq!(reopened.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reset_switches_directory() {
        let (index, tmp) = setup();
        index
            .add(&MemoryRecord::new("primero", None), &make_embedding(1.0))
            .await
            .unwrap();

        let other = tmp.path().join("case_2");
        index.reset(Some(other.clone())).await;
        assert_eq!(index.dir().await, other);
        assert_eq!(index.count().await.unwrap(), 0);
        assert!(other.is_dir());
    }

    #[tokio::test]
    async fn test_wrong_dimension_is_rejected() {
        let (index, _tmp) = setup();
        let err = index
            .add(&MemoryRecord::new("x", None), &[1.0, 0.0])
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Embedding(_)));
        assert_eq!(index.count().await.unwrap(), 0);
    }
}
