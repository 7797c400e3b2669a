//! LanceDB-backed knowledge corpus index and the JSON corpus loader.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::{Array, Float32Array, RecordBatch, RecordBatchIterator, StringArray};
use futures_util::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use tracing::{debug, warn};

use cadence_core::index_slot::IndexSlot;
use cadence_core::knowledge::KnowledgeIndex;
use cadence_types::error::RepositoryError;
use cadence_types::knowledge::{KnowledgeRecord, KnowledgeSourceItem, ScoredKnowledge};

use super::column;
use super::lance::open_table;
use super::schema::{KNOWLEDGE_TABLE, knowledge_schema, vector_column};

pub struct LanceKnowledgeIndex {
    slot: IndexSlot<lancedb::Table>,
}

impl LanceKnowledgeIndex {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            slot: IndexSlot::new(dir),
        }
    }

    async fn table(&self) -> Result<Arc<lancedb::Table>, RepositoryError> {
        self.slot
            .get_or_try_init(|dir| async move {
                debug!(dir = %dir.display(), "Opening knowledge index");
                open_table(&dir, KNOWLEDGE_TABLE, Arc::new(knowledge_schema())).await
            })
            .await
    }

    fn build_record_batch(
        records: &[KnowledgeRecord],
        embeddings: &[Vec<f32>],
    ) -> Result<RecordBatch, RepositoryError> {
        let metadata = records
            .iter()
            .map(|r| serde_json::to_string(&r.metadata))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| RepositoryError::Query(format!("Failed to encode metadata: {e}")))?;
        let vectors: Vec<&[f32]> = embeddings.iter().map(Vec::as_slice).collect();

        RecordBatch::try_new(
            Arc::new(knowledge_schema()),
            vec![
                Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.id.as_str()))),
                Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.text.as_str()))),
                Arc::new(StringArray::from(metadata)),
                Arc::new(vector_column(&vectors)?),
            ],
        )
        .map_err(|e| RepositoryError::Query(format!("Failed to build record batch: {e}")))
    }

    fn batch_to_scored(batch: &RecordBatch) -> Result<Vec<ScoredKnowledge>, RepositoryError> {
        let ids = column::<StringArray>(batch, "id")?;
        let texts = column::<StringArray>(batch, "text")?;
        let metadata = column::<StringArray>(batch, "metadata")?;
        let distances = batch
            .column_by_name("_distance")
            .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

        let mut scored = Vec::with_capacity(batch.num_rows());
        for i in 0..batch.num_rows() {
            let meta: BTreeMap<String, String> = if metadata.is_null(i) {
                BTreeMap::new()
            } else {
                serde_json::from_str(metadata.value(i)).unwrap_or_default()
            };
            scored.push(ScoredKnowledge {
                record: KnowledgeRecord {
                    id: ids.value(i).to_string(),
                    text: texts.value(i).to_string(),
                    metadata: meta,
                },
                score: 1.0 - distances.map_or(0.0, |d| d.value(i)),
            });
        }
        Ok(scored)
    }
}

impl KnowledgeIndex for LanceKnowledgeIndex {
    async fn count(&self) -> Result<usize, RepositoryError> {
        let table = self.table().await?;
        table
            .count_rows(None)
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to count rows: {e}")))
    }

    async fn add(
        &self,
        records: &[KnowledgeRecord],
        embeddings: &[Vec<f32>],
    ) -> Result<(), RepositoryError> {
        if records.len() != embeddings.len() {
            return Err(RepositoryError::Embedding(format!(
                "{} records but {} embeddings",
                records.len(),
                embeddings.len()
            )));
        }
        if records.is_empty() {
            return Ok(());
        }

        let table = self.table().await?;
        let batch = Self::build_record_batch(records, embeddings)?;
        let schema = batch.schema();
        table
            .add(RecordBatchIterator::new(vec![Ok(batch)], schema))
            .execute()
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to add knowledge: {e}")))?;
        Ok(())
    }

    async fn search(
        &self,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredKnowledge>, RepositoryError> {
        if top_k == 0 || self.count().await? == 0 {
            return Ok(Vec::new());
        }
        let table = self.table().await?;

        let batches: Vec<RecordBatch> = table
            .vector_search(embedding)
            .map_err(|e| RepositoryError::Query(format!("Vector search setup failed: {e}")))?
            .distance_type(lancedb::DistanceType::Cosine)
            .limit(top_k)
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
}

/// Read the JSON corpus at `path`.
///
/// A missing or malformed file is logged and yields an empty corpus; the
/// knowledge store then serves no results instead of failing startup.
pub async fn load_knowledge_source(path: &Path) -> Vec<KnowledgeRecord> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Knowledge source not readable");
            return Vec::new();
        }
    };
    match serde_json::from_str::<Vec<KnowledgeSourceItem>>(&raw) {
        Ok(items) => items.into_iter().map(KnowledgeRecord::from).collect(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Knowledge source is not a valid corpus");
            Vec::new()
        }
    }
}
