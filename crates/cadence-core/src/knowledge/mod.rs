//! Read-only music knowledge corpus with semantic search.
//!
//! `KnowledgeIndex` is the storage port; `KnowledgeBase` owns the one-time
//! load of the corpus into an empty index and renders search results.

use std::fmt::Write as _;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::OnceCell;

use cadence_types::error::RepositoryError;
use cadence_types::knowledge::{KnowledgeRecord, ScoredKnowledge};

use crate::memory::box_embedder::BoxEmbedder;

pub trait KnowledgeIndex: Send + Sync {
    fn count(&self) -> impl Future<Output = Result<usize, RepositoryError>> + Send;

    /// Append `records`; `embeddings[i]` belongs to `records[i]`.
    fn add(
        &self,
        records: &[KnowledgeRecord],
        embeddings: &[Vec<f32>],
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Most similar first.
    fn search(
        &self,
        embedding: &[f32],
        top_k: usize,
    ) -> impl Future<Output = Result<Vec<ScoredKnowledge>, RepositoryError>> + Send;
}

pub struct KnowledgeBase<K: KnowledgeIndex> {
    index: Arc<K>,
    embedder: Arc<BoxEmbedder>,
    loaded: OnceCell<usize>,
}

impl<K: KnowledgeIndex> KnowledgeBase<K> {
    pub fn new(index: Arc<K>, embedder: Arc<BoxEmbedder>) -> Self {
        Self {
            index,
            embedder,
            loaded: OnceCell::new(),
        }
    }

    /// Fill an empty index from `load`, once per process.
    ///
    /// A non-empty index is reused as is and `load` is not called. Returns the
    /// number of records in the index afterwards. A failed load is reported to
    /// the first caller only; the store then stays empty and later calls return
    /// `Ok(0)` without loading again.
    pub async fn ensure_loaded<F, Fut>(&self, load: F) -> Result<usize, RepositoryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Vec<KnowledgeRecord>>,
    {
        let mut failure = None;
        let loaded = *self
            .loaded
            .get_or_init(|| async {
                match self.load_into_index(load).await {
                    Ok(n) => n,
                    Err(e) => {
                        tracing::warn!(error = %e, "Knowledge load failed, store left empty");
                        failure = Some(e);
                        0
                    }
                }
            })
            .await;
        match failure {
            Some(e) => Err(e),
            None => Ok(loaded),
        }
    }

    async fn load_into_index<F, Fut>(&self, load: F) -> Result<usize, RepositoryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Vec<KnowledgeRecord>>,
    {
        let existing = self.index.count().await?;
        if existing > 0 {
            tracing::debug!(records = existing, "Reusing knowledge index");
            return Ok(existing);
        }
        let records = load().await;
        if records.is_empty() {
            tracing::warn!("Knowledge corpus is empty");
            return Ok(0);
        }
        let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;
        self.index.add(&records, &embeddings).await?;
        tracing::info!(records = records.len(), "Loaded knowledge corpus");
        Ok(records.len())
    }

    pub async fn search_records(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredKnowledge>, RepositoryError> {
        let embedding = self.embedder.embed_one(query).await?;
        let mut hits = self.index.search(&embedding, top_k).await?;
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }

    pub async fn search(&self, query: &str, top_k: usize) -> String {
        match self.search_records(query, top_k).await {
            Ok(hits) if hits.is_empty() => {
                "No se encontró información relevante en la base de conocimiento".to_string()
            }
            Ok(hits) => render_knowledge(&hits),
            Err(e) => {
                tracing::warn!(error = %e, "Knowledge search failed");
                format!("Error buscando en base de conocimiento: {e}")
            }
        }
    }
}

fn render_knowledge(hits: &[ScoredKnowledge]) -> String {
    let mut out = "Conocimiento musical relevante:\n".to_string();
    for (i, hit) in hits.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, hit.record.text);
        if let Some(genre) = hit.record.genre() {
            let _ = writeln!(out, "   Género: {genre}");
        }
        if let Some(activity) = hit.record.activity() {
            let _ = writeln!(out, "   Actividad: {activity}");
        }
        out.push('\n');
    }
    out
}
