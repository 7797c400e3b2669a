//! SemanticMemory -- save and recall interaction summaries.
//!
//! Both operations are owner-aware through the request context: a record
//! saved under a user is stamped with that user's id, and retrieval under a
//! user only sees that user's records. Outside a user context everything is
//! global.

use std::fmt::Write as _;
use std::sync::Arc;

use cadence_types::error::RepositoryError;
use cadence_types::memory::{MemoryRecord, OwnerScope, ScoredMemory};

use crate::context;
use crate::memory::box_embedder::BoxEmbedder;
use crate::memory::index::MemoryIndex;

/// Query used when the caller asks for "whatever is there" rather than a topic.
pub const RECENT_QUERY: &str = "contexto previo";

const PREVIEW_CHARS: usize = 50;

pub struct SemanticMemory<I: MemoryIndex> {
    index: Arc<I>,
    embedder: Arc<BoxEmbedder>,
}

impl<I: MemoryIndex> SemanticMemory<I> {
    pub fn new(index: Arc<I>, embedder: Arc<BoxEmbedder>) -> Self {
        Self { index, embedder }
    }

    pub fn index(&self) -> &Arc<I> {
        &self.index
    }

    /// Save `text` under the current user. Never fails; the outcome is
    /// reported in the returned sentence.
    pub async fn save(&self, text: &str) -> String {
        match self.try_save(text).await {
            Ok(record) => {
                tracing::debug!(id = %record.id, user_id = ?record.user_id, "Saved memory");
                let preview: String = text.chars().take(PREVIEW_CHARS).collect();
                format!("Contexto guardado: {preview}...")
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to save memory");
                format!("Error guardando en vector store: {e}")
            }
        }
    }

    pub async fn try_save(&self, text: &str) -> Result<MemoryRecord, RepositoryError> {
        let record = MemoryRecord::new(text, context::current_user_id());
        let embedding = self.embedder.embed_one(&record.text).await?;
        self.index.add(&record, &embedding).await?;
        Ok(record)
    }

    /// Nearest memories to `query` within `scope`, most similar first.
    /// A blank query searches for [`RECENT_QUERY`].
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        scope: OwnerScope,
    ) -> Result<Vec<ScoredMemory>, RepositoryError> {
        let query = normalize_query(query);
        let embedding = self.embedder.embed_one(query).await?;
        let mut hits = self.index.search(&embedding, top_k, scope).await?;
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }

    /// Render the memories closest to `query` for the current owner.
    pub async fn retrieve_similar(&self, query: &str, top_k: usize) -> String {
        let scope = OwnerScope::from(context::current_user_id());
        let query = normalize_query(query);
        match self.search(query, top_k, scope).await {
            Ok(hits) => render_memories(query, &hits),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load memories");
                format!("Error cargando contextos previos: {e}")
            }
        }
    }
}

fn normalize_query(query: &str) -> &str {
    let trimmed = query.trim();
    if trimmed.is_empty() { RECENT_QUERY } else { trimmed }
}

fn render_memories(query: &str, hits: &[ScoredMemory]) -> String {
    if hits.is_empty() {
        return "No hay contextos previos almacenados".to_string();
    }
    let recent = query == RECENT_QUERY;
    let mut out = if recent {
        "Contextos previos:\n".to_string()
    } else {
        format!("Contextos similares a '{query}':\n")
    };
    for (i, hit) in hits.iter().enumerate() {
        let ts = hit.record.timestamp.format("%Y-%m-%dT%H:%M:%S");
        if recent {
            let _ = writeln!(out, "{}. [{ts}] {}", i + 1, hit.record.text);
        } else {
            let _ = writeln!(
                out,
                "{}. [{ts}] {} (similitud: {:.3})",
                i + 1,
                hit.record.text,
                hit.score
            );
        }
    }
    out
}
