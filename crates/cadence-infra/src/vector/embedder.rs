//! FastEmbed-based local embedding generator.
//!
//! Implements the `Embedder` trait from `cadence-core` using fastembed's
//! all-MiniLM-L6-v2 model (384 dimensions) with ONNX runtime inference.
//! Inference is CPU-bound, so every call runs on the blocking pool.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::info;

use cadence_core::context::spawn_blocking_scoped;
use cadence_core::memory::embedder::Embedder;
use cadence_types::error::RepositoryError;

use super::schema::EMBEDDING_DIMENSION;

pub const EMBEDDING_MODEL_NAME: &str = "all-MiniLM-L6-v2";

pub struct FastEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
}

impl FastEmbedder {
    /// Load the model, downloading it into `cache_dir` on first use.
    pub async fn load(cache_dir: PathBuf) -> Result<Self, RepositoryError> {
        let model = tokio::task::spawn_blocking(move || {
            TextEmbedding::try_new(
                InitOptions::new(EmbeddingModel::AllMiniLML6V2)
                    .with_cache_dir(cache_dir)
                    .with_show_download_progress(false),
            )
        })
        .await
        .map_err(|e| RepositoryError::Embedding(format!("model load task failed: {e}")))?
        .map_err(|e| RepositoryError::Embedding(format!("failed to load embedding model: {e}")))?;

        info!(model = EMBEDDING_MODEL_NAME, "Embedding model loaded");
        Ok(Self {
            model: Arc::new(Mutex::new(model)),
        })
    }
}

impl Embedder for FastEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RepositoryError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();

        spawn_blocking_scoped(move || {
            let mut model = model
                .lock()
                .map_err(|_| RepositoryError::Embedding("embedding model lock poisoned".to_string()))?;
            model
                .embed(texts, None)
                .map_err(|e| RepositoryError::Embedding(e.to_string()))
        })
        .await
        .map_err(|e| RepositoryError::Embedding(format!("embedding task failed: {e}")))?
    }

    fn model_name(&self) -> &str {
        EMBEDDING_MODEL_NAME
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIMENSION as usize
    }
}
