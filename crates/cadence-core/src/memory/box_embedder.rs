//! BoxEmbedder -- type-erased [`Embedder`] shared by the memory and
//! knowledge services.

use futures_util::FutureExt;
use futures_util::future::BoxFuture;

use cadence_types::error::RepositoryError;

use super::embedder::Embedder;

type EmbedFuture<'a> = BoxFuture<'a, Result<Vec<Vec<f32>>, RepositoryError>>;

/// Object-safe mirror of [`Embedder`].
trait ErasedEmbedder: Send + Sync {
    fn embed_erased<'a>(&'a self, texts: &'a [String]) -> EmbedFuture<'a>;
    fn name(&self) -> &str;
    fn dims(&self) -> usize;
}

impl<T: Embedder> ErasedEmbedder for T {
    fn embed_erased<'a>(&'a self, texts: &'a [String]) -> EmbedFuture<'a> {
        self.embed(texts).boxed()
    }

    fn name(&self) -> &str {
        self.model_name()
    }

    fn dims(&self) -> usize {
        self.dimension()
    }
}

pub struct BoxEmbedder {
    inner: Box<dyn ErasedEmbedder>,
}

impl BoxEmbedder {
    pub fn new<T: Embedder + 'static>(embedder: T) -> Self {
        Self {
            inner: Box::new(embedder),
        }
    }

    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RepositoryError> {
        self.inner.embed_erased(texts).await
    }

    /// Embed a single text.
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, RepositoryError> {
        let texts = [text.to_string()];
        let mut vectors = self.inner.embed_erased(&texts).await?;
        vectors
            .pop()
            .ok_or_else(|| RepositoryError::Embedding("embedder returned no vector".to_string()))
    }

    pub fn model_name(&self) -> &str {
        self.inner.name()
    }

    pub fn dimension(&self) -> usize {
        self.inner.dims()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::BagOfWordsEmbedder;

    #[tokio::test]
    async fn test_embed_one_returns_single_vector() {
        let embedder = BoxEmbedder::new(BagOfWordsEmbedder);
        let v = embedder.embed_one("focus flow").await.unwrap();
        assert_eq!(v.len(), embedder.dimension());
    }
}
