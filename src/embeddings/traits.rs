//! EmbeddingProvider trait definition
//!
//! Same pattern as `PropertyGraphStore`: async trait + Send + Sync so it can
//! be shared as `Arc<dyn EmbeddingProvider>`.

use anyhow::Result;
use async_trait::async_trait;

/// Abstract interface for generating vector embeddings from text.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate a vector embedding for a single text input.
    ///
    /// Returns a vector of `f32` with length equal to [`dimensions()`](Self::dimensions).
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for several texts, one per input, in order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// The dimensionality of the vectors produced by this provider.
    ///
    /// Must match the `embedding_dimensions` the Neo4j vector index was
    /// created with.
    fn dimensions(&self) -> usize;

    /// The name of the embedding model being used.
    fn model_name(&self) -> &str;
}
