//! Feature-hashing embedding provider
//!
//! Each lowercase word token is hashed into one of `dimensions` buckets with
//! a hash-derived sign, the buckets are summed and the result L2-normalized.
//! Texts sharing words land close together under cosine similarity, which is
//! enough to drive `vector_query` without a model server:
//! - Same text → same embedding
//! - Overlapping vocabulary → positive similarity
//! - Empty or punctuation-only text → zero vector

use super::traits::EmbeddingProvider;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Deterministic bag-of-words embedder.
///
/// # Example
///
/// ```rust
/// use property_graph_store::embeddings::{EmbeddingProvider, HashEmbeddingProvider};
///
/// # tokio_test::block_on(async {
/// let provider = HashEmbeddingProvider::new(64);
/// let a = provider.embed_text("Logan lives in Canada").await.unwrap();
/// let b = provider.embed_text("logan lives in canada!").await.unwrap();
/// assert_eq!(a, b);
/// # });
/// ```
#[derive(Clone, Debug)]
pub struct HashEmbeddingProvider {
    dimensions: usize,
}

impl HashEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let hash = hasher.finish();

            let bucket = (hash % self.dimensions as u64) as usize;
            // Top bit picks the sign so collisions tend to cancel out
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            embedding[bucket] += sign;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        }
        embedding
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "feature-hash"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::cosine_similarity;

    #[tokio::test]
    async fn test_case_and_punctuation_insensitive() {
        let provider = HashEmbeddingProvider::new(64);
        let a = provider.embed_text("Hello, World").await.unwrap();
        let b = provider.embed_text("hello world").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_shared_words_are_closer() {
        let provider = HashEmbeddingProvider::new(256);
        let query = provider.embed_text("Logan").await.unwrap();
        let logan = provider.embed_text("Logan PERSON").await.unwrap();
        let canada = provider.embed_text("Canada LOCATION").await.unwrap();

        assert!(cosine_similarity(&query, &logan) > cosine_similarity(&query, &canada));
    }

    #[tokio::test]
    async fn test_l2_normalized() {
        let provider = HashEmbeddingProvider::new(32);
        let emb = provider.embed_text("normalize me please").await.unwrap();
        let norm: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "got norm = {}", norm);
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let provider = HashEmbeddingProvider::new(16);
        let emb = provider.embed_text("  ...  ").await.unwrap();
        assert_eq!(emb.len(), 16);
        assert!(emb.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn test_batch_matches_single() {
        let provider = HashEmbeddingProvider::new(64);
        let texts = vec!["alpha".to_string(), "beta gamma".to_string()];
        let batch = provider.embed_batch(&texts).await.unwrap();
        for (i, text) in texts.iter().enumerate() {
            assert_eq!(batch[i], provider.embed_text(text).await.unwrap());
        }
    }

    #[test]
    fn test_zero_dimensions_clamped() {
        assert_eq!(HashEmbeddingProvider::new(0).dimensions(), 1);
    }
}
