//! Embedding generation module
//!
//! Vectors attached to entities and chunks so stores can answer
//! `vector_query`. Same shape as the store layer (trait + impl):
//! - `EmbeddingProvider` trait: async interface for embedding generation
//! - `HashEmbeddingProvider`: local feature-hashing embedder, no model server

pub mod hash;
pub mod traits;

pub use hash::HashEmbeddingProvider;
pub use traits::EmbeddingProvider;
