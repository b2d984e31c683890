//! PropertyGraphStore trait definition
//!
//! Defines the abstract interface shared by every property graph backend.
//! Implemented by `Neo4jPropertyGraphStore` (remote, Cypher-capable) and
//! `SimplePropertyGraphStore` (in-memory, optionally persisted to JSON), so
//! callers hold an `Arc<dyn PropertyGraphStore>` and never care which one.

use super::models::*;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// One row of a structured query result, keyed by column name
pub type QueryRow = serde_json::Map<String, serde_json::Value>;

/// Abstract interface for property graph storage.
#[async_trait]
pub trait PropertyGraphStore: Send + Sync {
    // ========================================================================
    // Capabilities
    // ========================================================================

    /// Whether `structured_query` can run raw queries
    fn supports_structured_queries(&self) -> bool;

    /// Whether `vector_query` is available
    fn supports_vector_queries(&self) -> bool;

    // ========================================================================
    // Reads
    // ========================================================================

    /// Get nodes by id and/or exact property match.
    ///
    /// Both filters are ANDed. With neither, every node is returned.
    /// Unknown ids yield an empty result rather than an error.
    async fn get(
        &self,
        properties: Option<&PropertyMap>,
        ids: Option<&[String]>,
    ) -> Result<Vec<LabelledNode>>;

    /// Get triplets touching the matched entities, in either direction.
    ///
    /// Returns nothing when every filter is `None`.
    async fn get_triplets(
        &self,
        entity_names: Option<&[String]>,
        relation_names: Option<&[String]>,
        properties: Option<&PropertyMap>,
        ids: Option<&[String]>,
    ) -> Result<Vec<Triplet>>;

    /// Walk outwards from `graph_nodes` up to `depth` hops and return the
    /// distinct relations found, at most `limit` of them.
    ///
    /// `MENTIONS` relations are never followed; `ignore_rels` adds more labels
    /// to skip.
    async fn get_rel_map(
        &self,
        graph_nodes: &[LabelledNode],
        depth: usize,
        limit: usize,
        ignore_rels: &[String],
    ) -> Result<Vec<Triplet>>;

    /// Vector similarity search, best match first. Scores are cosine similarity.
    async fn vector_query(&self, query: &VectorStoreQuery)
        -> Result<(Vec<LabelledNode>, Vec<f32>)>;

    /// Labels, relation types and property keys currently in the graph.
    ///
    /// Backends that cache the schema only rebuild it when `refresh` is set.
    async fn get_schema(&self, refresh: bool) -> Result<GraphSchema>;

    // ========================================================================
    // Writes
    // ========================================================================

    /// Insert or merge nodes keyed by id
    async fn upsert_nodes(&self, nodes: &[LabelledNode]) -> Result<()>;

    /// Insert or merge relations keyed by (source, label, target)
    async fn upsert_relations(&self, relations: &[Relation]) -> Result<()>;

    /// Delete by entity name, relation label, node id, or property match.
    ///
    /// Each filter is applied independently. Removing a node also removes
    /// its relations.
    async fn delete(
        &self,
        entity_names: Option<&[String]>,
        relation_names: Option<&[String]>,
        properties: Option<&PropertyMap>,
        ids: Option<&[String]>,
    ) -> Result<()>;

    /// Run a raw query against the backend's query engine
    async fn structured_query(
        &self,
        query: &str,
        params: Option<&HashMap<String, serde_json::Value>>,
    ) -> Result<Vec<QueryRow>>;

    // ========================================================================
    // Provided
    // ========================================================================

    /// Schema rendered as text, suitable for prompting or printing
    async fn get_schema_str(&self, refresh: bool) -> Result<String> {
        Ok(self.get_schema(refresh).await?.to_string())
    }

    /// Store pipeline text nodes as chunks
    async fn upsert_text_nodes(&self, nodes: &[TextNode]) -> Result<()> {
        let chunks: Vec<LabelledNode> = nodes
            .iter()
            .map(|n| LabelledNode::Chunk(ChunkNode::from(n)))
            .collect();
        self.upsert_nodes(&chunks).await
    }

    /// Fetch chunks by id as text nodes; entity ids are skipped
    async fn get_text_nodes(&self, ids: &[String]) -> Result<Vec<TextNode>> {
        let nodes = self.get(None, Some(ids)).await?;
        Ok(nodes
            .iter()
            .filter_map(LabelledNode::as_chunk)
            .map(TextNode::from_chunk)
            .collect())
    }
}
