//! `PropertyGraphStore` implementation for `Neo4jPropertyGraphStore`.
//!
//! Every method simply delegates to the corresponding inherent method on `Neo4jPropertyGraphStore`.

use async_trait::async_trait;
use std::collections::HashMap;

use super::client::Neo4jPropertyGraphStore;
use crate::graph::{
    GraphSchema, LabelledNode, PropertyGraphStore, PropertyMap, QueryRow, Relation, Triplet,
    VectorStoreQuery,
};

#[async_trait]
impl PropertyGraphStore for Neo4jPropertyGraphStore {
    fn supports_structured_queries(&self) -> bool {
        true
    }

    fn supports_vector_queries(&self) -> bool {
        true
    }

    // ========================================================================
    // Reads
    // ========================================================================

    async fn get(
        &self,
        properties: Option<&PropertyMap>,
        ids: Option<&[String]>,
    ) -> anyhow::Result<Vec<LabelledNode>> {
        self.get(properties, ids).await
    }

    async fn get_triplets(
        &self,
        entity_names: Option<&[String]>,
        relation_names: Option<&[String]>,
        properties: Option<&PropertyMap>,
        ids: Option<&[String]>,
    ) -> anyhow::Result<Vec<Triplet>> {
        self.get_triplets(entity_names, relation_names, properties, ids)
            .await
    }

    async fn get_rel_map(
        &self,
        graph_nodes: &[LabelledNode],
        depth: usize,
        limit: usize,
        ignore_rels: &[String],
    ) -> anyhow::Result<Vec<Triplet>> {
        self.get_rel_map(graph_nodes, depth, limit, ignore_rels)
            .await
    }

    async fn vector_query(
        &self,
        query: &VectorStoreQuery,
    ) -> anyhow::Result<(Vec<LabelledNode>, Vec<f32>)> {
        self.vector_query(query).await
    }

    async fn get_schema(&self, refresh: bool) -> anyhow::Result<GraphSchema> {
        self.get_schema(refresh).await
    }

    // ========================================================================
    // Writes
    // ========================================================================

    async fn upsert_nodes(&self, nodes: &[LabelledNode]) -> anyhow::Result<()> {
        self.upsert_nodes(nodes).await
    }

    async fn upsert_relations(&self, relations: &[Relation]) -> anyhow::Result<()> {
        self.upsert_relations(relations).await
    }

    async fn delete(
        &self,
        entity_names: Option<&[String]>,
        relation_names: Option<&[String]>,
        properties: Option<&PropertyMap>,
        ids: Option<&[String]>,
    ) -> anyhow::Result<()> {
        self.delete(entity_names, relation_names, properties, ids)
            .await
    }

    async fn structured_query(
        &self,
        query: &str,
        params: Option<&HashMap<String, serde_json::Value>>,
    ) -> anyhow::Result<Vec<QueryRow>> {
        self.structured_query(query, params).await
    }
}
