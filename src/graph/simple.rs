//! In-memory implementation of PropertyGraphStore.
//!
//! Holds nodes and relations in `tokio::sync::RwLock`-guarded maps and can
//! snapshot itself to a JSON file. It has no query engine, so
//! `structured_query` is unsupported; everything else mirrors the Neo4j
//! store's semantics and is what the test suite runs against.

use super::models::*;
use super::traits::{PropertyGraphStore, QueryRow};
use crate::error::StoreError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;
use tokio::sync::RwLock;

/// Nodes keyed by id, relations keyed by `Relation::id()`
#[derive(Debug, Default)]
struct GraphData {
    nodes: BTreeMap<String, LabelledNode>,
    relations: BTreeMap<String, Relation>,
}

impl GraphData {
    fn triplet(&self, relation: &Relation) -> Option<Triplet> {
        let source = self.nodes.get(&relation.source_id)?;
        let target = self.nodes.get(&relation.target_id)?;
        Some(Triplet::new(source.clone(), relation.clone(), target.clone()))
    }

    fn remove_node(&mut self, id: &str) {
        if self.nodes.remove(id).is_some() {
            self.relations.retain(|_, r| !r.touches(id));
        }
    }

    fn upsert_node(&mut self, node: &LabelledNode) {
        let id = node.id();
        match self.nodes.get_mut(&id) {
            Some(existing) => merge_node(existing, node),
            None => {
                self.nodes.insert(id, node.clone());
            }
        }
    }

    fn upsert_relation(&mut self, relation: &Relation) {
        for endpoint in [&relation.source_id, &relation.target_id] {
            if !self.nodes.contains_key(endpoint) {
                let bare = EntityNode::new(DEFAULT_ENTITY_LABEL, endpoint.as_str())
                    .with_id(endpoint.as_str());
                self.nodes.insert(endpoint.clone(), bare.into());
            }
        }
        self.relations
            .entry(relation.id())
            .and_modify(|r| r.properties.extend(relation.properties.clone()))
            .or_insert_with(|| relation.clone());
    }
}

/// Merge `incoming` into `existing`: properties are combined with incoming
/// values winning, and a missing embedding keeps the stored one.
fn merge_node(existing: &mut LabelledNode, incoming: &LabelledNode) {
    let mut properties = std::mem::take(existing.properties_mut());
    properties.extend(incoming.properties().clone());
    let embedding = incoming
        .embedding()
        .or_else(|| existing.embedding())
        .map(<[f32]>::to_vec);

    *existing = incoming.clone();
    *existing.properties_mut() = properties;
    existing.set_embedding(embedding);
}

fn any_id_in(relation: &Relation, ids: &HashSet<&str>) -> bool {
    ids.contains(relation.source_id.as_str()) || ids.contains(relation.target_id.as_str())
}

/// On-disk form written by [`SimplePropertyGraphStore::persist`]
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    persisted_at: DateTime<Utc>,
    nodes: Vec<LabelledNode>,
    relations: Vec<Relation>,
}

/// In-memory property graph store
#[derive(Debug, Default)]
pub struct SimplePropertyGraphStore {
    data: RwLock<GraphData>,
}

impl SimplePropertyGraphStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from a snapshot written by [`persist`](Self::persist)
    pub async fn from_persist_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Snapshot(format!("{}: {}", path.display(), e)))?;

        let mut data = GraphData::default();
        for node in &snapshot.nodes {
            data.nodes.insert(node.id(), node.clone());
        }
        for relation in snapshot.relations {
            data.relations.insert(relation.id(), relation);
        }

        tracing::info!(
            "Loaded {} nodes and {} relations from {} (persisted {})",
            data.nodes.len(),
            data.relations.len(),
            path.display(),
            snapshot.persisted_at.to_rfc3339()
        );

        Ok(Self {
            data: RwLock::new(data),
        })
    }

    /// Write the current contents to `path` as JSON.
    ///
    /// The snapshot goes to a sibling temp file first and is renamed into
    /// place, so readers never see a half-written file.
    pub async fn persist(&self, path: &Path) -> Result<()> {
        let snapshot = {
            let data = self.data.read().await;
            Snapshot {
                persisted_at: Utc::now(),
                nodes: data.nodes.values().cloned().collect(),
                relations: data.relations.values().cloned().collect(),
            }
        };
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .with_context(|| format!("Failed to move snapshot into {}", path.display()))?;

        tracing::debug!(
            "Persisted {} nodes and {} relations to {}",
            snapshot.nodes.len(),
            snapshot.relations.len(),
            path.display()
        );
        Ok(())
    }

    pub async fn node_count(&self) -> usize {
        self.data.read().await.nodes.len()
    }

    pub async fn relation_count(&self) -> usize {
        self.data.read().await.relations.len()
    }
}

#[async_trait]
impl PropertyGraphStore for SimplePropertyGraphStore {
    fn supports_structured_queries(&self) -> bool {
        false
    }

    fn supports_vector_queries(&self) -> bool {
        true
    }

    async fn get(
        &self,
        properties: Option<&PropertyMap>,
        ids: Option<&[String]>,
    ) -> Result<Vec<LabelledNode>> {
        let data = self.data.read().await;

        let candidates: Vec<&LabelledNode> = match ids {
            // Keep the caller's order, without duplicates
            Some(ids) => {
                let mut seen = HashSet::new();
                ids.iter()
                    .filter(|id| seen.insert(id.as_str()))
                    .filter_map(|id| data.nodes.get(id))
                    .collect()
            }
            None => data.nodes.values().collect(),
        };

        Ok(candidates
            .into_iter()
            .filter(|n| properties.map_or(true, |p| n.matches_properties(p)))
            .cloned()
            .collect())
    }

    async fn get_triplets(
        &self,
        entity_names: Option<&[String]>,
        relation_names: Option<&[String]>,
        properties: Option<&PropertyMap>,
        ids: Option<&[String]>,
    ) -> Result<Vec<Triplet>> {
        if entity_names.is_none()
            && relation_names.is_none()
            && properties.is_none()
            && ids.is_none()
        {
            return Ok(Vec::new());
        }

        let data = self.data.read().await;
        let names: Option<HashSet<&str>> =
            entity_names.map(|n| n.iter().map(String::as_str).collect());
        let rels: Option<HashSet<&str>> =
            relation_names.map(|n| n.iter().map(String::as_str).collect());
        let ids: Option<HashSet<&str>> = ids.map(|n| n.iter().map(String::as_str).collect());

        let entity_matches = |node: &LabelledNode| -> bool {
            let Some(entity) = node.as_entity() else {
                return false;
            };
            names
                .as_ref()
                .map_or(true, |n| n.contains(entity.name.as_str()))
                && ids.as_ref().map_or(true, |i| i.contains(node.id().as_str()))
                && properties.map_or(true, |p| node.matches_properties(p))
        };

        Ok(data
            .relations
            .values()
            .filter(|r| rels.as_ref().map_or(true, |l| l.contains(r.label.as_str())))
            .filter_map(|r| data.triplet(r))
            .filter(|t| t.source.as_entity().is_some() && t.target.as_entity().is_some())
            .filter(|t| entity_matches(&t.source) || entity_matches(&t.target))
            .collect())
    }

    async fn get_rel_map(
        &self,
        graph_nodes: &[LabelledNode],
        depth: usize,
        limit: usize,
        ignore_rels: &[String],
    ) -> Result<Vec<Triplet>> {
        let data = self.data.read().await;

        let mut ignored: HashSet<&str> = ignore_rels.iter().map(String::as_str).collect();
        ignored.insert(MENTIONS);

        let mut adjacency: HashMap<&str, Vec<&Relation>> = HashMap::new();
        for relation in data.relations.values() {
            if ignored.contains(relation.label.as_str()) {
                continue;
            }
            adjacency
                .entry(relation.source_id.as_str())
                .or_default()
                .push(relation);
            if relation.target_id != relation.source_id {
                adjacency
                    .entry(relation.target_id.as_str())
                    .or_default()
                    .push(relation);
            }
        }

        let mut seen_relations = HashSet::new();
        let mut triplets = Vec::new();

        'starts: for start in graph_nodes {
            let start_id = start.id();
            if !data.nodes.contains_key(&start_id) {
                continue;
            }

            let mut visited: HashSet<String> = HashSet::from([start_id.clone()]);
            let mut frontier = vec![start_id];

            for _ in 0..depth {
                let mut next = Vec::new();
                for node_id in &frontier {
                    let Some(edges) = adjacency.get(node_id.as_str()) else {
                        continue;
                    };
                    for relation in edges {
                        if triplets.len() >= limit {
                            break 'starts;
                        }
                        if seen_relations.insert(relation.id()) {
                            if let Some(triplet) = data.triplet(relation) {
                                triplets.push(triplet);
                            }
                        }
                        let other = if relation.source_id == *node_id {
                            &relation.target_id
                        } else {
                            &relation.source_id
                        };
                        if visited.insert(other.clone()) {
                            next.push(other.clone());
                        }
                    }
                }
                if next.is_empty() {
                    break;
                }
                frontier = next;
            }
        }

        Ok(triplets)
    }

    async fn vector_query(
        &self,
        query: &VectorStoreQuery,
    ) -> Result<(Vec<LabelledNode>, Vec<f32>)> {
        let data = self.data.read().await;

        let mut scored = Vec::new();
        for node in data.nodes.values() {
            let Some(embedding) = node.embedding() else {
                continue;
            };
            if !node.matches_properties(&query.filters) {
                continue;
            }
            // Vectors from another model can't be compared; skip them
            if embedding.len() != query.query_embedding.len() {
                continue;
            }
            scored.push((
                cosine_similarity(&query.query_embedding, embedding),
                node,
            ));
        }

        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(query.similarity_top_k);

        Ok(scored
            .into_iter()
            .map(|(score, node)| (node.clone(), score))
            .unzip())
    }

    async fn get_schema(&self, _refresh: bool) -> Result<GraphSchema> {
        let data = self.data.read().await;

        let mut node_props: BTreeMap<String, BTreeMap<String, BTreeSet<String>>> = BTreeMap::new();
        for node in data.nodes.values() {
            let props = node_props.entry(node.label().to_string()).or_default();
            let intrinsic = match node {
                LabelledNode::Entity(_) => "name",
                LabelledNode::Chunk(_) => "text",
            };
            props
                .entry(intrinsic.to_string())
                .or_default()
                .insert("STRING".to_string());
            for (key, value) in node.properties() {
                props
                    .entry(key.clone())
                    .or_default()
                    .insert(json_type_name(value).to_string());
            }
        }

        let mut rel_props: BTreeMap<String, BTreeMap<String, BTreeSet<String>>> = BTreeMap::new();
        let mut relationships = BTreeSet::new();
        for relation in data.relations.values() {
            let props = rel_props.entry(relation.label.clone()).or_default();
            for (key, value) in &relation.properties {
                props
                    .entry(key.clone())
                    .or_default()
                    .insert(json_type_name(value).to_string());
            }
            if let Some(t) = data.triplet(relation) {
                relationships.insert(RelationshipPattern {
                    start: t.source.label().to_string(),
                    rel_type: relation.label.clone(),
                    end: t.target.label().to_string(),
                });
            }
        }

        fn flatten(
            map: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
        ) -> BTreeMap<String, Vec<PropertyDef>> {
            map.into_iter()
                .map(|(label, props)| {
                    let defs = props
                        .into_iter()
                        .map(|(property, types)| PropertyDef {
                            property,
                            types: types.into_iter().collect(),
                        })
                        .collect();
                    (label, defs)
                })
                .collect()
        }

        Ok(GraphSchema {
            node_props: flatten(node_props),
            rel_props: flatten(rel_props),
            relationships: relationships.into_iter().collect(),
        })
    }

    async fn upsert_nodes(&self, nodes: &[LabelledNode]) -> Result<()> {
        let mut data = self.data.write().await;
        for node in nodes {
            data.upsert_node(node);
        }

        // Provenance links from chunks to the entities extracted from them
        for node in nodes {
            let Some(source) = node
                .as_entity()
                .and_then(|e| e.properties.get(TRIPLET_SOURCE_KEY))
                .and_then(|v| v.as_str())
            else {
                continue;
            };
            if data.nodes.contains_key(source) {
                data.upsert_relation(&Relation::new(MENTIONS, source, node.id()));
            }
        }
        Ok(())
    }

    async fn upsert_relations(&self, relations: &[Relation]) -> Result<()> {
        let mut data = self.data.write().await;
        for relation in relations {
            data.upsert_relation(relation);
        }
        Ok(())
    }

    async fn delete(
        &self,
        entity_names: Option<&[String]>,
        relation_names: Option<&[String]>,
        properties: Option<&PropertyMap>,
        ids: Option<&[String]>,
    ) -> Result<()> {
        let mut data = self.data.write().await;

        if let Some(names) = entity_names {
            let names: HashSet<&str> = names.iter().map(String::as_str).collect();
            let doomed: Vec<String> = data
                .nodes
                .iter()
                .filter(|(_, n)| n.name().is_some_and(|name| names.contains(name)))
                .map(|(id, _)| id.clone())
                .collect();
            for id in doomed {
                data.remove_node(&id);
            }
        }

        if let Some(labels) = relation_names {
            let labels: HashSet<&str> = labels.iter().map(String::as_str).collect();
            data.relations
                .retain(|_, r| !labels.contains(r.label.as_str()));
        }

        if let Some(ids) = ids {
            let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
            data.nodes.retain(|id, _| !ids.contains(id.as_str()));
            data.relations.retain(|_, r| !any_id_in(r, &ids));
        }

        if let Some(properties) = properties.filter(|p| !p.is_empty()) {
            let doomed: Vec<String> = data
                .nodes
                .iter()
                .filter(|(_, n)| n.matches_properties(properties))
                .map(|(id, _)| id.clone())
                .collect();
            for id in doomed {
                data.remove_node(&id);
            }
            data.relations.retain(|_, r| {
                !properties
                    .iter()
                    .all(|(key, value)| r.properties.get(key) == Some(value))
            });
        }

        Ok(())
    }

    async fn structured_query(
        &self,
        _query: &str,
        _params: Option<&HashMap<String, serde_json::Value>>,
    ) -> Result<Vec<QueryRow>> {
        Err(StoreError::Unsupported {
            store: "SimplePropertyGraphStore",
            operation: "structured queries",
        }
        .into())
    }
}
