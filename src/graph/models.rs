//! Property graph records: entities, chunks, relations and triplets
//!
//! These are plain data-transfer types. Stores decide how they are laid out
//! on disk or in the database; the only contract carried here is identity:
//! the same entity (label + name) or the same chunk text always yields the
//! same id, which is what makes upserts idempotent.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Arbitrary key/value properties attached to nodes and relations.
pub type PropertyMap = BTreeMap<String, serde_json::Value>;

/// Namespace for deterministic node ids (UUID v5).
const NODE_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6f, 0x1c, 0x2a, 0x57, 0x93, 0x4e, 0x4b, 0x0d, 0xa4, 0x61, 0x8e, 0x0f, 0x3b, 0x27, 0xc9, 0x15,
]);

/// Default label for entities created without one
pub const DEFAULT_ENTITY_LABEL: &str = "entity";

/// Default label for text chunks
pub const DEFAULT_CHUNK_LABEL: &str = "text_chunk";

/// Relation label linking a chunk to the entities it mentions
pub const MENTIONS: &str = "MENTIONS";

/// Entity property naming the chunk an entity was extracted from
pub const TRIPLET_SOURCE_KEY: &str = "triplet_source_id";

/// Chunk property carrying the source document id
pub const REF_DOC_ID_KEY: &str = "ref_doc_id";

/// Keys owned by the stores; caller properties never overwrite them.
pub const RESERVED_KEYS: [&str; 4] = ["id", "name", "text", "embedding"];

/// Returns true if `key` is written by the store itself
pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

// ============================================================================
// Entity
// ============================================================================

/// A labelled real-world entity (person, place, thing)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityNode {
    pub name: String,
    pub label: String,
    /// Explicit id; only set when it differs from the derived one
    #[serde(default)]
    pub id_: Option<String>,
    #[serde(default)]
    pub properties: PropertyMap,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

impl EntityNode {
    /// Create an entity with the given category label and name.
    ///
    /// An empty label falls back to [`DEFAULT_ENTITY_LABEL`].
    pub fn new(label: impl Into<String>, name: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            name: name.into(),
            label: if label.is_empty() {
                DEFAULT_ENTITY_LABEL.to_string()
            } else {
                label
            },
            id_: None,
            properties: PropertyMap::new(),
            embedding: None,
        }
    }

    /// Pin the id, e.g. for nodes created elsewhere with their own scheme
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id_ = Some(id.into());
        self
    }

    /// Attach an id read back from storage, keeping `id_` empty when the
    /// derived id already matches.
    pub fn with_stored_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.id_ = None;
        if self.id() != id {
            self.id_ = Some(id);
        }
        self
    }

    pub fn with_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_properties(mut self, properties: PropertyMap) -> Self {
        self.properties.extend(properties);
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Explicit id if pinned, otherwise derived from label and name.
    pub fn id(&self) -> String {
        self.id_
            .clone()
            .unwrap_or_else(|| entity_id(&self.label, &self.name))
    }
}

/// Compute the id an entity with this label and name would have
pub fn entity_id(label: &str, name: &str) -> String {
    let key = format!("{}\u{1f}{}", label, name);
    Uuid::new_v5(&NODE_ID_NAMESPACE, key.as_bytes()).to_string()
}

// ============================================================================
// Chunk
// ============================================================================

/// A piece of source text stored alongside entities for provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkNode {
    pub text: String,
    #[serde(default)]
    pub id_: Option<String>,
    pub label: String,
    #[serde(default)]
    pub properties: PropertyMap,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

impl ChunkNode {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            id_: None,
            label: DEFAULT_CHUNK_LABEL.to_string(),
            properties: PropertyMap::new(),
            embedding: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id_ = Some(id.into());
        self
    }

    /// Same as [`EntityNode::with_stored_id`] for chunks
    pub fn with_stored_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.id_ = None;
        if self.id() != id {
            self.id_ = Some(id);
        }
        self
    }

    pub fn with_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_properties(mut self, properties: PropertyMap) -> Self {
        self.properties.extend(properties);
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Explicit id if one was assigned, otherwise a UUID v5 of the text.
    pub fn id(&self) -> String {
        self.id_.clone().unwrap_or_else(|| {
            Uuid::new_v5(&NODE_ID_NAMESPACE, self.text.as_bytes()).to_string()
        })
    }
}

impl fmt::Display for ChunkNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

// ============================================================================
// LabelledNode
// ============================================================================

/// Any node a property graph store can hold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LabelledNode {
    Entity(EntityNode),
    Chunk(ChunkNode),
}

impl LabelledNode {
    pub fn id(&self) -> String {
        match self {
            Self::Entity(e) => e.id(),
            Self::Chunk(c) => c.id(),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Entity(e) => &e.label,
            Self::Chunk(c) => &c.label,
        }
    }

    pub fn properties(&self) -> &PropertyMap {
        match self {
            Self::Entity(e) => &e.properties,
            Self::Chunk(c) => &c.properties,
        }
    }

    pub fn properties_mut(&mut self) -> &mut PropertyMap {
        match self {
            Self::Entity(e) => &mut e.properties,
            Self::Chunk(c) => &mut c.properties,
        }
    }

    pub fn embedding(&self) -> Option<&[f32]> {
        match self {
            Self::Entity(e) => e.embedding.as_deref(),
            Self::Chunk(c) => c.embedding.as_deref(),
        }
    }

    pub fn set_embedding(&mut self, embedding: Option<Vec<f32>>) {
        match self {
            Self::Entity(e) => e.embedding = embedding,
            Self::Chunk(c) => c.embedding = embedding,
        }
    }

    /// Entity name, or `None` for chunks
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Entity(e) => Some(&e.name),
            Self::Chunk(_) => None,
        }
    }

    pub fn as_entity(&self) -> Option<&EntityNode> {
        match self {
            Self::Entity(e) => Some(e),
            Self::Chunk(_) => None,
        }
    }

    pub fn as_chunk(&self) -> Option<&ChunkNode> {
        match self {
            Self::Chunk(c) => Some(c),
            Self::Entity(_) => None,
        }
    }

    /// True if every entry of `filter` is present with an equal value.
    ///
    /// `name` and `text` can be matched as if they were properties.
    pub fn matches_properties(&self, filter: &PropertyMap) -> bool {
        filter.iter().all(|(key, expected)| match key.as_str() {
            "id" => expected.as_str() == Some(self.id().as_str()),
            "name" => self.name().map(serde_json::Value::from).as_ref() == Some(expected),
            "text" => self
                .as_chunk()
                .map(|c| serde_json::Value::from(c.text.as_str()))
                .as_ref()
                == Some(expected),
            _ => self.properties().get(key) == Some(expected),
        })
    }
}

impl From<EntityNode> for LabelledNode {
    fn from(node: EntityNode) -> Self {
        Self::Entity(node)
    }
}

impl From<ChunkNode> for LabelledNode {
    fn from(node: ChunkNode) -> Self {
        Self::Chunk(node)
    }
}

impl fmt::Display for LabelledNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity(e) => write!(f, "{} ({})", e.name, e.label),
            Self::Chunk(c) => {
                let preview: String = c.text.chars().take(40).collect();
                if preview.len() < c.text.len() {
                    write!(f, "{}...", preview)
                } else {
                    write!(f, "{}", preview)
                }
            }
        }
    }
}

// ============================================================================
// Relation / Triplet
// ============================================================================

/// A labelled directed edge between two node ids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub label: String,
    pub source_id: String,
    pub target_id: String,
    #[serde(default)]
    pub properties: PropertyMap,
}

impl Relation {
    pub fn new(
        label: impl Into<String>,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            properties: PropertyMap::new(),
        }
    }

    pub fn with_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_properties(mut self, properties: PropertyMap) -> Self {
        self.properties.extend(properties);
        self
    }

    /// Relations are keyed by (source, label, target)
    pub fn id(&self) -> String {
        format!("{}-{}->{}", self.source_id, self.label, self.target_id)
    }

    /// True if this relation touches `node_id` at either end
    pub fn touches(&self, node_id: &str) -> bool {
        self.source_id == node_id || self.target_id == node_id
    }
}

/// A (source, relation, target) fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Triplet {
    pub source: LabelledNode,
    pub relation: Relation,
    pub target: LabelledNode,
}

impl Triplet {
    pub fn new(source: LabelledNode, relation: Relation, target: LabelledNode) -> Self {
        Self {
            source,
            relation,
            target,
        }
    }
}

impl fmt::Display for Triplet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}) -[{}]-> ({})",
            self.source, self.relation.label, self.target
        )
    }
}

// ============================================================================
// TextNode (document chunk as produced by an ingestion pipeline)
// ============================================================================

/// A document chunk with metadata and a back-reference to its source document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub id_: String,
    pub text: String,
    #[serde(default)]
    pub metadata: PropertyMap,
    #[serde(default)]
    pub ref_doc_id: Option<String>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

impl TextNode {
    /// New text node with a random id
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id_: Uuid::new_v4().to_string(),
            text: text.into(),
            metadata: PropertyMap::new(),
            ref_doc_id: None,
            embedding: None,
        }
    }

    pub fn with_ref_doc_id(mut self, ref_doc_id: impl Into<String>) -> Self {
        self.ref_doc_id = Some(ref_doc_id.into());
        self
    }

    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Rebuild a text node from a stored chunk
    pub fn from_chunk(chunk: &ChunkNode) -> Self {
        let mut metadata = chunk.properties.clone();
        let ref_doc_id = metadata
            .remove(REF_DOC_ID_KEY)
            .and_then(|v| v.as_str().map(str::to_string));
        Self {
            id_: chunk.id(),
            text: chunk.text.clone(),
            metadata,
            ref_doc_id,
            embedding: chunk.embedding.clone(),
        }
    }
}

impl From<&TextNode> for ChunkNode {
    fn from(node: &TextNode) -> Self {
        let mut properties = node.metadata.clone();
        if let Some(ref_doc_id) = &node.ref_doc_id {
            properties.insert(REF_DOC_ID_KEY.to_string(), ref_doc_id.clone().into());
        }
        ChunkNode {
            text: node.text.clone(),
            id_: Some(node.id_.clone()),
            label: DEFAULT_CHUNK_LABEL.to_string(),
            properties,
            embedding: node.embedding.clone(),
        }
    }
}

// ============================================================================
// Vector query / schema
// ============================================================================

/// Similarity search request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorStoreQuery {
    pub query_embedding: Vec<f32>,
    pub similarity_top_k: usize,
    #[serde(default)]
    pub filters: PropertyMap,
}

impl VectorStoreQuery {
    pub fn new(query_embedding: Vec<f32>, similarity_top_k: usize) -> Self {
        Self {
            query_embedding,
            similarity_top_k,
            filters: PropertyMap::new(),
        }
    }

    pub fn with_filter(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }
}

/// A property key and the type names observed for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDef {
    pub property: String,
    pub types: Vec<String>,
}

/// A `(start)-[type]->(end)` pattern present in the graph
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationshipPattern {
    pub start: String,
    pub rel_type: String,
    pub end: String,
}

/// Labels, relation types and their properties
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSchema {
    pub node_props: BTreeMap<String, Vec<PropertyDef>>,
    pub rel_props: BTreeMap<String, Vec<PropertyDef>>,
    pub relationships: Vec<RelationshipPattern>,
}

impl GraphSchema {
    pub fn is_empty(&self) -> bool {
        self.node_props.is_empty() && self.rel_props.is_empty() && self.relationships.is_empty()
    }
}

fn write_props(f: &mut fmt::Formatter<'_>, props: &[PropertyDef]) -> fmt::Result {
    let rendered: Vec<String> = props
        .iter()
        .map(|p| format!("{}: {}", p.property, p.types.join("|")))
        .collect();
    write!(f, "{{{}}}", rendered.join(", "))
}

impl fmt::Display for GraphSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Node properties:")?;
        for (label, props) in &self.node_props {
            write!(f, "{} ", label)?;
            write_props(f, props)?;
            writeln!(f)?;
        }
        writeln!(f, "Relationship properties:")?;
        for (rel_type, props) in &self.rel_props {
            write!(f, "{} ", rel_type)?;
            write_props(f, props)?;
            writeln!(f)?;
        }
        writeln!(f, "The relationships:")?;
        for pattern in &self.relationships {
            writeln!(
                f,
                "(:{})-[:{}]->(:{})",
                pattern.start, pattern.rel_type, pattern.end
            )?;
        }
        Ok(())
    }
}

/// Name of the JSON type of `value`, as reported in schemas
pub fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "NULL",
        serde_json::Value::Bool(_) => "BOOLEAN",
        serde_json::Value::Number(n) if n.is_f64() => "FLOAT",
        serde_json::Value::Number(_) => "INTEGER",
        serde_json::Value::String(_) => "STRING",
        serde_json::Value::Array(_) => "LIST",
        serde_json::Value::Object(_) => "MAP",
    }
}

/// Cosine similarity; zero when either vector has no magnitude
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
