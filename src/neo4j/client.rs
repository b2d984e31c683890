//! Neo4j client implementing the property graph store
//!
//! Graph layout:
//! - entities: `(:__Node__:__Entity__:<label> {id, name, embedding, ...props})`
//! - chunks: `(:__Node__:Chunk:<label> {id, text, embedding, ...props})`
//! - relations: `(source)-[:<label> {...props}]->(target)`
//!
//! Every node carries `__Node__` so lookups by id hit a single uniqueness
//! constraint regardless of kind.

use super::cypher::*;
use crate::graph::*;
use anyhow::{Context, Result};
use neo4rs::{query, BoltType, ConfigBuilder, Graph, Query, Row};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Label shared by every node the store writes
pub const NODE_LABEL: &str = "__Node__";
/// Label marking entities
pub const ENTITY_LABEL: &str = "__Entity__";
/// Label marking text chunks
pub const CHUNK_LABEL: &str = "Chunk";

const INTERNAL_LABELS: [&str; 3] = [NODE_LABEL, ENTITY_LABEL, CHUNK_LABEL];

/// Lists longer than this are stripped from sanitized query output
const MAX_LIST_OUTPUT: usize = 128;

/// Cap on relationships sampled when discovering schema patterns
const SCHEMA_PATTERN_SAMPLE: i64 = 1000;

/// Connection and behaviour settings for [`Neo4jPropertyGraphStore`]
#[derive(Debug, Clone, PartialEq)]
pub struct Neo4jSettings {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Use `apoc.meta.data()` for schema discovery
    pub use_apoc: bool,
    pub fetch_size: usize,
    pub max_connections: usize,
    /// Create a vector index over entity embeddings with this many dimensions
    pub embedding_dimensions: Option<usize>,
    /// Strip long lists (embeddings) from structured query results
    pub sanitize_query_output: bool,
}

impl Default for Neo4jSettings {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".into(),
            user: "neo4j".into(),
            password: "llamaindex".into(),
            database: "neo4j".into(),
            use_apoc: false,
            fetch_size: 200,
            max_connections: 16,
            embedding_dimensions: None,
            sanitize_query_output: true,
        }
    }
}

/// Property graph store backed by Neo4j
pub struct Neo4jPropertyGraphStore {
    graph: Arc<Graph>,
    settings: Neo4jSettings,
    schema: RwLock<Option<GraphSchema>>,
}

impl Neo4jPropertyGraphStore {
    /// Connect to Neo4j and make sure constraints and indexes exist
    pub async fn connect(settings: &Neo4jSettings) -> Result<Self> {
        let config = ConfigBuilder::default()
            .uri(settings.uri.as_str())
            .user(settings.user.as_str())
            .password(settings.password.as_str())
            .db(settings.database.as_str())
            .fetch_size(settings.fetch_size)
            .max_connections(settings.max_connections)
            .build()
            .context("Invalid Neo4j configuration")?;

        let graph = Graph::connect(config)
            .await
            .with_context(|| format!("Failed to connect to Neo4j at {}", settings.uri))?;

        let store = Self {
            graph: Arc::new(graph),
            settings: settings.clone(),
            schema: RwLock::new(None),
        };

        store.init_schema().await?;
        tracing::info!(
            "Connected to Neo4j at {} (database {})",
            settings.uri,
            settings.database
        );

        Ok(store)
    }

    pub fn settings(&self) -> &Neo4jSettings {
        &self.settings
    }

    /// Initialize the graph schema with constraints and indexes
    async fn init_schema(&self) -> Result<()> {
        let statements = vec![
            "CREATE CONSTRAINT node_id IF NOT EXISTS FOR (n:__Node__) REQUIRE n.id IS UNIQUE"
                .to_string(),
            "CREATE INDEX entity_name IF NOT EXISTS FOR (e:__Entity__) ON (e.name)".to_string(),
            "CREATE INDEX chunk_id IF NOT EXISTS FOR (c:Chunk) ON (c.id)".to_string(),
        ];

        for statement in statements {
            if let Err(e) = self.graph.run(query(&statement)).await {
                tracing::warn!("Constraint or index may already exist: {}", e);
            }
        }

        // Vector indexes require Neo4j 5.13+; skip quietly on older servers
        if let Some(dimensions) = self.settings.embedding_dimensions {
            let statement = format!(
                r#"CREATE VECTOR INDEX entity_embeddings IF NOT EXISTS
                   FOR (e:__Entity__) ON (e.embedding)
                   OPTIONS {{indexConfig: {{
                       `vector.dimensions`: {},
                       `vector.similarity_function`: 'cosine'
                   }}}}"#,
                dimensions
            );
            if let Err(e) = self.graph.run(query(&statement)).await {
                tracing::warn!(
                    "Vector index creation skipped (Neo4j may not support vector indexes): {}",
                    e
                );
            }
        }

        Ok(())
    }

    /// Execute a parameterized Cypher query and collect every row
    pub(crate) async fn execute_with_params(&self, q: Query) -> Result<Vec<Row>> {
        let mut result = self.graph.execute(q).await?;
        let mut rows = Vec::new();
        while let Some(row) = result.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Execute a raw Cypher query and collect every row
    pub(crate) async fn execute(&self, cypher: &str) -> Result<Vec<Row>> {
        self.execute_with_params(query(cypher)).await
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Get nodes by id and/or property match
    pub async fn get(
        &self,
        properties: Option<&PropertyMap>,
        ids: Option<&[String]>,
    ) -> Result<Vec<LabelledNode>> {
        let mut wb = WhereBuilder::new();
        wb.add_id_filter("n", ids)
            .add_property_filters("n", properties);

        let cypher = format!(
            r#"
            MATCH (n:__Node__)
            {}
            RETURN n.id AS id, labels(n) AS labels, properties(n) AS props
            ORDER BY n.id
            "#,
            wb.build()
        );
        tracing::debug!("get: {}", cypher.trim());

        let rows = self.execute_with_params(wb.apply(query(&cypher))).await?;
        let mut nodes = rows
            .iter()
            .map(|row| node_from_row(row, ""))
            .collect::<Result<Vec<_>>>()?;

        if let Some(ids) = ids {
            let position: HashMap<&str, usize> = ids
                .iter()
                .enumerate()
                .rev()
                .map(|(i, id)| (id.as_str(), i))
                .collect();
            nodes.sort_by_key(|n| position.get(n.id().as_str()).copied().unwrap_or(usize::MAX));
        }

        Ok(nodes)
    }

    /// Get entity-to-entity triplets touching the matched entities
    pub async fn get_triplets(
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

        let mut wb = WhereBuilder::new();
        wb.add_name_filter("e", entity_names)
            .add_id_filter("e", ids)
            .add_property_filters("e", properties)
            .add_type_filter("r", relation_names);

        let cypher = format!(
            r#"
            MATCH (e:__Entity__)-[r]-(:__Entity__)
            {}
            WITH DISTINCT r
            WITH startNode(r) AS s, r, endNode(r) AS t
            RETURN {}
            ORDER BY s.id, type(r), t.id
            "#,
            wb.build(),
            TRIPLET_COLUMNS
        );
        tracing::debug!("get_triplets: {}", cypher.trim());

        let rows = self.execute_with_params(wb.apply(query(&cypher))).await?;
        rows.iter().map(triplet_from_row).collect()
    }

    /// Undirected traversal from `graph_nodes` up to `depth` hops
    pub async fn get_rel_map(
        &self,
        graph_nodes: &[LabelledNode],
        depth: usize,
        limit: usize,
        ignore_rels: &[String],
    ) -> Result<Vec<Triplet>> {
        if graph_nodes.is_empty() || depth == 0 || limit == 0 {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = graph_nodes.iter().map(LabelledNode::id).collect();
        let mut ignored: Vec<String> = ignore_rels.to_vec();
        if !ignored.iter().any(|l| l == MENTIONS) {
            ignored.push(MENTIONS.to_string());
        }

        // Path length cannot be a parameter
        let cypher = format!(
            r#"
            UNWIND range(0, size($ids) - 1) AS idx
            MATCH (e:__Node__ {{id: $ids[idx]}})
            MATCH p = (e)-[*1..{}]-(:__Node__)
            WHERE ALL(rel IN relationships(p) WHERE NOT type(rel) IN $ignored)
            UNWIND relationships(p) AS r
            WITH r, min(idx) AS idx
            ORDER BY idx
            LIMIT $limit
            WITH startNode(r) AS s, r, endNode(r) AS t
            RETURN {}
            "#,
            depth, TRIPLET_COLUMNS
        );
        tracing::debug!("get_rel_map: {}", cypher.trim());

        let q = query(&cypher)
            .param("ids", bolt_strings(&ids))
            .param("ignored", bolt_strings(&ignored))
            .param("limit", limit as i64);

        let rows = self.execute_with_params(q).await?;
        rows.iter().map(triplet_from_row).collect()
    }

    /// Cosine similarity search over nodes carrying an embedding
    pub async fn vector_query(
        &self,
        request: &VectorStoreQuery,
    ) -> Result<(Vec<LabelledNode>, Vec<f32>)> {
        let mut wb = WhereBuilder::new();
        wb.add_condition("n.embedding IS NOT NULL")
            .add_condition("size(n.embedding) = $dimensions")
            .add_property_filters("n", Some(&request.filters));

        let cypher = format!(
            r#"
            MATCH (n:__Node__)
            {}
            WITH n, vector.similarity.cosine(n.embedding, $embedding) AS score
            ORDER BY score DESC
            LIMIT $top_k
            RETURN n.id AS id, labels(n) AS labels, properties(n) AS props
            "#,
            wb.build()
        );

        let q = wb
            .apply(query(&cypher))
            .param("dimensions", request.query_embedding.len() as i64)
            .param("embedding", bolt_embedding(&request.query_embedding))
            .param("top_k", request.similarity_top_k as i64);

        let rows = self.execute_with_params(q).await?;
        let mut nodes = Vec::with_capacity(rows.len());
        let mut scores = Vec::with_capacity(rows.len());
        for row in &rows {
            let node = node_from_row(row, "")?;
            // Report plain cosine rather than Neo4j's [0, 1] rescaling
            let score = node
                .embedding()
                .map(|e| cosine_similarity(&request.query_embedding, e))
                .unwrap_or_default();
            nodes.push(node);
            scores.push(score);
        }
        Ok((nodes, scores))
    }

    /// Schema of the graph, cached until `refresh` is requested
    pub async fn get_schema(&self, refresh: bool) -> Result<GraphSchema> {
        if !refresh {
            if let Some(schema) = self.schema.read().await.as_ref() {
                return Ok(schema.clone());
            }
        }

        let schema = if self.settings.use_apoc {
            self.refresh_schema_apoc().await?
        } else {
            self.refresh_schema_builtin().await?
        };
        *self.schema.write().await = Some(schema.clone());
        Ok(schema)
    }

    async fn refresh_schema_apoc(&self) -> Result<GraphSchema> {
        let node_rows = self
            .execute(
                r#"
                CALL apoc.meta.data()
                YIELD label, other, elementType, type, property
                WHERE NOT type = "RELATIONSHIP" AND elementType = "node"
                RETURN label, property, type
                "#,
            )
            .await
            .context("apoc.meta.data() failed; is the APOC plugin installed?")?;

        let rel_rows = self
            .execute(
                r#"
                CALL apoc.meta.data()
                YIELD label, other, elementType, type, property
                WHERE NOT type = "RELATIONSHIP" AND elementType = "relationship"
                RETURN label, property, type
                "#,
            )
            .await?;

        let pattern_rows = self
            .execute(
                r#"
                CALL apoc.meta.data()
                YIELD label, other, elementType, type, property
                WHERE type = "RELATIONSHIP" AND elementType = "node"
                UNWIND other AS other_node
                RETURN label AS start, property AS rel_type, other_node AS end
                "#,
            )
            .await?;

        let mut builder = SchemaBuilder::default();
        for row in &node_rows {
            let label: String = row.get("label")?;
            let property: String = row.get("property")?;
            let kind: String = row.get("type")?;
            builder.node_property(&label, &property, kind);
        }
        for row in &rel_rows {
            let label: String = row.get("label")?;
            let property: String = row.get("property")?;
            let kind: String = row.get("type")?;
            builder.rel_property(&label, &property, kind);
        }
        for row in &pattern_rows {
            builder.pattern(row.get("start")?, row.get("rel_type")?, row.get("end")?);
        }
        Ok(builder.build())
    }

    async fn refresh_schema_builtin(&self) -> Result<GraphSchema> {
        let node_rows = self
            .execute(
                r#"
                CALL db.schema.nodeTypeProperties()
                YIELD nodeLabels, propertyName, propertyTypes
                UNWIND nodeLabels AS label
                RETURN label, propertyName AS property, propertyTypes AS types
                "#,
            )
            .await?;

        let rel_rows = self
            .execute(
                r#"
                CALL db.schema.relTypeProperties()
                YIELD relType, propertyName, propertyTypes
                RETURN relType AS rel_type, propertyName AS property, propertyTypes AS types
                "#,
            )
            .await?;

        let internal: Vec<String> = INTERNAL_LABELS.iter().map(|l| l.to_string()).collect();
        let pattern_query = query(
            r#"
            MATCH (s:__Node__)-[r]->(t:__Node__)
            WITH s, r, t LIMIT $sample
            UNWIND [l IN labels(s) WHERE NOT l IN $internal] AS start
            UNWIND [l IN labels(t) WHERE NOT l IN $internal] AS end
            RETURN DISTINCT start, type(r) AS rel_type, end
            "#,
        )
        .param("sample", SCHEMA_PATTERN_SAMPLE)
        .param("internal", bolt_strings(&internal));
        let pattern_rows = self.execute_with_params(pattern_query).await?;

        let mut builder = SchemaBuilder::default();
        for row in &node_rows {
            let label: String = row.get("label")?;
            // Labels without properties come back with a null property name
            let Ok(property) = row.get::<String>("property") else {
                continue;
            };
            for kind in row.get::<Vec<String>>("types").unwrap_or_default() {
                builder.node_property(&label, &property, kind);
            }
        }
        for row in &rel_rows {
            let rel_type: String = row.get("rel_type")?;
            let Ok(property) = row.get::<String>("property") else {
                continue;
            };
            for kind in row.get::<Vec<String>>("types").unwrap_or_default() {
                builder.rel_property(strip_rel_type(&rel_type), &property, kind);
            }
        }
        for row in &pattern_rows {
            builder.pattern(row.get("start")?, row.get("rel_type")?, row.get("end")?);
        }
        Ok(builder.build())
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Insert or merge nodes, batched per kind and label
    pub async fn upsert_nodes(&self, nodes: &[LabelledNode]) -> Result<()> {
        let mut entities: BTreeMap<&str, Vec<BoltType>> = BTreeMap::new();
        let mut chunks: BTreeMap<&str, Vec<BoltType>> = BTreeMap::new();
        let mut mentions: Vec<BoltType> = Vec::new();

        for node in nodes {
            let embedding = node
                .embedding()
                .map(bolt_embedding)
                .unwrap_or(BoltType::Null(neo4rs::BoltNull));
            match node {
                LabelledNode::Entity(e) => {
                    entities.entry(e.label.as_str()).or_default().push(bolt_map([
                        ("id", e.id().into()),
                        ("name", e.name.clone().into()),
                        ("properties", bolt_properties(&e.properties)),
                        ("embedding", embedding),
                    ]));
                    if let Some(source) = e
                        .properties
                        .get(TRIPLET_SOURCE_KEY)
                        .and_then(|v| v.as_str())
                    {
                        mentions.push(bolt_map([
                            ("id", e.id().into()),
                            ("source_id", source.into()),
                        ]));
                    }
                }
                LabelledNode::Chunk(c) => {
                    chunks.entry(c.label.as_str()).or_default().push(bolt_map([
                        ("id", c.id().into()),
                        ("text", c.text.clone().into()),
                        ("properties", bolt_properties(&c.properties)),
                        ("embedding", embedding),
                    ]));
                }
            }
        }

        // Chunks first so provenance links below can find them
        for (label, rows) in chunks {
            let cypher = chunk_upsert_cypher(label)?;
            let count = rows.len();
            self.graph
                .run(query(&cypher).param("rows", bolt_list(rows)))
                .await
                .with_context(|| format!("Failed to upsert {} chunk(s) labelled {}", count, label))?;
            tracing::debug!("Upserted {} chunk(s) labelled {}", count, label);
        }

        for (label, rows) in entities {
            let cypher = format!(
                r#"
                UNWIND $rows AS row
                MERGE (e:__Node__ {{id: row.id}})
                SET e += row.properties
                SET e.name = row.name
                SET e:__Entity__:{}
                WITH e, row
                WHERE row.embedding IS NOT NULL
                SET e.embedding = row.embedding
                "#,
                escape_identifier(label)?
            );
            let count = rows.len();
            self.graph
                .run(query(&cypher).param("rows", bolt_list(rows)))
                .await
                .with_context(|| format!("Failed to upsert {} entity(ies) labelled {}", count, label))?;
            tracing::debug!("Upserted {} entity(ies) labelled {}", count, label);
        }

        if !mentions.is_empty() {
            let q = query(
                r#"
                UNWIND $rows AS row
                MATCH (e:__Node__ {id: row.id})
                MATCH (c:__Node__ {id: row.source_id})
                MERGE (c)-[:MENTIONS]->(e)
                "#,
            )
            .param("rows", bolt_list(mentions));
            self.graph
                .run(q)
                .await
                .context("Failed to link entities to their source chunks")?;
        }

        Ok(())
    }

    /// Insert or merge relations, batched per label
    pub async fn upsert_relations(&self, relations: &[Relation]) -> Result<()> {
        let mut by_label: BTreeMap<&str, Vec<BoltType>> = BTreeMap::new();
        for relation in relations {
            by_label
                .entry(relation.label.as_str())
                .or_default()
                .push(bolt_map([
                    ("source_id", relation.source_id.clone().into()),
                    ("target_id", relation.target_id.clone().into()),
                    ("properties", bolt_properties(&relation.properties)),
                ]));
        }

        for (label, rows) in by_label {
            let cypher = relation_upsert_cypher(label)?;
            let count = rows.len();
            self.graph
                .run(query(&cypher).param("rows", bolt_list(rows)))
                .await
                .with_context(|| format!("Failed to upsert {} relation(s) {}", count, label))?;
            tracing::debug!("Upserted {} relation(s) {}", count, label);
        }

        Ok(())
    }

    /// Delete by entity name, relation label, node id, or property match
    pub async fn delete(
        &self,
        entity_names: Option<&[String]>,
        relation_names: Option<&[String]>,
        properties: Option<&PropertyMap>,
        ids: Option<&[String]>,
    ) -> Result<()> {
        if let Some(names) = entity_names {
            let q = query("MATCH (n:__Entity__) WHERE n.name IN $names DETACH DELETE n")
                .param("names", bolt_strings(names));
            self.graph.run(q).await.context("Failed to delete entities by name")?;
        }

        if let Some(types) = relation_names {
            let q = query("MATCH ()-[r]->() WHERE type(r) IN $types DELETE r")
                .param("types", bolt_strings(types));
            self.graph.run(q).await.context("Failed to delete relations")?;
        }

        if let Some(ids) = ids {
            let q = query("MATCH (n:__Node__) WHERE n.id IN $ids DETACH DELETE n")
                .param("ids", bolt_strings(ids));
            self.graph.run(q).await.context("Failed to delete nodes by id")?;
        }

        if let Some(properties) = properties.filter(|p| !p.is_empty()) {
            let mut nodes = WhereBuilder::new();
            nodes.add_property_filters("n", Some(properties));
            if nodes.has_conditions() {
                let cypher = format!("MATCH (n:__Node__) {} DETACH DELETE n", nodes.build());
                self.graph
                    .run(nodes.apply(query(&cypher)))
                    .await
                    .context("Failed to delete nodes by property")?;
            }

            let mut rels = WhereBuilder::new();
            rels.add_property_filters("r", Some(properties));
            if rels.has_conditions() {
                let cypher = format!("MATCH ()-[r]->() {} DELETE r", rels.build());
                self.graph
                    .run(rels.apply(query(&cypher)))
                    .await
                    .context("Failed to delete relations by property")?;
            }
        }

        Ok(())
    }

    /// Run raw Cypher, returning each row as a JSON object
    pub async fn structured_query(
        &self,
        cypher: &str,
        params: Option<&HashMap<String, serde_json::Value>>,
    ) -> Result<Vec<QueryRow>> {
        let mut q = query(cypher);
        if let Some(params) = params {
            for (name, value) in params {
                q = q.param(name, json_to_bolt(value));
            }
        }
        tracing::debug!("structured_query: {}", cypher);

        let rows = self.execute_with_params(q).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut record: QueryRow = row.to().context("Failed to decode query row")?;
            if self.settings.sanitize_query_output {
                record.retain(|_, v| !strip_long_lists(v));
            }
            out.push(record);
        }
        Ok(out)
    }
}

// ============================================================================
// Write statements
// ============================================================================

/// Batch chunk upsert. A node first created as a bare relation endpoint
/// stops being an entity once it is written as a chunk.
fn chunk_upsert_cypher(label: &str) -> Result<String> {
    Ok(format!(
        r#"
        UNWIND $rows AS row
        MERGE (c:__Node__ {{id: row.id}})
        SET c += row.properties
        SET c.text = row.text
        SET c:Chunk:{}
        REMOVE c:__Entity__, c.name
        WITH c, row
        WHERE row.embedding IS NOT NULL
        SET c.embedding = row.embedding
        "#,
        escape_identifier(label)?
    ))
}

/// Batch relation upsert. Missing endpoints become bare entities named by
/// their id, matching the in-memory store.
fn relation_upsert_cypher(label: &str) -> Result<String> {
    Ok(format!(
        r#"
        UNWIND $rows AS row
        MERGE (s:__Node__ {{id: row.source_id}})
          ON CREATE SET s:__Entity__, s.name = row.source_id
        MERGE (t:__Node__ {{id: row.target_id}})
          ON CREATE SET t:__Entity__, t.name = row.target_id
        MERGE (s)-[r:{}]->(t)
        SET r += row.properties
        "#,
        escape_identifier(label)?
    ))
}

// ============================================================================
// Row decoding
// ============================================================================

const TRIPLET_COLUMNS: &str = "s.id AS s_id, labels(s) AS s_labels, properties(s) AS s_props, \
     type(r) AS rel_type, properties(r) AS rel_props, \
     t.id AS t_id, labels(t) AS t_labels, properties(t) AS t_props";

fn props_from_json(value: serde_json::Value) -> PropertyMap {
    match value {
        serde_json::Value::Object(map) => map.into_iter().collect(),
        _ => PropertyMap::new(),
    }
}

fn node_from_row(row: &Row, prefix: &str) -> Result<LabelledNode> {
    let id: String = row.get(&format!("{}id", prefix))?;
    let labels: Vec<String> = row.get(&format!("{}labels", prefix))?;
    let props: serde_json::Value = row.get(&format!("{}props", prefix))?;
    Ok(node_from_parts(id, &labels, props_from_json(props)))
}

fn triplet_from_row(row: &Row) -> Result<Triplet> {
    let source = node_from_row(row, "s_")?;
    let target = node_from_row(row, "t_")?;
    let rel_type: String = row.get("rel_type")?;
    let rel_props: serde_json::Value = row.get("rel_props")?;
    let relation =
        Relation::new(rel_type, source.id(), target.id()).with_properties(props_from_json(rel_props));
    Ok(Triplet::new(source, relation, target))
}

/// Rebuild a node from its stored id, labels and properties
pub(crate) fn node_from_parts(
    id: String,
    labels: &[String],
    mut props: PropertyMap,
) -> LabelledNode {
    props.remove("id");
    let embedding = props.remove("embedding").and_then(|v| {
        v.as_array().map(|items| {
            items
                .iter()
                .filter_map(serde_json::Value::as_f64)
                .map(|x| x as f32)
                .collect::<Vec<f32>>()
        })
    });
    let user_label = labels
        .iter()
        .find(|l| !INTERNAL_LABELS.contains(&l.as_str()))
        .cloned();
    let take_string = |props: &mut PropertyMap, key: &str| {
        props
            .remove(key)
            .and_then(|v| v.as_str().map(str::to_string))
    };

    if labels.iter().any(|l| l == CHUNK_LABEL) {
        let text = take_string(&mut props, "text").unwrap_or_default();
        let mut chunk = ChunkNode::new(text).with_properties(props);
        if let Some(label) = user_label {
            chunk.label = label;
        }
        chunk.embedding = embedding;
        chunk.with_stored_id(id).into()
    } else {
        // Bare relation endpoints have no name; fall back to the id
        let name = take_string(&mut props, "name").unwrap_or_else(|| id.clone());
        let mut entity = EntityNode::new(user_label.unwrap_or_default(), name).with_properties(props);
        entity.embedding = embedding;
        entity.with_stored_id(id).into()
    }
}

/// Drop the leading colon and backticks db.schema.relTypeProperties() adds
fn strip_rel_type(raw: &str) -> &str {
    raw.trim_start_matches(':').trim_matches('`')
}

/// Remove lists longer than [`MAX_LIST_OUTPUT`] nested anywhere in `value`.
/// Returns true when `value` itself is such a list and should be dropped.
fn strip_long_lists(value: &mut serde_json::Value) -> bool {
    match value {
        serde_json::Value::Array(items) if items.len() > MAX_LIST_OUTPUT => true,
        serde_json::Value::Array(items) => {
            items.retain_mut(|item| !strip_long_lists(item));
            false
        }
        serde_json::Value::Object(map) => {
            map.retain(|_, v| !strip_long_lists(v));
            false
        }
        _ => false,
    }
}

/// Accumulates schema rows into a [`GraphSchema`], skipping internal labels
#[derive(Default)]
struct SchemaBuilder {
    node_props: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    rel_props: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    patterns: Vec<RelationshipPattern>,
}

impl SchemaBuilder {
    fn add(
        target: &mut BTreeMap<String, BTreeMap<String, Vec<String>>>,
        label: &str,
        property: &str,
        kind: String,
    ) {
        let types = target
            .entry(label.to_string())
            .or_default()
            .entry(property.to_string())
            .or_default();
        if !types.contains(&kind) {
            types.push(kind);
        }
    }

    fn node_property(&mut self, label: &str, property: &str, kind: String) {
        if !INTERNAL_LABELS.contains(&label) {
            Self::add(&mut self.node_props, label, property, kind);
        }
    }

    fn rel_property(&mut self, rel_type: &str, property: &str, kind: String) {
        Self::add(&mut self.rel_props, rel_type, property, kind);
    }

    fn pattern(&mut self, start: String, rel_type: String, end: String) {
        if INTERNAL_LABELS.contains(&start.as_str()) || INTERNAL_LABELS.contains(&end.as_str()) {
            return;
        }
        let pattern = RelationshipPattern {
            start,
            rel_type,
            end,
        };
        if !self.patterns.contains(&pattern) {
            self.patterns.push(pattern);
        }
    }

    fn build(mut self) -> GraphSchema {
        let flatten = |map: BTreeMap<String, BTreeMap<String, Vec<String>>>| {
            map.into_iter()
                .map(|(label, props)| {
                    let defs = props
                        .into_iter()
                        .map(|(property, types)| PropertyDef { property, types })
                        .collect();
                    (label, defs)
                })
                .collect()
        };
        self.patterns.sort();
        GraphSchema {
            node_props: flatten(self.node_props),
            rel_props: flatten(self.rel_props),
            relationships: self.patterns,
        }
    }
}
