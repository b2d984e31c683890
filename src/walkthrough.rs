//! Scripted tour of the store API
//!
//! Builds a tiny graph (a person, a place, and the sentence mentioning both),
//! then reads, traverses, merges, searches and deletes it, recording what each
//! step observed in a [`WalkthroughReport`].

use crate::embeddings::EmbeddingProvider;
use crate::graph::*;
use anyhow::{anyhow, Context, Result};
use std::fmt;

pub const CHUNK_TEXT: &str = "Logan (age 28), lives in Canada.";
pub const STRUCTURED_QUERY: &str = "MATCH (n:__Node__) RETURN n.id AS id";

/// What each walkthrough step observed
#[derive(Debug, Clone, Default)]
pub struct WalkthroughReport {
    pub node_ids: Vec<String>,
    pub by_property: Vec<LabelledNode>,
    pub by_ids: Vec<LabelledNode>,
    pub triplets: Vec<Triplet>,
    pub rel_map: Vec<Triplet>,
    /// Copies of Logan found by id after the second upsert
    pub merged: Vec<LabelledNode>,
    /// (node id, score), best first
    pub vector_hits: Vec<(String, f32)>,
    /// `None` when the store cannot run structured queries
    pub structured_rows: Option<Vec<QueryRow>>,
    pub schema: String,
    pub after_delete: Vec<LabelledNode>,
}

/// Run every step against `store`, using `embedder` for node and query vectors
pub async fn run_walkthrough(
    store: &dyn PropertyGraphStore,
    embedder: &dyn EmbeddingProvider,
) -> Result<WalkthroughReport> {
    let mut report = WalkthroughReport::default();

    // 1. Build records
    let texts = vec![
        "Logan PERSON".to_string(),
        "Canada LOCATION".to_string(),
        CHUNK_TEXT.to_string(),
    ];
    let [logan_emb, canada_emb, chunk_emb]: [Vec<f32>; 3] = embedder
        .embed_batch(&texts)
        .await?
        .try_into()
        .map_err(|v: Vec<Vec<f32>>| anyhow!("expected 3 embeddings, got {}", v.len()))?;

    let logan = EntityNode::new("PERSON", "Logan")
        .with_property("age", 28)
        .with_embedding(logan_emb);
    let canada = EntityNode::new("LOCATION", "Canada").with_embedding(canada_emb);
    let chunk = ChunkNode::new(CHUNK_TEXT).with_embedding(chunk_emb);
    report.node_ids = vec![logan.id(), canada.id(), chunk.id()];
    tracing::info!("Step 1: built {}, {} and a chunk", logan.name, canada.name);

    // 2. Upsert nodes and relations
    store
        .upsert_nodes(&[
            logan.clone().into(),
            canada.clone().into(),
            chunk.clone().into(),
        ])
        .await
        .context("upserting walkthrough nodes")?;
    store
        .upsert_relations(&[
            Relation::new("LIVES_IN", logan.id(), canada.id()).with_property("since", 2015),
            Relation::new(MENTIONS, chunk.id(), logan.id()),
        ])
        .await
        .context("upserting walkthrough relations")?;
    tracing::info!("Step 2: upserted 3 nodes and 2 relations");

    // 3. Get by property
    let mut age_filter = PropertyMap::new();
    age_filter.insert("age".into(), 28.into());
    report.by_property = store.get(Some(&age_filter), None).await?;
    tracing::info!("Step 3: {} node(s) with age 28", report.by_property.len());

    // 4. Get by ids
    report.by_ids = store.get(None, Some(&report.node_ids)).await?;
    tracing::info!("Step 4: {} node(s) by id", report.by_ids.len());

    // 5. Triplets around Logan
    report.triplets = store
        .get_triplets(Some(&[logan.name.clone()]), None, None, None)
        .await?;
    for triplet in &report.triplets {
        tracing::info!("Step 5: {}", triplet);
    }

    // 6. Relation map
    report.rel_map = store
        .get_rel_map(&[logan.clone().into()], 2, 30, &[])
        .await?;
    tracing::info!("Step 6: rel map has {} triplet(s)", report.rel_map.len());

    // 7. Merge a new property into Logan
    let update = EntityNode::new("PERSON", "Logan").with_property("occupation", "pilot");
    store.upsert_nodes(&[update.into()]).await?;
    report.merged = store.get(None, Some(&[logan.id()])).await?;
    tracing::info!("Step 7: {} copy(ies) of Logan after merge", report.merged.len());

    // 8. Vector search
    if store.supports_vector_queries() {
        let query_embedding = embedder.embed_text("Logan").await?;
        let (nodes, scores) = store
            .vector_query(&VectorStoreQuery::new(query_embedding, 2))
            .await?;
        report.vector_hits = nodes.iter().map(LabelledNode::id).zip(scores).collect();
        tracing::info!("Step 8: {} vector hit(s)", report.vector_hits.len());
    } else {
        tracing::info!("Step 8: vector queries not supported, skipped");
    }

    // 9. Structured query
    if store.supports_structured_queries() {
        let rows = store.structured_query(STRUCTURED_QUERY, None).await?;
        tracing::info!("Step 9: structured query returned {} row(s)", rows.len());
        report.structured_rows = Some(rows);
    } else {
        tracing::info!("Step 9: structured queries not supported, skipped");
    }

    // 10. Schema
    report.schema = store.get_schema_str(true).await?;
    tracing::info!("Step 10: schema\n{}", report.schema);

    // 11. Delete and confirm
    store
        .delete(None, None, None, Some(&report.node_ids))
        .await?;
    report.after_delete = store.get(None, Some(&report.node_ids)).await?;
    tracing::info!(
        "Step 11: {} node(s) left after delete",
        report.after_delete.len()
    );

    Ok(report)
}

impl fmt::Display for WalkthroughReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== get by property {{age: 28}}")?;
        for node in &self.by_property {
            writeln!(f, "  {}", node)?;
        }
        writeln!(f, "== get by ids")?;
        for node in &self.by_ids {
            writeln!(f, "  {} [{}]", node, node.id())?;
        }
        writeln!(f, "== triplets for Logan")?;
        for triplet in &self.triplets {
            writeln!(f, "  {}", triplet)?;
        }
        writeln!(f, "== rel map from Logan (depth 2)")?;
        for triplet in &self.rel_map {
            writeln!(f, "  {}", triplet)?;
        }
        writeln!(f, "== Logan after merge")?;
        for node in &self.merged {
            let props = serde_json::to_string(node.properties()).map_err(|_| fmt::Error)?;
            writeln!(f, "  {} {}", node, props)?;
        }
        writeln!(f, "== vector query \"Logan\"")?;
        for (id, score) in &self.vector_hits {
            writeln!(f, "  {:.4} {}", score, id)?;
        }
        match &self.structured_rows {
            Some(rows) => {
                writeln!(f, "== structured query: {}", STRUCTURED_QUERY)?;
                for row in rows {
                    let json = serde_json::to_string(row).map_err(|_| fmt::Error)?;
                    writeln!(f, "  {}", json)?;
                }
            }
            None => writeln!(f, "== structured query: unsupported by this store")?,
        }
        writeln!(f, "== schema")?;
        for line in self.schema.lines() {
            writeln!(f, "  {}", line)?;
        }
        write!(
            f,
            "== after delete: {} node(s) remain",
            self.after_delete.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashEmbeddingProvider;
    use crate::test_helpers::mock_app_state;
    use serde_json::json;

    #[tokio::test]
    async fn test_walkthrough_on_memory_store() {
        let state = mock_app_state();
        let report = run_walkthrough(state.store.as_ref(), state.embedder.as_ref())
            .await
            .unwrap();

        let logan_id = entity_id("PERSON", "Logan");

        assert_eq!(report.by_property.len(), 1);
        assert_eq!(report.by_property[0].name(), Some("Logan"));

        let got: Vec<String> = report.by_ids.iter().map(LabelledNode::id).collect();
        assert_eq!(got, report.node_ids);

        assert_eq!(report.triplets.len(), 1);
        assert_eq!(report.triplets[0].relation.label, "LIVES_IN");
        assert_eq!(
            report.triplets[0].relation.properties.get("since"),
            Some(&json!(2015))
        );

        assert!(report.rel_map.iter().all(|t| t.relation.label != MENTIONS));
        assert_eq!(report.rel_map.len(), 1);

        assert_eq!(report.merged.len(), 1);
        let props = report.merged[0].properties();
        assert_eq!(props.get("age"), Some(&json!(28)));
        assert_eq!(props.get("occupation"), Some(&json!("pilot")));

        assert_eq!(report.vector_hits[0].0, logan_id);
        assert!(report.structured_rows.is_none());
        assert!(report.schema.contains("LIVES_IN"));
        assert!(report.after_delete.is_empty());
    }

    #[tokio::test]
    async fn test_walkthrough_leaves_store_empty() {
        let store = SimplePropertyGraphStore::new();
        let embedder = HashEmbeddingProvider::new(64);

        run_walkthrough(&store, &embedder).await.unwrap();

        assert_eq!(store.node_count().await, 0);
        assert_eq!(store.relation_count().await, 0);
    }

    #[tokio::test]
    async fn test_report_display() {
        let state = mock_app_state();
        let report = run_walkthrough(state.store.as_ref(), state.embedder.as_ref())
            .await
            .unwrap();

        let text = report.to_string();
        assert!(text.contains("(Logan (PERSON)) -[LIVES_IN]-> (Canada (LOCATION))"));
        assert!(text.contains("unsupported by this store"));
        assert!(text.ends_with("0 node(s) remain"));
    }
}
