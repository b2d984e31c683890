//! Integration tests for the Neo4j property graph store
//!
//! These tests require Neo4j to be running (5.11+ for vector queries).
//! Run with: cargo test --test integration_tests

use property_graph_store::embeddings::HashEmbeddingProvider;
use property_graph_store::graph::*;
use property_graph_store::neo4j::{Neo4jPropertyGraphStore, Neo4jSettings};
use property_graph_store::walkthrough::run_walkthrough;
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

/// Get test settings from environment or use defaults
fn test_settings() -> Neo4jSettings {
    let defaults = Neo4jSettings::default();
    Neo4jSettings {
        uri: std::env::var("NEO4J_URI").unwrap_or(defaults.uri.clone()),
        user: std::env::var("NEO4J_USER").unwrap_or(defaults.user.clone()),
        password: std::env::var("NEO4J_PASSWORD").unwrap_or(defaults.password.clone()),
        embedding_dimensions: Some(64),
        ..defaults
    }
}

/// Connect, or None if Neo4j is not reachable
async fn connect() -> Option<Neo4jPropertyGraphStore> {
    let settings = test_settings();
    let store = match Neo4jPropertyGraphStore::connect(&settings).await {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Neo4j not available at {}: {}", settings.uri, e);
            return None;
        }
    };
    // The pool connects lazily, so check with a real query
    if let Err(e) = store.structured_query("RETURN 1 AS ok", None).await {
        eprintln!("Neo4j not available at {}: {}", settings.uri, e);
        return None;
    }
    Some(store)
}

/// Entity names unique to one test run
fn unique(name: &str) -> String {
    format!("{}-{}", name, Uuid::new_v4())
}

#[tokio::test]
async fn test_upsert_get_and_delete() {
    let Some(store) = connect().await else {
        eprintln!("Skipping test: Neo4j not available");
        return;
    };

    let person = EntityNode::new("PERSON", unique("Logan"))
        .with_property("age", 28)
        .with_property("aliases", json!(["L", "Lo"]))
        .with_embedding(vec![1.0, 0.0, 0.0]);
    let place = EntityNode::new("LOCATION", unique("Canada"));
    let ids = vec![person.id(), place.id()];

    store
        .upsert_nodes(&[person.clone().into(), place.clone().into()])
        .await
        .unwrap();

    let nodes = store.get(None, Some(&ids)).await.unwrap();
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0], LabelledNode::from(person.clone()));
    assert_eq!(nodes[1].label(), "LOCATION");

    // Merge keeps old properties and the stored embedding
    let update = EntityNode::new("PERSON", person.name.clone()).with_property("city", "Toronto");
    store.upsert_nodes(&[update.into()]).await.unwrap();
    let merged = store.get(None, Some(&[person.id()])).await.unwrap();
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].properties().get("age"), Some(&json!(28)));
    assert_eq!(merged[0].properties().get("city"), Some(&json!("Toronto")));
    assert!(merged[0].embedding().is_some());

    store.delete(None, None, None, Some(&ids)).await.unwrap();
    assert!(store.get(None, Some(&ids)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_relations_triplets_and_rel_map() {
    let Some(store) = connect().await else {
        eprintln!("Skipping test: Neo4j not available");
        return;
    };

    let person = EntityNode::new("PERSON", unique("Ada"));
    let city = EntityNode::new("CITY", unique("London"));
    let country = EntityNode::new("COUNTRY", unique("England"));
    let chunk = ChunkNode::new(format!("{} lived in {}.", person.name, city.name));
    let ids = vec![person.id(), city.id(), country.id(), chunk.id()];

    store
        .upsert_nodes(&[
            chunk.clone().into(),
            person.clone().into(),
            city.clone().into(),
            country.clone().into(),
        ])
        .await
        .unwrap();
    store
        .upsert_relations(&[
            Relation::new("LIVES_IN", person.id(), city.id()).with_property("since", 1833),
            Relation::new("PART_OF", city.id(), country.id()),
            Relation::new(MENTIONS, chunk.id(), person.id()),
        ])
        .await
        .unwrap();

    let triplets = store
        .get_triplets(Some(&[city.name.clone()]), None, None, None)
        .await
        .unwrap();
    assert_eq!(triplets.len(), 2);
    assert!(triplets.iter().all(|t| t.relation.label != MENTIONS));

    let start: LabelledNode = person.clone().into();
    let one_hop = store.get_rel_map(&[start.clone()], 1, 30, &[]).await.unwrap();
    assert_eq!(one_hop.len(), 1);
    assert_eq!(one_hop[0].relation.properties.get("since"), Some(&json!(1833)));

    let two_hops = store.get_rel_map(&[start.clone()], 2, 30, &[]).await.unwrap();
    assert_eq!(two_hops.len(), 2);

    let ignored = store
        .get_rel_map(&[start], 2, 30, &["PART_OF".to_string()])
        .await
        .unwrap();
    assert_eq!(ignored.len(), 1);

    store
        .delete(None, Some(&["PART_OF".to_string()]), None, None)
        .await
        .unwrap();
    let after = store
        .get_triplets(None, None, None, Some(&[country.id()]))
        .await
        .unwrap();
    assert!(after.is_empty());

    store.delete(None, None, None, Some(&ids)).await.unwrap();
}

#[tokio::test]
async fn test_bare_relation_endpoints_are_entities() {
    let Some(store) = connect().await else {
        eprintln!("Skipping test: Neo4j not available");
        return;
    };

    let a = unique("a");
    let b = unique("b");
    store
        .upsert_relations(&[Relation::new("KNOWS", a.clone(), b.clone())])
        .await
        .unwrap();

    let triplets = store
        .get_triplets(None, None, None, Some(&[a.clone()]))
        .await
        .unwrap();
    assert_eq!(triplets.len(), 1);
    assert_eq!(triplets[0].source.name(), Some(a.as_str()));

    let mut filter = PropertyMap::new();
    filter.insert("name".into(), json!(b.clone()));
    let nodes = store.get(Some(&filter), None).await.unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].label(), DEFAULT_ENTITY_LABEL);

    // Writing an endpoint as a chunk takes it out of entity triplets
    store
        .upsert_nodes(&[ChunkNode::new("now a chunk").with_id(b.clone()).into()])
        .await
        .unwrap();
    let triplets = store
        .get_triplets(None, None, None, Some(&[a.clone()]))
        .await
        .unwrap();
    assert!(triplets.is_empty());

    store.delete(None, None, None, Some(&[a, b])).await.unwrap();
}

#[tokio::test]
async fn test_structured_query_keeps_null_columns() {
    let Some(store) = connect().await else {
        eprintln!("Skipping test: Neo4j not available");
        return;
    };

    let rows = store
        .structured_query("RETURN null AS missing, range(1, 200) AS long, 1 AS one", None)
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("missing"), Some(&json!(null)));
    assert!(rows[0].get("long").is_none());
    assert_eq!(rows[0].get("one"), Some(&json!(1)));
}

#[tokio::test]
async fn test_structured_query_with_params() {
    let Some(store) = connect().await else {
        eprintln!("Skipping test: Neo4j not available");
        return;
    };

    let mut params = HashMap::new();
    params.insert("n".to_string(), json!(3));
    params.insert("names".to_string(), json!(["a", "b"]));

    let rows = store
        .structured_query("RETURN $n + 1 AS next, size($names) AS count", Some(&params))
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("next"), Some(&json!(4)));
    assert_eq!(rows[0].get("count"), Some(&json!(2)));
}

#[tokio::test]
async fn test_schema_lists_labels_and_patterns() {
    let Some(store) = connect().await else {
        eprintln!("Skipping test: Neo4j not available");
        return;
    };

    let label = format!("SCHEMA_{}", Uuid::new_v4().simple());
    let a = EntityNode::new(label.clone(), unique("a")).with_property("weight", 1.5);
    let b = EntityNode::new(label.clone(), unique("b"));
    store
        .upsert_nodes(&[a.clone().into(), b.clone().into()])
        .await
        .unwrap();
    store
        .upsert_relations(&[Relation::new("LINKS", a.id(), b.id())])
        .await
        .unwrap();

    let schema = store.get_schema(true).await.unwrap();
    assert!(schema.node_props.contains_key(&label));
    assert!(schema
        .relationships
        .iter()
        .any(|p| p.start == label && p.rel_type == "LINKS" && p.end == label));

    store
        .delete(None, None, None, Some(&[a.id(), b.id()]))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_walkthrough_against_neo4j() {
    let Some(store) = connect().await else {
        eprintln!("Skipping test: Neo4j not available");
        return;
    };
    let embedder = HashEmbeddingProvider::new(64);

    let report = run_walkthrough(&store, &embedder).await.unwrap();

    assert!(report
        .by_property
        .iter()
        .any(|n| n.name() == Some("Logan")));
    assert_eq!(report.by_ids.len(), 3);
    assert_eq!(report.merged.len(), 1);
    assert_eq!(report.vector_hits[0].0, entity_id("PERSON", "Logan"));
    assert!(report.structured_rows.is_some());
    assert!(report.after_delete.is_empty());
}
