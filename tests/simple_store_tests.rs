//! Public API tests for the in-memory property graph store
//!
//! No external services needed.

use property_graph_store::embeddings::{EmbeddingProvider, HashEmbeddingProvider};
use property_graph_store::graph::*;
use property_graph_store::{AppState, Backend, Config, StoreError};
use serde_json::json;
use std::sync::Arc;

fn memory_config(persist_path: Option<std::path::PathBuf>) -> Config {
    let mut config = Config::from_yaml_and_env(Some(std::path::Path::new(
        "/tmp/nonexistent-pgstore-test-config.yaml",
    )))
    .unwrap();
    config.backend = Backend::Memory;
    config.persist_path = persist_path;
    config
}

#[tokio::test]
async fn test_store_behind_trait_object() {
    let store: Arc<dyn PropertyGraphStore> = Arc::new(SimplePropertyGraphStore::new());

    let alice = EntityNode::new("PERSON", "Alice").with_property("team", "graph");
    let bob = EntityNode::new("PERSON", "Bob").with_property("team", "graph");
    store
        .upsert_nodes(&[alice.clone().into(), bob.clone().into()])
        .await
        .unwrap();
    store
        .upsert_relations(&[Relation::new("KNOWS", alice.id(), bob.id())])
        .await
        .unwrap();

    let mut team = PropertyMap::new();
    team.insert("team".into(), json!("graph"));
    assert_eq!(store.get(Some(&team), None).await.unwrap().len(), 2);

    let triplets = store
        .get_triplets(None, None, None, Some(&[bob.id()]))
        .await
        .unwrap();
    assert_eq!(triplets.len(), 1);
    assert_eq!(triplets[0].to_string(), "(Alice (PERSON)) -[KNOWS]-> (Bob (PERSON))");

    let schema = store.get_schema_str(false).await.unwrap();
    assert!(schema.contains("(:PERSON)-[:KNOWS]->(:PERSON)"));
}

#[tokio::test]
async fn test_unknown_ids_are_empty_not_errors() {
    let store = SimplePropertyGraphStore::new();
    let nodes = store
        .get(None, Some(&["does-not-exist".to_string()]))
        .await
        .unwrap();
    assert!(nodes.is_empty());
}

#[tokio::test]
async fn test_vector_query_with_hash_embeddings() {
    let embedder = HashEmbeddingProvider::new(64);
    let store = SimplePropertyGraphStore::new();

    let texts = vec!["Logan PERSON".to_string(), "Canada LOCATION".to_string()];
    let embeddings = embedder.embed_batch(&texts).await.unwrap();
    store
        .upsert_nodes(&[
            EntityNode::new("PERSON", "Logan")
                .with_embedding(embeddings[0].clone())
                .into(),
            EntityNode::new("LOCATION", "Canada")
                .with_embedding(embeddings[1].clone())
                .into(),
        ])
        .await
        .unwrap();

    let query = VectorStoreQuery::new(embedder.embed_text("Logan").await.unwrap(), 1);
    let (nodes, scores) = store.vector_query(&query).await.unwrap();

    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].name(), Some("Logan"));
    assert!(scores[0] > 0.5);

    // Filters restrict candidates before ranking
    let filtered = VectorStoreQuery::new(embedder.embed_text("Logan").await.unwrap(), 1)
        .with_filter("name", "Canada");
    let (nodes, _) = store.vector_query(&filtered).await.unwrap();
    assert_eq!(nodes[0].name(), Some("Canada"));
}

#[tokio::test]
async fn test_app_state_round_trips_through_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph.json");

    let state = AppState::new(memory_config(Some(path.clone()))).await.unwrap();
    let chunk = ChunkNode::new("A sentence worth keeping.");
    state.store.upsert_nodes(&[chunk.clone().into()]).await.unwrap();
    state.persist().await.unwrap();

    let reloaded = AppState::new(memory_config(Some(path))).await.unwrap();
    let texts = reloaded.store.get_text_nodes(&[chunk.id()]).await.unwrap();
    assert_eq!(texts.len(), 1);
    assert_eq!(texts[0].text, "A sentence worth keeping.");
}

#[tokio::test]
async fn test_structured_query_reports_unsupported() {
    let state = AppState::in_memory(memory_config(None));
    assert!(!state.store.supports_structured_queries());

    let err = state
        .store
        .structured_query("RETURN 1", None)
        .await
        .unwrap_err();
    let store_err = err.downcast_ref::<StoreError>().unwrap();
    assert!(store_err.to_string().contains("structured"));
}
