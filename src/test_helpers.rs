//! Test helper factories and mock state builders
//!
//! Provides convenience functions for creating graph records with sensible
//! defaults, and helpers for building an in-memory AppState.
#![allow(dead_code)]

use crate::graph::*;
use crate::neo4j::Neo4jSettings;
use crate::{AppState, Backend, Config};

// ============================================================================
// Mock state builders
// ============================================================================

/// Config pointing at the memory backend with nothing on disk
pub fn test_config() -> Config {
    Config {
        backend: Backend::Memory,
        neo4j: Neo4jSettings {
            uri: "bolt://mock:7687".to_string(),
            password: "mock".to_string(),
            ..Neo4jSettings::default()
        },
        persist_path: None,
        embedding_dimensions: 64,
    }
}

/// Create a mock AppState with an empty in-memory store
pub fn mock_app_state() -> AppState {
    AppState::in_memory(test_config())
}

// ============================================================================
// Record factories
// ============================================================================

/// A PERSON entity with an age and a small embedding
pub fn test_person(name: &str, age: i64) -> EntityNode {
    EntityNode::new("PERSON", name)
        .with_property("age", age)
        .with_embedding(vec![1.0, 0.0, 0.0])
}

/// A LOCATION entity with no properties
pub fn test_location(name: &str) -> EntityNode {
    EntityNode::new("LOCATION", name).with_embedding(vec![0.0, 1.0, 0.0])
}

/// A text chunk with a document reference
pub fn test_chunk(text: &str) -> ChunkNode {
    ChunkNode::new(text).with_property(REF_DOC_ID_KEY, "doc-1")
}

/// A relation between two entities
pub fn test_relation(label: &str, source: &EntityNode, target: &EntityNode) -> Relation {
    Relation::new(label, source.id(), target.id())
}
