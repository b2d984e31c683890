//! Neo4j backend for the property graph store

pub mod client;
pub mod cypher;
mod impl_graph_store;

pub use client::{Neo4jPropertyGraphStore, Neo4jSettings};
