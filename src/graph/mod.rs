//! Property graph model and storage interface.
//!
//! ## Modules
//!
//! - [`models`]: Entity, chunk, relation and triplet records plus schema types
//! - [`traits`]: `PropertyGraphStore`, the interface every backend implements
//! - [`simple`]: `SimplePropertyGraphStore`, in-memory with JSON snapshots
//!
//! The Neo4j backend lives in [`crate::neo4j`].

pub mod models;
pub mod simple;
pub mod traits;

pub use models::*;
pub use simple::SimplePropertyGraphStore;
pub use traits::{PropertyGraphStore, QueryRow};
