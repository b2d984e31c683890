//! Error types owned by the store layer.
//!
//! Store methods return `anyhow::Result`; these variants are the failures the
//! crate raises itself, so callers can `downcast_ref::<StoreError>()` to tell
//! them apart from driver or I/O errors.

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{store} does not support {operation}")]
    Unsupported {
        store: &'static str,
        operation: &'static str,
    },

    #[error("invalid identifier for label or relation type: {0:?}")]
    InvalidIdentifier(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),
}
