//! Storage trait abstraction.

use async_trait::async_trait;

use crate::ComponentRecord;

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Persisted data violates a model invariant
    #[error("Model error: {0}")]
    Model(#[from] lineage_core::Error),

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Storage abstraction for component histories.
///
/// This trait allows different storage backends to be plugged in.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Save a component record, replacing any previous one.
    async fn save_component(&mut self, record: &ComponentRecord) -> Result<()>;

    /// Load the record of a component.
    async fn load_component(&self, component: &str) -> Result<Option<ComponentRecord>>;

    /// Names of every stored component, sorted.
    async fn list_components(&self) -> Result<Vec<String>>;

    /// Delete a component record.
    async fn delete_component(&mut self, component: &str) -> Result<()>;
}
