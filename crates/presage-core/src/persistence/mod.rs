//! Persistence Collaborator Boundary
//!
//! Durable storage is an external collaborator: the engine calls it on every
//! mutation, logs failures, and continues with in-memory state. No operation
//! depends on persistence succeeding.

use async_trait::async_trait;
use thiserror::Error;

use crate::memory::MemoryItem;
use crate::store::StoreStats;

mod json;

pub use json::JsonFileStore;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Persistence collaborator errors
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for persistence operations
pub type Result<T> = std::result::Result<T, PersistenceError>;

// ============================================================================
// PERSISTENCE TRAIT
// ============================================================================

/// Durable load/save of items and aggregate statistics
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Save (or overwrite) a single item
    async fn save_item(&self, item: &MemoryItem) -> Result<()>;

    /// Remove a single item
    async fn delete_item(&self, id: &str) -> Result<()>;

    /// Load every persisted item
    async fn load_items(&self) -> Result<Vec<MemoryItem>>;

    /// Save aggregate store statistics
    async fn save_stats(&self, stats: &StoreStats) -> Result<()>;
}
