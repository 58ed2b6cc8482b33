//! # Presage Core
//!
//! Context-aware memory engine: stores discrete memory items with structured
//! context, ranks and retrieves the subset relevant to a query, learns
//! per-user access preferences, and predicts which items will be needed next
//! so they can sit in a fast cache before they are asked for.
//!
//! - **Multi-strategy retrieval**: semantic, contextual, temporal, frequency,
//!   importance, hybrid, adaptive, and collaborative candidate generation
//!   with a deterministic keyword heuristic picking the strategy per query
//! - **Eight-factor ranking**: semantic similarity, context match, temporal
//!   relevance, access frequency, importance, user preference, relationship
//!   strength, and content freshness folded into one weighted score
//! - **Diversity filtering**: content-fingerprint dedup plus a per-type quota
//! - **Query caching**: TTL-bounded memoization of ranked results
//! - **Preference learning**: per-user type/tag/context weights nudged by
//!   every retrieval
//! - **Predictive preloading**: sequence, context, temporal, workflow,
//!   collaborative, related, and seasonal pattern mining feeding a bounded
//!   insertion-age-evicted preload cache
//!
//! Embedding generation and durable persistence are external collaborators
//! behind the [`EmbeddingProvider`] and [`Persistence`] traits; the engine
//! degrades gracefully when either is absent or failing.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use presage_core::prelude::*;
//!
//! let engine = MemoryEngine::builder().build();
//!
//! let item = MemoryItem::new("The auth service rotates keys weekly", MemoryType::Insight)
//!     .with_context(MemoryContext::for_project_user("auth", "alice"))
//!     .with_tags(["auth", "keys"]);
//! let id = engine.store_item(item).await?;
//!
//! let query = MemoryQuery::new("key rotation").with_max_results(5);
//! let results = engine.retrieve(&query).await?;
//!
//! let context = MemoryContext::for_project_user("auth", "alice");
//! let predictions = engine.predict_needs(&context).await?;
//! ```
//!
//! ## Feature Flags
//!
//! - `local-embeddings`: in-process embedding generation with fastembed

// ============================================================================
// MODULES
// ============================================================================

pub mod context;
pub mod embeddings;
pub mod memory;
pub mod persistence;
pub mod predict;
pub mod retrieval;
pub mod store;

mod engine;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Data model
pub use memory::{
    content_fingerprint, AccessLevel, MemoryContext, MemoryItem, MemoryQuery, MemoryType,
    QueryFilters, TimeRange,
};

// Item store
pub use store::{
    AgeBuckets, CleanupCandidate, CleanupReason, CleanupReport, ExportData, ImportReport,
    ImportanceBuckets, ItemStore, MergeStrategy, StoreError, StoreStats, UpdateFields,
};

// Context analysis
pub use context::{
    analyze, ContextFeatures, QueryDomain, QueryFeatures, QueryKind, Sentiment,
    TemporalFeatures, TimeOfDay,
};

// Retrieval
pub use retrieval::{
    context_similarity, FactorScores, ProfileStore, RankingFactor, RetrievalEngine,
    RetrievalError, RetrievalEvent, RetrievalParams, RetrievalResult, RetrievalStrategy,
    UserProfile, ANONYMOUS_USER,
};

// Prediction and preloading
pub use predict::{
    ConfidenceTier, LoaderMetrics, MemoryPrediction, PatternAnalysis, PatternPredictor,
    PredictionPerformance, PredictionReport, PredictionType, PredictiveLoader,
    PredictorConfig, PredictorError, PreloadCache, PreloadStats,
};

// Collaborator boundaries
pub use embeddings::{cosine_similarity, token_overlap, EmbeddingError, EmbeddingProvider};
pub use persistence::{JsonFileStore, Persistence, PersistenceError};

#[cfg(feature = "local-embeddings")]
pub use embeddings::LocalEmbeddingProvider;

// Engine facade
pub use engine::{EngineConfig, EngineError, MemoryEngine, MemoryEngineBuilder};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        AccessLevel, ConfidenceTier, EngineConfig, EngineError, MemoryContext, MemoryEngine,
        MemoryItem, MemoryPrediction, MemoryQuery, MemoryType, PredictionReport,
        PredictionType, QueryFilters, RetrievalResult, RetrievalStrategy,
    };

    pub use crate::{EmbeddingProvider, JsonFileStore, Persistence};

    #[cfg(feature = "local-embeddings")]
    pub use crate::LocalEmbeddingProvider;
}
