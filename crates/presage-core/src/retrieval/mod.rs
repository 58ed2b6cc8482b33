//! Retrieval Engine
//!
//! Multi-strategy candidate generation, eight-factor ranking, diversity
//! filtering, TTL query caching, and the per-retrieval learning hook that
//! feeds user profiles and strategy performance tracking.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::memory::MemoryContext;
use crate::store::StoreError;

mod engine;
mod profile;
mod ranking;

pub use engine::{RetrievalEngine, RetrievalEvent};
pub use profile::{ProfileStore, UserProfile, ANONYMOUS_USER};
pub use ranking::{
    context_similarity, frequency_score, freshness_score, relationship_strength,
    temporal_relevance, FactorScores, RankingFactor, RetrievalResult,
};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Retrieval engine error type
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Item store failure
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Lock poisoned during concurrent access
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

/// Retrieval engine result type
pub type Result<T> = std::result::Result<T, RetrievalError>;

// ============================================================================
// STRATEGIES
// ============================================================================

/// Strategy keywords checked against lower-cased query text, in priority order
const TEMPORAL_KEYWORDS: [&str; 6] = ["recent", "latest", "yesterday", "today", "last", "new"];
const IMPORTANCE_KEYWORDS: [&str; 5] = ["important", "critical", "urgent", "priority", "key"];
const COLLABORATION_KEYWORDS: [&str; 5] = ["team", "shared", "others", "colleagues", "everyone"];

/// Named candidate-generation strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalStrategy {
    /// Embedding (or token-overlap) similarity
    Semantic,
    /// Context-match priority
    Contextual,
    /// Recency with access boost
    Temporal,
    /// Access frequency normalized by age
    Frequency,
    /// Raw importance
    Importance,
    /// Weighted union of semantic, contextual, and temporal
    #[default]
    Hybrid,
    /// Reserved extension point for learned weighting; currently Hybrid
    Adaptive,
    /// Similar-user behavior
    Collaborative,
}

impl RetrievalStrategy {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalStrategy::Semantic => "semantic",
            RetrievalStrategy::Contextual => "contextual",
            RetrievalStrategy::Temporal => "temporal",
            RetrievalStrategy::Frequency => "frequency",
            RetrievalStrategy::Importance => "importance",
            RetrievalStrategy::Hybrid => "hybrid",
            RetrievalStrategy::Adaptive => "adaptive",
            RetrievalStrategy::Collaborative => "collaborative",
        }
    }

    /// Pick a strategy for a query without an explicit one
    ///
    /// Deterministic keyword heuristic evaluated in priority order:
    /// temporal words, importance words, collaboration words, then a context
    /// with a project, then Hybrid.
    pub fn select(query_text: &str, context: Option<&MemoryContext>) -> Self {
        let lowered = query_text.to_lowercase();
        let words: Vec<&str> = lowered.split_whitespace().collect();

        if words.iter().any(|w| TEMPORAL_KEYWORDS.contains(w)) {
            return RetrievalStrategy::Temporal;
        }
        if words.iter().any(|w| IMPORTANCE_KEYWORDS.contains(w)) {
            return RetrievalStrategy::Importance;
        }
        if words.iter().any(|w| COLLABORATION_KEYWORDS.contains(w)) {
            return RetrievalStrategy::Collaborative;
        }
        if context.and_then(|c| c.project.as_ref()).is_some() {
            return RetrievalStrategy::Contextual;
        }

        RetrievalStrategy::Hybrid
    }
}

impl std::fmt::Display for RetrievalStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RetrievalStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "semantic" => Ok(RetrievalStrategy::Semantic),
            "contextual" => Ok(RetrievalStrategy::Contextual),
            "temporal" => Ok(RetrievalStrategy::Temporal),
            "frequency" => Ok(RetrievalStrategy::Frequency),
            "importance" => Ok(RetrievalStrategy::Importance),
            "hybrid" => Ok(RetrievalStrategy::Hybrid),
            "adaptive" => Ok(RetrievalStrategy::Adaptive),
            "collaborative" => Ok(RetrievalStrategy::Collaborative),
            _ => Err(format!("Unknown strategy: {s}")),
        }
    }
}

// ============================================================================
// PARAMETERS
// ============================================================================

/// Tunable retrieval parameters
///
/// The defaults are the shipped configuration; every weight can be overridden
/// through [`crate::engine::EngineConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievalParams {
    /// Weight of the context-match factor
    pub context_weight: f64,
    /// Weight of the temporal-relevance factor
    pub temporal_weight: f64,
    /// Weight of the access-frequency factor
    pub frequency_weight: f64,
    /// Weight of the importance factor
    pub importance_weight: f64,
    /// Weight of the content-freshness factor
    pub freshness_weight: f64,
    /// Nonzero enables the per-type diversity quota
    pub diversity_factor: f64,
    /// Weight of the user-preference factor
    pub personalization_strength: f64,
    /// Query-cache entry lifetime in seconds
    pub cache_ttl_secs: i64,
    /// Query-cache capacity in entries
    pub cache_capacity: usize,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            context_weight: 0.3,
            temporal_weight: 0.2,
            frequency_weight: 0.1,
            importance_weight: 0.2,
            freshness_weight: 0.1,
            diversity_factor: 0.1,
            personalization_strength: 0.2,
            cache_ttl_secs: 300,
            cache_capacity: 256,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_roundtrip() {
        for strategy in [
            RetrievalStrategy::Semantic,
            RetrievalStrategy::Contextual,
            RetrievalStrategy::Temporal,
            RetrievalStrategy::Frequency,
            RetrievalStrategy::Importance,
            RetrievalStrategy::Hybrid,
            RetrievalStrategy::Adaptive,
            RetrievalStrategy::Collaborative,
        ] {
            assert_eq!(strategy.as_str().parse::<RetrievalStrategy>(), Ok(strategy));
        }
    }

    #[test]
    fn test_select_temporal_keywords() {
        assert_eq!(
            RetrievalStrategy::select("show recent deploy notes", None),
            RetrievalStrategy::Temporal
        );
        assert_eq!(
            RetrievalStrategy::select("what changed yesterday", None),
            RetrievalStrategy::Temporal
        );
    }

    #[test]
    fn test_select_importance_keywords() {
        assert_eq!(
            RetrievalStrategy::select("critical incidents", None),
            RetrievalStrategy::Importance
        );
    }

    #[test]
    fn test_select_collaboration_keywords() {
        assert_eq!(
            RetrievalStrategy::select("what did the team decide", None),
            RetrievalStrategy::Collaborative
        );
    }

    #[test]
    fn test_select_priority_order() {
        // "latest" (temporal) beats "important" (importance)
        assert_eq!(
            RetrievalStrategy::select("latest important decisions", None),
            RetrievalStrategy::Temporal
        );
    }

    #[test]
    fn test_select_contextual_with_project() {
        let context = MemoryContext::for_project_user("atlas", "alice");
        assert_eq!(
            RetrievalStrategy::select("api notes", Some(&context)),
            RetrievalStrategy::Contextual
        );
    }

    #[test]
    fn test_select_defaults_to_hybrid() {
        assert_eq!(
            RetrievalStrategy::select("api notes", None),
            RetrievalStrategy::Hybrid
        );
    }
}
