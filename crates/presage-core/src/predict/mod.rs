//! Predictive Preloading
//!
//! Mines temporal, sequence, context-association, workflow, and collaborative
//! access patterns, emits ranked time-bounded predictions, and keeps a bounded
//! preload cache of items expected to be requested soon.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::memory::MemoryContext;
use crate::store::StoreError;

mod loader;
mod patterns;
mod preload;

pub use loader::{
    ContextPatternSummary, LoaderMetrics, PatternAnalysis, PredictionPerformance,
    PredictionReport, PredictiveLoader, SequenceSummary, TemporalDistribution,
};
pub use patterns::{PatternPredictor, PredictorConfig};
pub use preload::{PreloadCache, PreloadStats, DEFAULT_PRELOAD_CAPACITY};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Prediction subsystem error type
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum PredictorError {
    /// Item store failure
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Profile registry failure
    #[error(transparent)]
    Retrieval(#[from] crate::retrieval::RetrievalError),
    /// Lock poisoned during concurrent access
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

/// Prediction subsystem result type
pub type Result<T> = std::result::Result<T, PredictorError>;

// ============================================================================
// PREDICTION TYPES
// ============================================================================

/// What kind of pattern produced a prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionType {
    /// Next item in an observed access sequence
    NextItem,
    /// Items co-accessed with a recent item
    Related,
    /// Items associated with the caller's context key
    ContextBased,
    /// Items accessed at similar times of day/week
    Temporal,
    /// Next steps of an observed per-session workflow
    Workflow,
    /// Items recently accessed by similar users
    Collaborative,
    /// Items accessed in the same season (hour/weekday or calendar month)
    Seasonal,
}

impl PredictionType {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionType::NextItem => "next_item",
            PredictionType::Related => "related",
            PredictionType::ContextBased => "context_based",
            PredictionType::Temporal => "temporal",
            PredictionType::Workflow => "workflow",
            PredictionType::Collaborative => "collaborative",
            PredictionType::Seasonal => "seasonal",
        }
    }
}

impl std::fmt::Display for PredictionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// CONFIDENCE TIERS
// ============================================================================

/// Discrete confidence tier attached to every prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    /// Score < 0.2
    VeryLow,
    /// Score in [0.2, 0.4)
    Low,
    /// Score in [0.4, 0.6)
    Medium,
    /// Score in [0.6, 0.8)
    High,
    /// Score >= 0.8
    VeryHigh,
}

impl ConfidenceTier {
    /// Tier for a continuous confidence score
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            ConfidenceTier::VeryHigh
        } else if score >= 0.6 {
            ConfidenceTier::High
        } else if score >= 0.4 {
            ConfidenceTier::Medium
        } else if score >= 0.2 {
            ConfidenceTier::Low
        } else {
            ConfidenceTier::VeryLow
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceTier::VeryLow => "very_low",
            ConfidenceTier::Low => "low",
            ConfidenceTier::Medium => "medium",
            ConfidenceTier::High => "high",
            ConfidenceTier::VeryHigh => "very_high",
        }
    }
}

// ============================================================================
// MEMORY PREDICTION
// ============================================================================

/// A ranked, time-bounded guess at item ids likely to be requested next
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryPrediction {
    /// Unique prediction id
    pub id: String,
    /// Predicted item ids, most likely first
    pub predicted_ids: Vec<String>,
    /// Which pattern produced this prediction
    pub kind: PredictionType,
    /// Discrete confidence tier
    pub tier: ConfidenceTier,
    /// Continuous confidence score in [0, 1]
    pub confidence: f64,
    /// Human-readable reasoning
    pub reasoning: String,
    /// Context the prediction was made for
    pub context: MemoryContext,
    /// When the prediction was made
    pub predicted_at: DateTime<Utc>,
    /// When the prediction stops being valid
    pub valid_until: DateTime<Utc>,
    /// Supporting evidence
    #[serde(default)]
    pub evidence: HashMap<String, serde_json::Value>,
}

impl MemoryPrediction {
    /// Whether the prediction is still valid as of `now`
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.valid_until
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_tier_from_score() {
        assert_eq!(ConfidenceTier::from_score(0.05), ConfidenceTier::VeryLow);
        assert_eq!(ConfidenceTier::from_score(0.2), ConfidenceTier::Low);
        assert_eq!(ConfidenceTier::from_score(0.45), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::from_score(0.6), ConfidenceTier::High);
        assert_eq!(ConfidenceTier::from_score(0.95), ConfidenceTier::VeryHigh);
    }

    #[test]
    fn test_prediction_validity_window() {
        let now = Utc::now();
        let prediction = MemoryPrediction {
            id: "p-1".to_string(),
            predicted_ids: vec!["a".to_string()],
            kind: PredictionType::NextItem,
            tier: ConfidenceTier::Medium,
            confidence: 0.5,
            reasoning: "test".to_string(),
            context: MemoryContext::at(now),
            predicted_at: now,
            valid_until: now + Duration::hours(2),
            evidence: HashMap::new(),
        };

        assert!(prediction.is_valid(now));
        assert!(prediction.is_valid(now + Duration::minutes(119)));
        assert!(!prediction.is_valid(now + Duration::hours(3)));
    }
}
