//! Multi-factor ranking
//!
//! Every candidate receives eight independent factor scores which are folded
//! into a weighted total. The dominant factor yields the human-readable
//! retrieval reason; confidence derives from the strongest factor plus a
//! bonus for agreement between factors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::memory::{MemoryContext, MemoryItem};

use super::{RetrievalParams, RetrievalStrategy};

// ============================================================================
// RANKING FACTORS
// ============================================================================

/// The eight independent ranking signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingFactor {
    /// Embedding or token-overlap similarity to the query
    SemanticSimilarity,
    /// Similarity between query context and item context
    ContextMatch,
    /// Creation recency with an access boost
    TemporalRelevance,
    /// Access count normalized by age
    AccessFrequency,
    /// Raw importance score
    ImportanceScore,
    /// Learned per-user preference
    UserPreference,
    /// Links into the current candidate set
    RelationshipStrength,
    /// Time since last update
    ContentFreshness,
}

impl RankingFactor {
    /// All factors, in breakdown order
    pub const ALL: [RankingFactor; 8] = [
        RankingFactor::SemanticSimilarity,
        RankingFactor::ContextMatch,
        RankingFactor::TemporalRelevance,
        RankingFactor::AccessFrequency,
        RankingFactor::ImportanceScore,
        RankingFactor::UserPreference,
        RankingFactor::RelationshipStrength,
        RankingFactor::ContentFreshness,
    ];

    /// Human-readable retrieval reason when this factor dominates
    pub fn reason(&self) -> &'static str {
        match self {
            RankingFactor::SemanticSimilarity => "semantically similar content",
            RankingFactor::ContextMatch => "matching context",
            RankingFactor::TemporalRelevance => "recent or recently accessed",
            RankingFactor::AccessFrequency => "frequently accessed",
            RankingFactor::ImportanceScore => "high importance",
            RankingFactor::UserPreference => "matches user preferences",
            RankingFactor::RelationshipStrength => "related to other results",
            RankingFactor::ContentFreshness => "recently updated content",
        }
    }
}

/// Per-factor score breakdown for one candidate
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactorScores {
    /// Semantic similarity
    pub semantic: f64,
    /// Context match
    pub context: f64,
    /// Temporal relevance
    pub temporal: f64,
    /// Access frequency
    pub frequency: f64,
    /// Importance
    pub importance: f64,
    /// User preference
    pub preference: f64,
    /// Relationship strength
    pub relationship: f64,
    /// Content freshness
    pub freshness: f64,
}

impl FactorScores {
    /// Score for a single factor
    pub fn get(&self, factor: RankingFactor) -> f64 {
        match factor {
            RankingFactor::SemanticSimilarity => self.semantic,
            RankingFactor::ContextMatch => self.context,
            RankingFactor::TemporalRelevance => self.temporal,
            RankingFactor::AccessFrequency => self.frequency,
            RankingFactor::ImportanceScore => self.importance,
            RankingFactor::UserPreference => self.preference,
            RankingFactor::RelationshipStrength => self.relationship,
            RankingFactor::ContentFreshness => self.freshness,
        }
    }

    /// The highest-scoring factor and its score
    pub fn dominant(&self) -> (RankingFactor, f64) {
        let mut best = (RankingFactor::SemanticSimilarity, self.semantic);
        for factor in RankingFactor::ALL {
            let score = self.get(factor);
            if score > best.1 {
                best = (factor, score);
            }
        }
        best
    }

    /// Number of factors scoring above the given threshold
    pub fn strong_count(&self, threshold: f64) -> usize {
        RankingFactor::ALL
            .iter()
            .filter(|f| self.get(**f) > threshold)
            .count()
    }
}

// ============================================================================
// RETRIEVAL RESULT
// ============================================================================

/// A ranked item with its scoring breakdown
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalResult {
    /// The retrieved item
    pub item: MemoryItem,
    /// Weighted total score, capped at 1.0
    pub total_score: f64,
    /// Per-factor breakdown
    pub factors: FactorScores,
    /// Why this item was retrieved (dominant factor)
    pub reason: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// 1-based rank position
    pub rank: usize,
}

// ============================================================================
// FACTOR COMPUTATION
// ============================================================================

/// Similarity between two contexts
///
/// Weighted field matches (project 1.0, user 0.8, session 0.6, application
/// 0.4, environment 0.3) divided by the number of fields present on both
/// sides. Fields absent on either side do not enter the denominator.
pub fn context_similarity(a: &MemoryContext, b: &MemoryContext) -> f64 {
    let mut score = 0.0;
    let mut comparable = 0u32;

    let mut field = |left: &Option<String>, right: &Option<String>, weight: f64| {
        if let (Some(l), Some(r)) = (left, right) {
            comparable += 1;
            if l == r {
                score += weight;
            }
        }
    };

    field(&a.project, &b.project, 1.0);
    field(&a.user, &b.user, 0.8);
    field(&a.session, &b.session, 0.6);
    field(&a.application, &b.application, 0.4);
    field(&a.environment, &b.environment, 0.3);

    score / comparable.max(1) as f64
}

/// Temporal relevance: week-long creation decay with an access boost
///
/// Base `max(0.1, 1 - age_hours / (24 * 7))`, multiplied by
/// `max(1.0, 2.0 - hours_since_access / 24)` when the item has been accessed.
/// Capped at 1.0 for ranking; candidate generation uses [`temporal_raw`].
pub fn temporal_relevance(item: &MemoryItem, now: DateTime<Utc>) -> f64 {
    temporal_raw(item, now).min(1.0)
}

/// Uncapped temporal score used for candidate ordering
pub(crate) fn temporal_raw(item: &MemoryItem, now: DateTime<Utc>) -> f64 {
    let base = (1.0 - item.age_hours(now) / (24.0 * 7.0)).max(0.1);

    let boost = item
        .hours_since_access(now)
        .map(|h| (2.0 - h / 24.0).max(1.0))
        .unwrap_or(1.0);

    base * boost
}

/// Access frequency normalized by age in days, scaled to [0, 1]
pub fn frequency_score(item: &MemoryItem, now: DateTime<Utc>) -> f64 {
    let per_day = item.access_count as f64 / item.age_days(now) as f64;
    (per_day / 10.0).min(1.0)
}

/// Content freshness: three-day decay since the last update
pub fn freshness_score(item: &MemoryItem, now: DateTime<Utc>) -> f64 {
    (1.0 - item.hours_since_update(now) / (24.0 * 3.0)).max(0.1)
}

/// Fraction of the item's related links that are in the candidate set
pub fn relationship_strength(item: &MemoryItem, candidate_ids: &HashSet<&str>) -> f64 {
    if item.related.is_empty() {
        return 0.0;
    }

    let linked = item
        .related
        .iter()
        .filter(|id| candidate_ids.contains(id.as_str()))
        .count();

    (linked as f64 / item.related.len() as f64).min(1.0)
}

/// Weighted total of the eight factor scores, capped at 1.0
///
/// Semantic (0.3) and relationship (0.1) weights are fixed; the rest come
/// from [`RetrievalParams`].
pub fn total_score(scores: &FactorScores, params: &RetrievalParams) -> f64 {
    let total = scores.semantic * 0.3
        + scores.context * params.context_weight
        + scores.temporal * params.temporal_weight
        + scores.frequency * params.frequency_weight
        + scores.importance * params.importance_weight
        + scores.preference * params.personalization_strength
        + scores.relationship * 0.1
        + scores.freshness * params.freshness_weight;

    total.min(1.0)
}

/// Confidence in a ranked result
///
/// Strongest factor, plus 0.05 per factor above 0.7 (bonus capped at 0.2),
/// plus 0.1 for the Hybrid and Adaptive strategies. Capped at 1.0.
pub fn result_confidence(scores: &FactorScores, strategy: RetrievalStrategy) -> f64 {
    let (_, max_score) = scores.dominant();
    let multi_factor_bonus = (scores.strong_count(0.7) as f64 * 0.05).min(0.2);
    let strategy_bonus = match strategy {
        RetrievalStrategy::Hybrid | RetrievalStrategy::Adaptive => 0.1,
        _ => 0.0,
    };

    (max_score + multi_factor_bonus + strategy_bonus).min(1.0)
}

// ============================================================================
// TESTS
// ============================================================================
