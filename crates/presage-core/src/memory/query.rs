//! Query types for memory retrieval
//!
//! A [`MemoryQuery`] carries the query text, optional situational context,
//! hard filters, a result budget, a similarity threshold, and an optional
//! explicit strategy. Hard filters are evaluated before any strategy-specific
//! scoring.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::retrieval::RetrievalStrategy;

use super::item::{AccessLevel, MemoryContext, MemoryItem, MemoryType};

// ============================================================================
// TIME RANGE
// ============================================================================

/// Inclusive creation-time window for query filtering
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    /// Window start (inclusive)
    pub start: DateTime<Utc>,
    /// Window end (inclusive)
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Create a new time range
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Whether the given instant falls within the range
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

// ============================================================================
// QUERY FILTERS
// ============================================================================

/// Hard filters applied before candidate scoring
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryFilters {
    /// Allowed memory types (empty = all)
    pub kinds: Vec<MemoryType>,
    /// Required tags (any match qualifies; empty = no constraint)
    pub tags: Vec<String>,
    /// Importance floor
    pub min_importance: f64,
    /// Include expired items
    pub include_expired: bool,
    /// Creation-time window
    pub time_range: Option<TimeRange>,
    /// Required access level
    pub access_level: Option<AccessLevel>,
}

impl QueryFilters {
    /// Whether the item passes every filter as of `now`
    pub fn matches(&self, item: &MemoryItem, now: DateTime<Utc>) -> bool {
        if !self.include_expired && item.is_expired(now) {
            return false;
        }

        if !self.kinds.is_empty() && !self.kinds.contains(&item.kind) {
            return false;
        }

        if !self.tags.is_empty() && !self.tags.iter().any(|t| item.tags.contains(t)) {
            return false;
        }

        if item.importance < self.min_importance {
            return false;
        }

        if let Some(range) = &self.time_range {
            if !range.contains(item.created_at) {
                return false;
            }
        }

        if let Some(level) = self.access_level {
            if item.access_level != level {
                return false;
            }
        }

        true
    }
}

// ============================================================================
// MEMORY QUERY
// ============================================================================

/// Query specification for memory retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryQuery {
    /// Query text
    pub text: String,
    /// Situational context of the caller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<MemoryContext>,
    /// Hard filters
    #[serde(default)]
    pub filters: QueryFilters,
    /// Maximum results to return
    pub max_results: usize,
    /// Minimum similarity for semantic candidates
    pub similarity_threshold: f64,
    /// Explicit strategy; None lets the engine pick one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<RetrievalStrategy>,
}

impl Default for MemoryQuery {
    fn default() -> Self {
        Self {
            text: String::new(),
            context: None,
            filters: QueryFilters::default(),
            max_results: 10,
            similarity_threshold: 0.5,
            strategy: None,
        }
    }
}

impl MemoryQuery {
    /// Create a query over the given text with default parameters
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Builder-style context assignment
    pub fn with_context(mut self, context: MemoryContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Builder-style strategy assignment
    pub fn with_strategy(mut self, strategy: RetrievalStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Builder-style result-budget assignment
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Builder-style similarity-threshold assignment
    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Whether the item passes every hard filter as of `now`
    pub fn matches(&self, item: &MemoryItem, now: DateTime<Utc>) -> bool {
        self.filters.matches(item, now)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn item_at(now: DateTime<Utc>) -> MemoryItem {
        MemoryItem::with_id_at("i-1", "some content", MemoryType::Code, now)
            .with_tags(["rust", "async"])
            .with_importance(0.6)
    }

    #[test]
    fn test_empty_filters_match_everything() {
        let now = Utc::now();
        let query = MemoryQuery::new("anything");
        assert!(query.matches(&item_at(now), now));
    }

    #[test]
    fn test_kind_filter() {
        let now = Utc::now();
        let mut query = MemoryQuery::new("q");
        query.filters.kinds = vec![MemoryType::Document];
        assert!(!query.matches(&item_at(now), now));

        query.filters.kinds = vec![MemoryType::Document, MemoryType::Code];
        assert!(query.matches(&item_at(now), now));
    }

    #[test]
    fn test_tag_filter_any_match() {
        let now = Utc::now();
        let mut query = MemoryQuery::new("q");
        query.filters.tags = vec!["python".to_string()];
        assert!(!query.matches(&item_at(now), now));

        query.filters.tags = vec!["python".to_string(), "rust".to_string()];
        assert!(query.matches(&item_at(now), now));
    }

    #[test]
    fn test_importance_floor() {
        let now = Utc::now();
        let mut query = MemoryQuery::new("q");
        query.filters.min_importance = 0.7;
        assert!(!query.matches(&item_at(now), now));

        query.filters.min_importance = 0.5;
        assert!(query.matches(&item_at(now), now));
    }

    #[test]
    fn test_expired_excluded_by_default() {
        let now = Utc::now();
        let mut item = item_at(now);
        item.expires_at = Some(now - Duration::hours(1));

        let mut query = MemoryQuery::new("q");
        assert!(!query.matches(&item, now));

        query.filters.include_expired = true;
        assert!(query.matches(&item, now));
    }

    #[test]
    fn test_time_range_filter() {
        let now = Utc::now();
        let item = item_at(now - Duration::days(10));

        let mut query = MemoryQuery::new("q");
        query.filters.time_range =
            Some(TimeRange::new(now - Duration::days(5), now));
        assert!(!query.matches(&item, now));

        query.filters.time_range =
            Some(TimeRange::new(now - Duration::days(20), now));
        assert!(query.matches(&item, now));
    }
}
