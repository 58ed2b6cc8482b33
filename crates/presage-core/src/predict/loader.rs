//! Predictive Loader
//!
//! Records access events, regenerates predictions after every retrieval,
//! tracks prediction accuracy, preloads predicted items into the bounded
//! cache, and produces the pattern-analysis report.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use crate::memory::{MemoryContext, MemoryItem, MemoryQuery};
use crate::retrieval::{ProfileStore, RetrievalResult};
use crate::store::{ItemStore, StoreError};

use super::patterns::{PatternPredictor, PredictorConfig};
use super::preload::{PreloadCache, PreloadStats};
use super::{MemoryPrediction, PredictorError, Result};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Per-user ring of most recent accessed item ids
const RECENT_ACCESS_WINDOW: usize = 10;

/// How many top predictions feed the preload cache
const PRELOAD_TOP_PREDICTIONS: usize = 10;

/// Overlap ratio above which a prediction counts as accurate
const ACCURACY_THRESHOLD: f64 = 0.5;

/// How many recent accesses seed related-item predictions
const RELATED_SEED_COUNT: usize = 3;

// ============================================================================
// REPORT TYPES
// ============================================================================

/// Loader counters
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderMetrics {
    /// Predictions emitted
    pub total_predictions: u64,
    /// Predictions later confirmed by retrievals
    pub accurate_predictions: u64,
    /// Preload cache hits
    pub cache_hits: u64,
    /// Preload cache misses
    pub cache_misses: u64,
}

/// Result of a predict-needs request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionReport {
    /// Ranked predictions, highest confidence first
    pub predictions: Vec<MemoryPrediction>,
    /// Number of predictions returned
    pub total: usize,
    /// User the predictions are for, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// The user's recent accesses used as pattern prefixes
    pub recent_accesses: Vec<String>,
    /// How the predictions were produced
    pub reasoning: String,
}

/// Per-user access distribution over hours and weekdays
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporalDistribution {
    /// Accesses per hour of day
    pub hour_distribution: BTreeMap<u32, usize>,
    /// Accesses per weekday (0 = Monday)
    pub day_distribution: BTreeMap<u32, usize>,
    /// Total recorded accesses in the window
    pub total_accesses: usize,
}

/// Per-context-key association summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextPatternSummary {
    /// Distinct items associated with the key
    pub item_count: usize,
    /// Sum of association counts
    pub total_accesses: f64,
    /// Top items by association strength
    pub top_items: Vec<(String, f64)>,
}

/// Per-user recent-sequence summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceSummary {
    /// Sequence length
    pub length: usize,
    /// Distinct items in the sequence
    pub unique_items: usize,
    /// Most recent item ids, oldest first
    pub recent: Vec<String>,
}

/// Aggregate prediction performance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionPerformance {
    /// Predictions emitted
    pub total_predictions: u64,
    /// Predictions confirmed by later retrievals
    pub accurate_predictions: u64,
    /// Confirmed / emitted
    pub accuracy_rate: f64,
    /// Outstanding predictions per type
    pub by_type: BTreeMap<String, usize>,
    /// Outstanding predictions per confidence tier
    pub by_tier: BTreeMap<String, usize>,
    /// Mean confidence of outstanding predictions
    pub mean_confidence: f64,
}

/// Full pattern-analysis report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternAnalysis {
    /// When the analysis ran
    pub at: DateTime<Utc>,
    /// Per-user temporal distributions
    pub temporal: HashMap<String, TemporalDistribution>,
    /// Per-context-key association summaries
    pub contexts: HashMap<String, ContextPatternSummary>,
    /// Per-user sequence summaries
    pub sequences: HashMap<String, SequenceSummary>,
    /// Prediction performance, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predictions: Option<PredictionPerformance>,
    /// Preload cache performance
    pub cache: PreloadStats,
    /// Loader counters
    pub metrics: LoaderMetrics,
}

// ============================================================================
// LOADER STATE
// ============================================================================

#[derive(Default)]
struct LoaderState {
    recent_accesses: HashMap<String, VecDeque<String>>,
    predictions: Vec<MemoryPrediction>,
    accuracy: HashMap<String, f64>,
}

// ============================================================================
// PREDICTIVE LOADER
// ============================================================================

/// Orchestrates pattern learning, prediction, and preloading
pub struct PredictiveLoader {
    store: Arc<ItemStore>,
    profiles: Arc<ProfileStore>,
    predictor: PatternPredictor,
    cache: PreloadCache,
    state: RwLock<LoaderState>,
    metrics: RwLock<LoaderMetrics>,
}

impl PredictiveLoader {
    /// Create a loader over the given store and profile registry
    pub fn new(
        store: Arc<ItemStore>,
        profiles: Arc<ProfileStore>,
        config: PredictorConfig,
        preload_capacity: usize,
    ) -> Self {
        Self {
            store,
            profiles,
            predictor: PatternPredictor::new(config),
            cache: PreloadCache::new(preload_capacity),
            state: RwLock::new(LoaderState::default()),
            metrics: RwLock::new(LoaderMetrics::default()),
        }
    }

    /// The underlying pattern predictor
    pub fn predictor(&self) -> &PatternPredictor {
        &self.predictor
    }

    /// Learn from a finished retrieval, then refresh predictions and preload
    pub async fn record_retrieval_event(
        &self,
        query: &MemoryQuery,
        results: &[RetrievalResult],
    ) -> Result<()> {
        let Some(context) = &query.context else {
            return Ok(());
        };
        let Some(user_id) = context.user.clone() else {
            return Ok(());
        };
        let now = Utc::now();

        for result in results {
            self.note_access(&user_id, &result.item.id)?;
            self.predictor
                .learn_from_access(&result.item.id, context, now, &user_id)?;
        }

        self.sync_similar_users(&user_id, now)?;

        let retrieved: Vec<&str> = results.iter().map(|r| r.item.id.as_str()).collect();
        self.check_prediction_accuracy(&retrieved, now)?;

        self.refresh_predictions(context, &user_id, now)?;
        self.preload_top(now).await?;

        Ok(())
    }

    /// Regenerate predictions after a storage event in this context
    pub fn refresh_for_context(&self, context: &MemoryContext) -> Result<()> {
        if let Some(user_id) = &context.user {
            self.refresh_predictions(context, user_id, Utc::now())?;
        }
        Ok(())
    }

    /// Learn from a direct item access
    pub fn record_access_event(&self, item_id: &str, context: &MemoryContext) -> Result<()> {
        let Some(user_id) = context.user.clone() else {
            return Ok(());
        };

        self.note_access(&user_id, item_id)?;
        self.predictor
            .learn_from_access(item_id, context, Utc::now(), &user_id)?;
        self.sync_similar_users(&user_id, Utc::now())?;
        Ok(())
    }

    /// Predict item needs for a context
    pub async fn predict_needs(&self, context: &MemoryContext) -> Result<PredictionReport> {
        let now = Utc::now();
        let Some(user_id) = context.user.clone() else {
            return Ok(PredictionReport {
                predictions: Vec::new(),
                total: 0,
                user_id: None,
                recent_accesses: Vec::new(),
                reasoning: "No user context provided".to_string(),
            });
        };

        let recent = self.recent_for(&user_id)?;
        let predictions = self.generate_predictions(context, &user_id, &recent, now)?;

        {
            let mut metrics = self.write_metrics()?;
            metrics.total_predictions += predictions.len() as u64;
        }
        {
            let mut state = self.write_state()?;
            state.predictions = predictions.clone();
        }

        self.preload_top(now).await?;

        Ok(PredictionReport {
            total: predictions.len(),
            predictions,
            user_id: Some(user_id),
            recent_accesses: recent,
            reasoning: "Predictions based on learned patterns and context".to_string(),
        })
    }

    /// Fetch a preloaded item, counting the hit or miss
    pub fn preloaded(&self, item_id: &str) -> Result<Option<MemoryItem>> {
        let item = self.cache.get(item_id)?;
        let mut metrics = self.write_metrics()?;
        match item {
            Some(item) => {
                metrics.cache_hits += 1;
                Ok(Some(item))
            }
            None => {
                metrics.cache_misses += 1;
                Ok(None)
            }
        }
    }

    /// Analyze access patterns and prediction performance
    pub fn analyze_patterns(
        &self,
        include_patterns: bool,
        include_predictions: bool,
    ) -> Result<PatternAnalysis> {
        let now = Utc::now();
        let mut analysis = PatternAnalysis {
            at: now,
            temporal: HashMap::new(),
            contexts: HashMap::new(),
            sequences: HashMap::new(),
            predictions: None,
            cache: self.cache.stats()?,
            metrics: *self.read_metrics()?,
        };

        if include_patterns {
            for (user, events) in self.predictor.events_snapshot()? {
                let mut distribution = TemporalDistribution {
                    total_accesses: events.len(),
                    ..Default::default()
                };
                for (at, _) in &events {
                    *distribution.hour_distribution.entry(at.hour()).or_default() += 1;
                    *distribution
                        .day_distribution
                        .entry(at.weekday().num_days_from_monday())
                        .or_default() += 1;
                }
                analysis.temporal.insert(user, distribution);
            }

            for (key, table) in self.predictor.associations_snapshot()? {
                let mut top: Vec<(String, f64)> =
                    table.iter().map(|(id, c)| (id.clone(), *c)).collect();
                top.sort_by(|a, b| {
                    b.1.partial_cmp(&a.1)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| a.0.cmp(&b.0))
                });
                top.truncate(5);

                analysis.contexts.insert(
                    key,
                    ContextPatternSummary {
                        item_count: table.len(),
                        total_accesses: table.values().sum(),
                        top_items: top,
                    },
                );
            }

            for (user, sequence) in self.predictor.sequences_snapshot()? {
                let unique: std::collections::HashSet<&String> = sequence.iter().collect();
                analysis.sequences.insert(
                    user,
                    SequenceSummary {
                        length: sequence.len(),
                        unique_items: unique.len(),
                        recent: sequence.iter().rev().take(5).rev().cloned().collect(),
                    },
                );
            }
        }

        if include_predictions {
            let state = self.read_state()?;
            let metrics = self.read_metrics()?;
            let outstanding: Vec<&MemoryPrediction> = state
                .predictions
                .iter()
                .filter(|p| p.is_valid(now))
                .collect();

            let mut performance = PredictionPerformance {
                total_predictions: metrics.total_predictions,
                accurate_predictions: metrics.accurate_predictions,
                ..Default::default()
            };
            if metrics.total_predictions > 0 {
                performance.accuracy_rate =
                    metrics.accurate_predictions as f64 / metrics.total_predictions as f64;
            }
            for prediction in &outstanding {
                *performance
                    .by_type
                    .entry(prediction.kind.as_str().to_string())
                    .or_default() += 1;
                *performance
                    .by_tier
                    .entry(prediction.tier.as_str().to_string())
                    .or_default() += 1;
            }
            if !outstanding.is_empty() {
                performance.mean_confidence = outstanding
                    .iter()
                    .map(|p| p.confidence)
                    .sum::<f64>()
                    / outstanding.len() as f64;
            }

            analysis.predictions = Some(performance);
        }

        Ok(analysis)
    }

    /// Outstanding valid predictions
    pub fn current_predictions(&self) -> Result<Vec<MemoryPrediction>> {
        let now = Utc::now();
        let state = self.read_state()?;
        Ok(state
            .predictions
            .iter()
            .filter(|p| p.is_valid(now))
            .cloned()
            .collect())
    }

    /// Recorded accuracy per confirmed prediction id
    pub fn prediction_accuracy(&self) -> Result<HashMap<String, f64>> {
        Ok(self.read_state()?.accuracy.clone())
    }

    // ========================================================================
    // Private helpers
    // ========================================================================

    fn generate_predictions(
        &self,
        context: &MemoryContext,
        user_id: &str,
        recent: &[String],
        now: DateTime<Utc>,
    ) -> Result<Vec<MemoryPrediction>> {
        let mut predictions = self.predictor.predict(context, user_id, recent, now)?;

        for seed in recent.iter().rev().take(RELATED_SEED_COUNT) {
            predictions.extend(self.predictor.predict_related(seed, context, now)?);
        }

        predictions.extend(self.predictor.predict_seasonal(context, user_id, now)?);

        Ok(self.predictor.rank_predictions(predictions))
    }

    fn refresh_predictions(
        &self,
        context: &MemoryContext,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let recent = self.recent_for(user_id)?;
        let predictions = self.generate_predictions(context, user_id, &recent, now)?;

        let mut metrics = self.write_metrics()?;
        metrics.total_predictions += predictions.len() as u64;
        drop(metrics);

        let mut state = self.write_state()?;
        state.predictions = predictions;
        Ok(())
    }

    /// Insert every uncached item of the top predictions into the cache
    async fn preload_top(&self, now: DateTime<Utc>) -> Result<usize> {
        let top: Vec<MemoryPrediction> = {
            let state = self.read_state()?;
            let mut valid: Vec<&MemoryPrediction> = state
                .predictions
                .iter()
                .filter(|p| p.is_valid(now))
                .collect();
            valid.sort_by(|a, b| {
                b.confidence
                    .partial_cmp(&a.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            valid
                .into_iter()
                .take(PRELOAD_TOP_PREDICTIONS)
                .cloned()
                .collect()
        };

        let mut loaded = 0;
        for prediction in top {
            for item_id in &prediction.predicted_ids {
                if self.cache.contains(item_id)? {
                    continue;
                }

                match self.store.get(item_id).await {
                    Ok(item) => {
                        self.cache.insert(item, now)?;
                        loaded += 1;
                    }
                    Err(StoreError::NotFound(_)) => {
                        tracing::debug!(id = %item_id, "Predicted item no longer exists");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        if loaded > 0 {
            tracing::debug!(loaded, "Preloaded predicted items");
        }
        Ok(loaded)
    }

    fn check_prediction_accuracy(
        &self,
        retrieved_ids: &[&str],
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut confirmed = 0u64;
        {
            let mut state = self.write_state()?;
            let LoaderState {
                predictions,
                accuracy,
                ..
            } = &mut *state;

            for prediction in predictions.iter().filter(|p| p.is_valid(now)) {
                let overlap = prediction
                    .predicted_ids
                    .iter()
                    .filter(|id| retrieved_ids.contains(&id.as_str()))
                    .count();
                if overlap == 0 {
                    continue;
                }

                let ratio = overlap as f64 / prediction.predicted_ids.len() as f64;
                accuracy.insert(prediction.id.clone(), ratio);
                if ratio > ACCURACY_THRESHOLD {
                    confirmed += 1;
                }
            }
        }

        if confirmed > 0 {
            let mut metrics = self.write_metrics()?;
            metrics.accurate_predictions += confirmed;
        }
        Ok(())
    }

    fn note_access(&self, user_id: &str, item_id: &str) -> Result<()> {
        let mut state = self.write_state()?;
        let recent = state
            .recent_accesses
            .entry(user_id.to_string())
            .or_default();
        recent.push_back(item_id.to_string());
        while recent.len() > RECENT_ACCESS_WINDOW {
            recent.pop_front();
        }
        Ok(())
    }

    fn recent_for(&self, user_id: &str) -> Result<Vec<String>> {
        let state = self.read_state()?;
        Ok(state
            .recent_accesses
            .get(user_id)
            .map(|r| r.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn sync_similar_users(&self, user_id: &str, now: DateTime<Utc>) -> Result<()> {
        let similar = self.predictor.similar_users(user_id)?;
        self.profiles.set_similar_users(user_id, similar, now)?;
        Ok(())
    }

    fn read_state(&self) -> Result<std::sync::RwLockReadGuard<'_, LoaderState>> {
        self.state
            .read()
            .map_err(|e| PredictorError::Lock(e.to_string()))
    }

    fn write_state(&self) -> Result<std::sync::RwLockWriteGuard<'_, LoaderState>> {
        self.state
            .write()
            .map_err(|e| PredictorError::Lock(e.to_string()))
    }

    fn read_metrics(&self) -> Result<std::sync::RwLockReadGuard<'_, LoaderMetrics>> {
        self.metrics
            .read()
            .map_err(|e| PredictorError::Lock(e.to_string()))
    }

    fn write_metrics(&self) -> Result<std::sync::RwLockWriteGuard<'_, LoaderMetrics>> {
        self.metrics
            .write()
            .map_err(|e| PredictorError::Lock(e.to_string()))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryType;

    fn loader() -> (Arc<ItemStore>, PredictiveLoader) {
        let store = Arc::new(ItemStore::new(None, None));
        let profiles = Arc::new(ProfileStore::new());
        let loader = PredictiveLoader::new(
            store.clone(),
            profiles,
            PredictorConfig::default(),
            16,
        );
        (store, loader)
    }

    async fn seed_items(store: &ItemStore, ids: &[&str]) {
        for id in ids {
            let mut item = MemoryItem::with_id_at(
                *id,
                format!("content for {id}"),
                MemoryType::Text,
                Utc::now(),
            );
            item.context = MemoryContext::for_project_user("atlas", "alice");
            store.put(item).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_predict_needs_without_user_is_empty() {
        let (_, loader) = loader();
        let report = loader
            .predict_needs(&MemoryContext::at(Utc::now()))
            .await
            .unwrap();
        assert_eq!(report.total, 0);
        assert!(report.user_id.is_none());
        assert_eq!(report.reasoning, "No user context provided");
    }

    #[tokio::test]
    async fn test_sequence_learning_and_prediction() {
        let (store, loader) = loader();
        seed_items(&store, &["a", "b", "c"]).await;
        let context = MemoryContext::for_project_user("atlas", "alice");

        // Alice accesses A -> B -> C, then again A -> B
        for id in ["a", "b", "c", "a", "b"] {
            loader.record_access_event(id, &context).unwrap();
        }

        let report = loader.predict_needs(&context).await.unwrap();
        assert!(report.total > 0);

        let predicted: Vec<&String> = report
            .predictions
            .iter()
            .flat_map(|p| p.predicted_ids.iter())
            .collect();
        assert!(predicted.contains(&&"c".to_string()));
    }

    #[tokio::test]
    async fn test_preload_after_prediction() {
        let (store, loader) = loader();
        seed_items(&store, &["a", "b", "c"]).await;
        let context = MemoryContext::for_project_user("atlas", "alice");

        for id in ["a", "b", "c", "a", "b"] {
            loader.record_access_event(id, &context).unwrap();
        }
        loader.predict_needs(&context).await.unwrap();

        // At least one predicted item must now be served from the cache
        let hit = ["a", "b", "c"]
            .iter()
            .any(|id| loader.preloaded(id).unwrap().is_some());
        assert!(hit);

        let metrics = *loader.read_metrics().unwrap();
        assert!(metrics.cache_hits + metrics.cache_misses > 0);
    }

    #[tokio::test]
    async fn test_analyze_patterns_report() {
        let (store, loader) = loader();
        seed_items(&store, &["a", "b"]).await;
        let context = MemoryContext::for_project_user("atlas", "alice");

        loader.record_access_event("a", &context).unwrap();
        loader.record_access_event("b", &context).unwrap();
        loader.predict_needs(&context).await.unwrap();

        let analysis = loader.analyze_patterns(true, true).unwrap();

        let alice = analysis.temporal.get("alice").expect("alice distribution");
        assert_eq!(alice.total_accesses, 2);

        let key = context.context_key();
        let summary = analysis.contexts.get(&key).expect("context summary");
        assert_eq!(summary.item_count, 2);

        assert!(analysis.predictions.is_some());
        assert_eq!(analysis.cache.capacity, 16);
    }

    #[tokio::test]
    async fn test_accuracy_confirmation() {
        let (store, loader) = loader();
        seed_items(&store, &["a", "b", "c"]).await;
        let context = MemoryContext::for_project_user("atlas", "alice");

        for id in ["a", "b", "c", "a", "b"] {
            loader.record_access_event(id, &context).unwrap();
        }
        let report = loader.predict_needs(&context).await.unwrap();
        assert!(report.total > 0);

        // Confirm every outstanding prediction by "retrieving" its ids
        let predicted: Vec<String> = report
            .predictions
            .iter()
            .flat_map(|p| p.predicted_ids.iter().cloned())
            .collect();
        let as_refs: Vec<&str> = predicted.iter().map(String::as_str).collect();
        loader.check_prediction_accuracy(&as_refs, Utc::now()).unwrap();

        let metrics = *loader.read_metrics().unwrap();
        assert!(metrics.accurate_predictions > 0);
        assert!(!loader.prediction_accuracy().unwrap().is_empty());
    }
}
