//! Memory Engine Facade
//!
//! Wires the item store, retrieval engine, profile registry, and predictive
//! loader together and exposes the operations consumed by an outer
//! tool-invocation layer: store item, retrieve-by-query, predict-needs,
//! analyze-patterns, and get-preloaded.
//!
//! Errors are folded into the four-way taxonomy here: validation, not-found,
//! collaborator failure, and internal error. Nothing below this boundary
//! panics the process.

use std::sync::Arc;
use thiserror::Error;

use crate::memory::{MemoryContext, MemoryItem, MemoryQuery, QueryFilters};
use crate::persistence::Persistence;
use crate::predict::{
    PatternAnalysis, PredictionReport, PredictiveLoader, PredictorConfig, PredictorError,
};
use crate::retrieval::{
    ProfileStore, RetrievalEngine, RetrievalError, RetrievalParams, RetrievalResult,
};
use crate::store::{
    CleanupReport, ExportData, ImportReport, ItemStore, MergeStrategy, StoreError,
    StoreStats, UpdateFields,
};
use crate::embeddings::EmbeddingProvider;
use crate::predict::DEFAULT_PRELOAD_CAPACITY;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Engine-boundary error taxonomy
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed input, rejected before any state mutation
    #[error("Validation error: {0}")]
    Validation(String),
    /// Unknown item id
    #[error("Not found: {0}")]
    NotFound(String),
    /// An external collaborator failed
    #[error("Collaborator failure: {0}")]
    Collaborator(String),
    /// Unexpected internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Engine result type
pub type Result<T> = std::result::Result<T, EngineError>;

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => EngineError::NotFound(id),
            StoreError::Validation(msg) => EngineError::Validation(msg),
            other => EngineError::Internal(other.to_string()),
        }
    }
}

impl From<RetrievalError> for EngineError {
    fn from(e: RetrievalError) -> Self {
        match e {
            RetrievalError::Store(inner) => inner.into(),
            other => EngineError::Internal(other.to_string()),
        }
    }
}

impl From<PredictorError> for EngineError {
    fn from(e: PredictorError) -> Self {
        match e {
            PredictorError::Store(inner) => inner.into(),
            PredictorError::Retrieval(inner) => inner.into(),
            other => EngineError::Internal(other.to_string()),
        }
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Engine-wide configuration with shipped defaults
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Retrieval weights and caching parameters
    pub retrieval: RetrievalParams,
    /// Pattern-mining parameters
    pub predictor: PredictorConfig,
    /// Preload cache capacity
    pub preload_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retrieval: RetrievalParams::default(),
            predictor: PredictorConfig::default(),
            preload_capacity: DEFAULT_PRELOAD_CAPACITY,
        }
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Builder for [`MemoryEngine`]
#[derive(Default)]
pub struct MemoryEngineBuilder {
    config: EngineConfig,
    embeddings: Option<Arc<dyn EmbeddingProvider>>,
    persistence: Option<Arc<dyn Persistence>>,
}

impl MemoryEngineBuilder {
    /// Override the default configuration
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach an embedding collaborator
    pub fn with_embeddings(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embeddings = Some(provider);
        self
    }

    /// Attach a persistence collaborator
    pub fn with_persistence(mut self, persistence: Arc<dyn Persistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Assemble the engine
    pub fn build(self) -> MemoryEngine {
        let store = Arc::new(ItemStore::new(self.embeddings.clone(), self.persistence));
        let profiles = Arc::new(ProfileStore::new());

        let retriever = RetrievalEngine::new(
            store.clone(),
            self.embeddings,
            profiles.clone(),
            self.config.retrieval.clone(),
        );
        let loader = PredictiveLoader::new(
            store.clone(),
            profiles.clone(),
            self.config.predictor.clone(),
            self.config.preload_capacity,
        );

        MemoryEngine {
            store,
            profiles,
            retriever,
            loader,
        }
    }
}

// ============================================================================
// MEMORY ENGINE
// ============================================================================

/// Context-aware memory engine
pub struct MemoryEngine {
    store: Arc<ItemStore>,
    profiles: Arc<ProfileStore>,
    retriever: RetrievalEngine,
    loader: PredictiveLoader,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl MemoryEngine {
    /// Start building an engine
    pub fn builder() -> MemoryEngineBuilder {
        MemoryEngineBuilder::default()
    }

    /// Load previously persisted items, returning how many were loaded
    pub async fn init(&self) -> Result<usize> {
        Ok(self.store.load_persisted().await?)
    }

    /// Store an item and refresh predictions for its context
    pub async fn store_item(&self, item: MemoryItem) -> Result<String> {
        validate_item(&item)?;
        let id = self.store.put(item.clone()).await?;
        self.loader.refresh_for_context(&item.context)?;
        Ok(id)
    }

    /// Retrieve ranked results for a query, feeding the learning loop
    pub async fn retrieve(&self, query: &MemoryQuery) -> Result<Vec<RetrievalResult>> {
        validate_query(query)?;
        let results = self.retriever.retrieve(query).await?;
        self.loader.record_retrieval_event(query, &results).await?;
        Ok(results)
    }

    /// Predict item needs for a context
    pub async fn predict_needs(&self, context: &MemoryContext) -> Result<PredictionReport> {
        Ok(self.loader.predict_needs(context).await?)
    }

    /// Analyze access patterns and prediction performance
    pub fn analyze_patterns(
        &self,
        include_patterns: bool,
        include_predictions: bool,
    ) -> Result<PatternAnalysis> {
        Ok(self.loader.analyze_patterns(include_patterns, include_predictions)?)
    }

    /// Fetch a preloaded item from the fast cache
    pub fn preloaded(&self, item_id: &str) -> Result<Option<MemoryItem>> {
        Ok(self.loader.preloaded(item_id)?)
    }

    /// Record a direct item access for pattern learning
    pub fn record_access(&self, item_id: &str, context: &MemoryContext) -> Result<()> {
        Ok(self.loader.record_access_event(item_id, context)?)
    }

    /// Get an item by id
    pub async fn get(&self, item_id: &str) -> Result<MemoryItem> {
        Ok(self.store.get(item_id).await?)
    }

    /// Apply a partial update to an item
    pub async fn update(&self, item_id: &str, fields: UpdateFields) -> Result<MemoryItem> {
        Ok(self.store.update(item_id, fields).await?)
    }

    /// Delete an item
    pub async fn delete(&self, item_id: &str) -> Result<()> {
        Ok(self.store.delete(item_id).await?)
    }

    /// Delete expired and low-value items
    pub async fn cleanup(&self, dry_run: bool) -> Result<CleanupReport> {
        let report = self.store.cleanup(dry_run).await?;
        if !dry_run {
            self.store.persist_stats().await?;
        }
        Ok(report)
    }

    /// Aggregate store statistics
    pub fn statistics(&self) -> Result<StoreStats> {
        Ok(self.store.statistics()?)
    }

    /// Export items, optionally filtered
    pub fn export_items(&self, filters: Option<&QueryFilters>) -> Result<ExportData> {
        Ok(self.store.export_items(filters)?)
    }

    /// Import items under a merge strategy
    pub async fn import_items(
        &self,
        data: ExportData,
        strategy: MergeStrategy,
    ) -> Result<ImportReport> {
        Ok(self.store.import_items(data, strategy).await?)
    }

    /// The underlying item store
    pub fn store(&self) -> &Arc<ItemStore> {
        &self.store
    }

    /// The profile registry
    pub fn profiles(&self) -> &Arc<ProfileStore> {
        &self.profiles
    }

    /// The retrieval engine
    pub fn retriever(&self) -> &RetrievalEngine {
        &self.retriever
    }

    /// The predictive loader
    pub fn loader(&self) -> &PredictiveLoader {
        &self.loader
    }
}

// ============================================================================
// VALIDATION
// ============================================================================

fn validate_item(item: &MemoryItem) -> Result<()> {
    if item.content.trim().is_empty() {
        return Err(EngineError::Validation(
            "item content must not be empty".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&item.importance) {
        return Err(EngineError::Validation(
            "importance must be within [0, 1]".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&item.confidence) {
        return Err(EngineError::Validation(
            "confidence must be within [0, 1]".to_string(),
        ));
    }
    Ok(())
}

fn validate_query(query: &MemoryQuery) -> Result<()> {
    if query.max_results == 0 {
        return Err(EngineError::Validation(
            "maxResults must be at least 1".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&query.similarity_threshold) {
        return Err(EngineError::Validation(
            "similarityThreshold must be within [0, 1]".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&query.filters.min_importance) {
        return Err(EngineError::Validation(
            "minImportance must be within [0, 1]".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryType;
    use crate::retrieval::RetrievalStrategy;

    fn item_for(user: &str, content: &str) -> MemoryItem {
        MemoryItem::new(content, MemoryType::Text)
            .with_context(MemoryContext::for_project_user("atlas", user))
    }

    #[tokio::test]
    async fn test_store_and_get() {
        let engine = MemoryEngine::default();
        let id = engine
            .store_item(item_for("alice", "facade roundtrip"))
            .await
            .unwrap();

        let loaded = engine.get(&id).await.unwrap();
        assert_eq!(loaded.content, "facade roundtrip");
    }

    #[tokio::test]
    async fn test_validation_rejected_before_mutation() {
        let engine = MemoryEngine::default();

        let empty = MemoryItem::new(" ", MemoryType::Text);
        assert!(matches!(
            engine.store_item(empty).await,
            Err(EngineError::Validation(_))
        ));

        let mut bad_importance = item_for("alice", "content");
        bad_importance.importance = 1.5;
        assert!(matches!(
            engine.store_item(bad_importance).await,
            Err(EngineError::Validation(_))
        ));

        assert_eq!(engine.statistics().unwrap().total_items, 0);
    }

    #[tokio::test]
    async fn test_invalid_query_rejected() {
        let engine = MemoryEngine::default();

        let mut query = MemoryQuery::new("q");
        query.max_results = 0;
        assert!(matches!(
            engine.retrieve(&query).await,
            Err(EngineError::Validation(_))
        ));

        let mut query = MemoryQuery::new("q");
        query.similarity_threshold = 2.0;
        assert!(matches!(
            engine.retrieve(&query).await,
            Err(EngineError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_not_found_taxonomy() {
        let engine = MemoryEngine::default();
        assert!(matches!(
            engine.get("missing").await,
            Err(EngineError::NotFound(_))
        ));
        assert!(matches!(
            engine.delete("missing").await,
            Err(EngineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_retrieve_feeds_prediction_loop() {
        let engine = MemoryEngine::default();
        let context = MemoryContext::for_project_user("atlas", "alice");

        for content in ["first note", "second note", "third note"] {
            engine.store_item(item_for("alice", content)).await.unwrap();
        }

        let query = MemoryQuery::new("note")
            .with_context(context.clone())
            .with_strategy(RetrievalStrategy::Importance);
        let results = engine.retrieve(&query).await.unwrap();
        assert!(!results.is_empty());

        let report = engine.predict_needs(&context).await.unwrap();
        assert_eq!(report.user_id.as_deref(), Some("alice"));

        let analysis = engine.analyze_patterns(true, true).unwrap();
        assert!(analysis.temporal.contains_key("alice"));
    }
}
