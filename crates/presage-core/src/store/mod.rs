//! Item Store
//!
//! Owns the canonical item map plus two secondary indexes (tag -> ids,
//! context-key -> ids) that are updated in the same critical section as every
//! put/update/delete, so they never diverge from the canonical map.
//!
//! Reads that return an item update its last-access timestamp and increment
//! its access counter. Collaborator failures (embedding, persistence) are
//! logged and degrade to in-memory behavior.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};
use thiserror::Error;

use crate::embeddings::{cosine_similarity, token_overlap, EmbeddingProvider};
use crate::memory::{MemoryContext, MemoryItem, MemoryQuery, QueryFilters};
use crate::persistence::Persistence;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Item store error type
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StoreError {
    /// Item not found
    #[error("Item not found: {0}")]
    NotFound(String),
    /// Rejected before any state mutation
    #[error("Validation error: {0}")]
    Validation(String),
    /// Lock poisoned during concurrent access
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

/// Item store result type
pub type Result<T> = std::result::Result<T, StoreError>;

// ============================================================================
// STATISTICS
// ============================================================================

/// Item counts bucketed by age
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeBuckets {
    /// Created within the last 24 hours
    pub today: usize,
    /// Created within the last 7 days
    pub this_week: usize,
    /// Created within the last 30 days
    pub this_month: usize,
    /// Older than 30 days
    pub older: usize,
}

/// Item counts bucketed by importance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportanceBuckets {
    /// Importance >= 0.8
    pub high: usize,
    /// Importance in [0.5, 0.8)
    pub medium: usize,
    /// Importance < 0.5
    pub low: usize,
}

/// Aggregate statistics over the stored item set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    /// Total stored items
    pub total_items: usize,
    /// Counts per memory type
    pub by_kind: BTreeMap<String, usize>,
    /// Counts per tag
    pub by_tag: BTreeMap<String, usize>,
    /// Counts per context key (`project:X`, `user:Y`)
    pub by_context: BTreeMap<String, usize>,
    /// Counts per age bucket
    pub age_buckets: AgeBuckets,
    /// Counts per importance bucket
    pub importance_buckets: ImportanceBuckets,
    /// Total search invocations
    pub total_retrievals: u64,
    /// Mean similarity of the most recent search's results
    pub average_similarity: f64,
    /// When the last destructive cleanup ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_cleanup: Option<DateTime<Utc>>,
}

// ============================================================================
// UPDATE / CLEANUP / EXPORT TYPES
// ============================================================================

/// Partial update applied to an existing item
///
/// A content change recomputes the fingerprint and regenerates the embedding.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateFields {
    /// Replacement content
    pub content: Option<String>,
    /// Replacement context
    pub context: Option<MemoryContext>,
    /// Replacement tag set
    pub tags: Option<Vec<String>>,
    /// Replacement importance (clamped to [0, 1])
    pub importance: Option<f64>,
    /// Replacement confidence (clamped to [0, 1])
    pub confidence: Option<f64>,
    /// Replacement expiry
    pub expires_at: Option<DateTime<Utc>>,
}

/// Why a cleanup pass selected an item for deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupReason {
    /// Past its expiry timestamp
    Expired,
    /// Low importance, old, and rarely accessed
    LowValue,
}

/// A single cleanup deletion candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupCandidate {
    /// Item id
    pub id: String,
    /// Selection reason
    pub reason: CleanupReason,
    /// Importance at selection time
    pub importance: f64,
    /// Age in hours at selection time
    pub age_hours: f64,
    /// Access count at selection time
    pub access_count: u32,
}

/// Result of a cleanup pass
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    /// Items selected for deletion
    pub candidates: Vec<CleanupCandidate>,
    /// Items actually deleted (0 on dry runs)
    pub deleted: usize,
    /// Items remaining after the pass
    pub remaining: usize,
}

/// How imported items merge with existing ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Store everything, overwriting on id collision
    #[default]
    Append,
    /// Skip items whose id already exists
    SkipExisting,
    /// Alias of Append, kept for symmetric call sites
    Overwrite,
}

/// Exported snapshot of the item set
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    /// When the export was taken
    pub exported_at: DateTime<Utc>,
    /// Number of exported items
    pub item_count: usize,
    /// The items themselves
    pub items: Vec<MemoryItem>,
}

/// Result of an import
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    /// Items stored
    pub imported: usize,
    /// Items skipped by the merge strategy
    pub skipped: usize,
    /// Items rejected (empty content)
    pub errors: usize,
    /// Total items after the import
    pub total_items: usize,
}

// ============================================================================
// ITEM STORE
// ============================================================================

/// Minimum similarity for an item to appear in plain search results
const SEARCH_FLOOR: f64 = 0.1;

#[derive(Default)]
struct StoreState {
    items: HashMap<String, MemoryItem>,
    tag_index: HashMap<String, HashSet<String>>,
    context_index: HashMap<String, HashSet<String>>,
    total_retrievals: u64,
    average_similarity: f64,
    last_cleanup: Option<DateTime<Utc>>,
}

impl StoreState {
    fn index_item(&mut self, item: &MemoryItem) {
        for tag in &item.tags {
            self.tag_index
                .entry(tag.clone())
                .or_default()
                .insert(item.id.clone());
        }

        for key in context_index_keys(&item.context) {
            self.context_index
                .entry(key)
                .or_default()
                .insert(item.id.clone());
        }
    }

    fn unindex_item(&mut self, item: &MemoryItem) {
        for tag in &item.tags {
            if let Some(ids) = self.tag_index.get_mut(tag) {
                ids.remove(&item.id);
                if ids.is_empty() {
                    self.tag_index.remove(tag);
                }
            }
        }

        for key in context_index_keys(&item.context) {
            if let Some(ids) = self.context_index.get_mut(&key) {
                ids.remove(&item.id);
                if ids.is_empty() {
                    self.context_index.remove(&key);
                }
            }
        }
    }
}

fn context_index_keys(context: &MemoryContext) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(project) = &context.project {
        keys.push(format!("project:{project}"));
    }
    if let Some(user) = &context.user {
        keys.push(format!("user:{user}"));
    }
    keys
}

/// In-memory item store with secondary indexes and collaborator hooks
pub struct ItemStore {
    state: RwLock<StoreState>,
    embeddings: Option<Arc<dyn EmbeddingProvider>>,
    persistence: Option<Arc<dyn Persistence>>,
}

impl ItemStore {
    /// Create a store with optional embedding and persistence collaborators
    pub fn new(
        embeddings: Option<Arc<dyn EmbeddingProvider>>,
        persistence: Option<Arc<dyn Persistence>>,
    ) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            embeddings,
            persistence,
        }
    }

    /// Load previously persisted items into memory
    ///
    /// Returns the number of items loaded. A missing or failing persistence
    /// collaborator loads nothing.
    pub async fn load_persisted(&self) -> Result<usize> {
        let Some(persistence) = &self.persistence else {
            return Ok(0);
        };

        let items = match persistence.load_items().await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!("Failed to load persisted items: {}", e);
                return Ok(0);
            }
        };

        let count = items.len();
        let mut state = self.write_state()?;
        for item in items {
            state.index_item(&item);
            state.items.insert(item.id.clone(), item);
        }

        tracing::info!(count, "Loaded persisted items");
        Ok(count)
    }

    /// Store an item, generating its embedding when a provider is attached
    ///
    /// Fails on empty content. The fingerprint is always recomputed from the
    /// content being stored.
    pub async fn put(&self, mut item: MemoryItem) -> Result<String> {
        if item.content.trim().is_empty() {
            return Err(StoreError::Validation(
                "item content must not be empty".to_string(),
            ));
        }

        item.refresh_fingerprint();
        item.importance = item.importance.clamp(0.0, 1.0);
        item.confidence = item.confidence.clamp(0.0, 1.0);

        if item.embedding.is_none() {
            item.embedding = self.encode_one(&item.content).await;
        }

        let id = item.id.clone();
        let persisted = item.clone();
        {
            let mut state = self.write_state()?;
            if let Some(previous) = state.items.remove(&id) {
                state.unindex_item(&previous);
            }
            state.index_item(&item);
            state.items.insert(id.clone(), item);
        }

        self.persist_item(&persisted).await;
        tracing::debug!(id = %id, "Stored item");
        Ok(id)
    }

    /// Retrieve an item by id, recording the access
    pub async fn get(&self, id: &str) -> Result<MemoryItem> {
        let now = Utc::now();
        let item = {
            let mut state = self.write_state()?;
            let item = state
                .items
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            item.mark_accessed(now);
            item.clone()
        };

        self.persist_item(&item).await;
        Ok(item)
    }

    /// Search by text similarity, recording access on every returned item
    ///
    /// Uses embedding cosine similarity when both the query and the item have
    /// vectors, and token overlap otherwise.
    pub async fn search(
        &self,
        text: &str,
        filters: &QueryFilters,
        limit: usize,
    ) -> Result<Vec<MemoryItem>> {
        let now = Utc::now();
        let query_embedding = self.encode_one(text).await;

        let mut results: Vec<MemoryItem> = {
            let state = self.read_state()?;
            state
                .items
                .values()
                .filter(|item| filters.matches(item, now))
                .filter_map(|item| {
                    let similarity = match (&query_embedding, &item.embedding) {
                        (Some(q), Some(e)) => cosine_similarity(q, e),
                        _ => token_overlap(text, &item.content),
                    };
                    if similarity > SEARCH_FLOOR {
                        let mut hit = item.clone();
                        hit.similarity = similarity;
                        Some(hit)
                    } else {
                        None
                    }
                })
                .collect()
        };

        sort_by_similarity(&mut results);
        results.truncate(limit);

        let ids: Vec<String> = results.iter().map(|m| m.id.clone()).collect();
        self.record_access(&ids, now).await?;
        for item in &mut results {
            item.mark_accessed(now);
        }

        {
            let mut state = self.write_state()?;
            state.total_retrievals += 1;
            if !results.is_empty() {
                state.average_similarity = results
                    .iter()
                    .map(|m| m.similarity)
                    .sum::<f64>()
                    / results.len() as f64;
            }
        }

        Ok(results)
    }

    /// Apply a partial update, reindexing and re-embedding as needed
    pub async fn update(&self, id: &str, fields: UpdateFields) -> Result<MemoryItem> {
        let now = Utc::now();

        let new_embedding = match &fields.content {
            Some(content) if !content.trim().is_empty() => self.encode_one(content).await,
            _ => None,
        };

        let updated = {
            let mut state = self.write_state()?;
            let mut item = state
                .items
                .get(id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

            state.unindex_item(&item);

            if let Some(content) = fields.content {
                if content.trim().is_empty() {
                    // Re-add the untouched indexes before rejecting
                    state.index_item(&item);
                    return Err(StoreError::Validation(
                        "item content must not be empty".to_string(),
                    ));
                }
                item.content = content;
                item.refresh_fingerprint();
                item.embedding = new_embedding;
            }
            if let Some(context) = fields.context {
                item.context = context;
            }
            if let Some(tags) = fields.tags {
                item.tags = tags;
            }
            if let Some(importance) = fields.importance {
                item.importance = importance.clamp(0.0, 1.0);
            }
            if let Some(confidence) = fields.confidence {
                item.confidence = confidence.clamp(0.0, 1.0);
            }
            if let Some(expires_at) = fields.expires_at {
                item.expires_at = Some(expires_at);
            }
            item.updated_at = now;

            state.index_item(&item);
            state.items.insert(id.to_string(), item.clone());
            item
        };

        self.persist_item(&updated).await;
        Ok(updated)
    }

    /// Delete an item, removing it from every index
    pub async fn delete(&self, id: &str) -> Result<()> {
        {
            let mut state = self.write_state()?;
            let item = state
                .items
                .remove(id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            state.unindex_item(&item);
        }

        if let Some(persistence) = &self.persistence {
            if let Err(e) = persistence.delete_item(id).await {
                tracing::warn!(id = %id, "Failed to delete persisted item: {}", e);
            }
        }

        tracing::debug!(id = %id, "Deleted item");
        Ok(())
    }

    /// Aggregate counts by type, tag, context key, age, and importance
    pub fn statistics(&self) -> Result<StoreStats> {
        let now = Utc::now();
        let state = self.read_state()?;

        let mut stats = StoreStats {
            total_items: state.items.len(),
            total_retrievals: state.total_retrievals,
            average_similarity: state.average_similarity,
            last_cleanup: state.last_cleanup,
            ..Default::default()
        };

        for item in state.items.values() {
            *stats
                .by_kind
                .entry(item.kind.as_str().to_string())
                .or_default() += 1;

            for tag in &item.tags {
                *stats.by_tag.entry(tag.clone()).or_default() += 1;
            }

            for key in context_index_keys(&item.context) {
                *stats.by_context.entry(key).or_default() += 1;
            }

            let age_hours = item.age_hours(now);
            if age_hours < 24.0 {
                stats.age_buckets.today += 1;
            } else if age_hours < 24.0 * 7.0 {
                stats.age_buckets.this_week += 1;
            } else if age_hours < 24.0 * 30.0 {
                stats.age_buckets.this_month += 1;
            } else {
                stats.age_buckets.older += 1;
            }

            if item.importance >= 0.8 {
                stats.importance_buckets.high += 1;
            } else if item.importance >= 0.5 {
                stats.importance_buckets.medium += 1;
            } else {
                stats.importance_buckets.low += 1;
            }
        }

        Ok(stats)
    }

    /// Persist the current aggregate statistics (best-effort)
    pub async fn persist_stats(&self) -> Result<()> {
        let stats = self.statistics()?;
        if let Some(persistence) = &self.persistence {
            if let Err(e) = persistence.save_stats(&stats).await {
                tracing::warn!("Failed to persist store statistics: {}", e);
            }
        }
        Ok(())
    }

    /// Delete expired and low-value items
    ///
    /// Low-value means importance < 0.2, older than 30 days, and accessed
    /// fewer than 2 times. Dry runs report candidates without deleting.
    pub async fn cleanup(&self, dry_run: bool) -> Result<CleanupReport> {
        let now = Utc::now();

        let candidates: Vec<CleanupCandidate> = {
            let state = self.read_state()?;
            state
                .items
                .values()
                .filter_map(|item| {
                    let reason = if item.is_expired(now) {
                        CleanupReason::Expired
                    } else if item.importance < 0.2
                        && item.age_hours(now) > 24.0 * 30.0
                        && item.access_count < 2
                    {
                        CleanupReason::LowValue
                    } else {
                        return None;
                    };

                    Some(CleanupCandidate {
                        id: item.id.clone(),
                        reason,
                        importance: item.importance,
                        age_hours: item.age_hours(now),
                        access_count: item.access_count,
                    })
                })
                .collect()
        };

        let mut deleted = 0;
        if !dry_run {
            for candidate in &candidates {
                if self.delete(&candidate.id).await.is_ok() {
                    deleted += 1;
                }
            }

            let mut state = self.write_state()?;
            state.last_cleanup = Some(now);
        }

        let remaining = self.len()?;
        tracing::info!(
            candidates = candidates.len(),
            deleted,
            dry_run,
            "Cleanup pass finished"
        );

        Ok(CleanupReport {
            candidates,
            deleted,
            remaining,
        })
    }

    /// Clone every item passing the query's hard filters
    ///
    /// Candidate generation works on this snapshot so no lock is held during
    /// scoring. Snapshot reads do not count as item accesses.
    pub fn matching_snapshot(
        &self,
        query: &MemoryQuery,
        now: DateTime<Utc>,
    ) -> Result<Vec<MemoryItem>> {
        let state = self.read_state()?;
        Ok(state
            .items
            .values()
            .filter(|item| query.matches(item, now))
            .cloned()
            .collect())
    }

    /// Record an access on each of the given ids, persisting best-effort
    pub async fn record_access(&self, ids: &[String], now: DateTime<Utc>) -> Result<()> {
        let mut touched = Vec::with_capacity(ids.len());
        {
            let mut state = self.write_state()?;
            for id in ids {
                if let Some(item) = state.items.get_mut(id) {
                    item.mark_accessed(now);
                    touched.push(item.clone());
                }
            }
        }

        for item in &touched {
            self.persist_item(item).await;
        }
        Ok(())
    }

    /// Export items, optionally restricted by filters
    pub fn export_items(&self, filters: Option<&QueryFilters>) -> Result<ExportData> {
        let now = Utc::now();
        let state = self.read_state()?;

        let mut items: Vec<MemoryItem> = state
            .items
            .values()
            .filter(|item| filters.map(|f| f.matches(item, now)).unwrap_or(true))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(ExportData {
            exported_at: now,
            item_count: items.len(),
            items,
        })
    }

    /// Import items under the given merge strategy
    pub async fn import_items(
        &self,
        data: ExportData,
        strategy: MergeStrategy,
    ) -> Result<ImportReport> {
        let mut report = ImportReport::default();

        for item in data.items {
            if strategy == MergeStrategy::SkipExisting && self.contains(&item.id)? {
                report.skipped += 1;
                continue;
            }

            match self.put(item).await {
                Ok(_) => report.imported += 1,
                Err(StoreError::Validation(e)) => {
                    tracing::warn!("Skipping invalid imported item: {}", e);
                    report.errors += 1;
                }
                Err(e) => return Err(e),
            }
        }

        report.total_items = self.len()?;
        Ok(report)
    }

    /// Number of stored items
    pub fn len(&self) -> Result<usize> {
        Ok(self.read_state()?.items.len())
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Whether an id is present
    pub fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.read_state()?.items.contains_key(id))
    }

    /// Ids currently indexed under a tag
    pub fn ids_with_tag(&self, tag: &str) -> Result<Vec<String>> {
        let state = self.read_state()?;
        Ok(state
            .tag_index
            .get(tag)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// Ids currently indexed under a context key
    pub fn ids_with_context_key(&self, key: &str) -> Result<Vec<String>> {
        let state = self.read_state()?;
        Ok(state
            .context_index
            .get(key)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default())
    }

    // ========================================================================
    // Private helpers
    // ========================================================================

    async fn encode_one(&self, text: &str) -> Option<Vec<f32>> {
        let provider = self.embeddings.as_ref()?;
        match provider.encode(&[text.to_string()]).await {
            Ok(mut vectors) if !vectors.is_empty() => Some(vectors.remove(0)),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Embedding call failed, degrading to token overlap: {}", e);
                None
            }
        }
    }

    async fn persist_item(&self, item: &MemoryItem) {
        if let Some(persistence) = &self.persistence {
            if let Err(e) = persistence.save_item(item).await {
                tracing::warn!(id = %item.id, "Failed to persist item: {}", e);
            }
        }
    }

    fn read_state(&self) -> Result<std::sync::RwLockReadGuard<'_, StoreState>> {
        self.state.read().map_err(|e| StoreError::Lock(e.to_string()))
    }

    fn write_state(&self) -> Result<std::sync::RwLockWriteGuard<'_, StoreState>> {
        self.state.write().map_err(|e| StoreError::Lock(e.to_string()))
    }
}

/// Sort descending by transient similarity, breaking ties by id
pub(crate) fn sort_by_similarity(items: &mut [MemoryItem]) {
    items.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryType;

    fn store() -> ItemStore {
        ItemStore::new(None, None)
    }

    fn item(content: &str, tags: &[&str]) -> MemoryItem {
        MemoryItem::new(content, MemoryType::Text).with_tags(tags.to_vec())
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = store();
        let original = item("the quick brown fox", &["animals"]);
        let fingerprint = original.fingerprint.clone();

        let id = store.put(original).await.unwrap();
        let loaded = store.get(&id).await.unwrap();

        assert_eq!(loaded.content, "the quick brown fox");
        assert_eq!(loaded.fingerprint, fingerprint);
        assert_eq!(loaded.access_count, 1);
        assert!(loaded.last_accessed.is_some());
    }

    #[tokio::test]
    async fn test_put_rejects_empty_content() {
        let store = store();
        let result = store.put(item("   ", &[])).await;
        assert!(matches!(result, Err(StoreError::Validation(_))));
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let store = store();
        assert!(matches!(
            store.get("missing").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_search_token_overlap_fallback() {
        let store = store();
        store
            .put(item("rust borrow checker notes", &["rust"]))
            .await
            .unwrap();
        store
            .put(item("gardening schedule for spring", &["garden"]))
            .await
            .unwrap();

        let results = store
            .search("rust borrow checker", &QueryFilters::default(), 10)
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert!(results[0].content.contains("rust"));
        assert!(results[0].similarity > SEARCH_FLOOR);
        assert_eq!(results[0].access_count, 1);
    }

    #[tokio::test]
    async fn test_update_recomputes_fingerprint_and_reindexes() {
        let store = store();
        let id = store.put(item("original text", &["old-tag"])).await.unwrap();

        let updated = store
            .update(
                &id,
                UpdateFields {
                    content: Some("revised text".to_string()),
                    tags: Some(vec!["new-tag".to_string()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.fingerprint, crate::memory::content_fingerprint("revised text"));
        assert!(store.ids_with_tag("old-tag").unwrap().is_empty());
        assert_eq!(store.ids_with_tag("new-tag").unwrap(), vec![id]);
    }

    #[tokio::test]
    async fn test_update_not_found() {
        let store = store();
        let result = store.update("missing", UpdateFields::default()).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_scrubs_indexes() {
        let store = store();
        let mut stored = item("indexed content", &["shared-tag"]);
        stored.context = MemoryContext::for_project_user("atlas", "alice");
        let id = store.put(stored).await.unwrap();

        assert_eq!(store.ids_with_tag("shared-tag").unwrap(), vec![id.clone()]);
        assert_eq!(
            store.ids_with_context_key("project:atlas").unwrap(),
            vec![id.clone()]
        );

        store.delete(&id).await.unwrap();

        assert!(store.ids_with_tag("shared-tag").unwrap().is_empty());
        assert!(store.ids_with_context_key("project:atlas").unwrap().is_empty());
        assert!(store.ids_with_context_key("user:alice").unwrap().is_empty());

        let mut filters = QueryFilters::default();
        filters.tags = vec!["shared-tag".to_string()];
        let results = store.search("indexed content", &filters, 10).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_statistics_buckets() {
        let store = store();
        store
            .put(item("high importance", &["a"]).with_importance(0.9))
            .await
            .unwrap();
        store
            .put(item("medium importance", &["a", "b"]).with_importance(0.6))
            .await
            .unwrap();
        store
            .put(item("low importance", &[]).with_importance(0.1))
            .await
            .unwrap();

        let stats = store.statistics().unwrap();
        assert_eq!(stats.total_items, 3);
        assert_eq!(stats.by_kind.get("text"), Some(&3));
        assert_eq!(stats.by_tag.get("a"), Some(&2));
        assert_eq!(stats.age_buckets.today, 3);
        assert_eq!(stats.importance_buckets.high, 1);
        assert_eq!(stats.importance_buckets.medium, 1);
        assert_eq!(stats.importance_buckets.low, 1);
    }

    #[tokio::test]
    async fn test_cleanup_low_value() {
        let now = Utc::now();
        let store = store();

        let mut stale = MemoryItem::with_id_at(
            "stale",
            "ancient rarely-used note",
            MemoryType::Text,
            now - chrono::Duration::days(60),
        );
        stale.importance = 0.1;
        store.put(stale).await.unwrap();

        store.put(item("fresh note", &[])).await.unwrap();

        let dry = store.cleanup(true).await.unwrap();
        assert_eq!(dry.candidates.len(), 1);
        assert_eq!(dry.candidates[0].reason, CleanupReason::LowValue);
        assert_eq!(dry.deleted, 0);
        assert_eq!(store.len().unwrap(), 2);

        let wet = store.cleanup(false).await.unwrap();
        assert_eq!(wet.deleted, 1);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_import_skip_existing() {
        let store = store();
        let existing = item("already here", &[]);
        let existing_id = existing.id.clone();
        store.put(existing.clone()).await.unwrap();

        let incoming = item("new arrival", &[]);
        let data = ExportData {
            exported_at: Utc::now(),
            item_count: 2,
            items: vec![existing, incoming],
        };

        let report = store
            .import_items(data, MergeStrategy::SkipExisting)
            .await
            .unwrap();
        assert_eq!(report.imported, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.total_items, 2);
        assert!(store.contains(&existing_id).unwrap());
    }
}
