//! Retrieval engine
//!
//! Orchestrates one retrieval: cache lookup, context analysis, strategy
//! selection, candidate generation, eight-factor ranking, diversity
//! filtering, access recording, and the learning hook.

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet, VecDeque};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use crate::context::{analyze, ContextFeatures};
use crate::embeddings::{cosine_similarity, token_overlap, EmbeddingProvider};
use crate::memory::{MemoryContext, MemoryItem, MemoryQuery};
use crate::store::{sort_by_similarity, ItemStore};

use super::profile::{ProfileStore, UserProfile};
use super::ranking::{
    context_similarity, frequency_score, freshness_score, relationship_strength,
    result_confidence, temporal_raw, temporal_relevance, total_score, FactorScores,
    RetrievalResult,
};
use super::{Result, RetrievalError, RetrievalParams, RetrievalStrategy};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Candidates kept per strategy, as a multiple of the query's result budget
const CANDIDATE_MULTIPLIER: usize = 2;

/// Minimum context similarity for the Contextual strategy
const MIN_CONTEXT_SCORE: f64 = 0.3;

/// Minimum score for the Collaborative strategy
const MIN_COLLABORATIVE_SCORE: f64 = 0.1;

/// Results below this confidence are dropped during diversity filtering
const MIN_RESULT_CONFIDENCE: f64 = 0.3;

/// Retrieval-history ring buffer capacity
const MAX_HISTORY_EVENTS: usize = 1_000;

/// Strategy performance series is trimmed back to this many entries...
const STRATEGY_SERIES_KEEP: usize = 50;

/// ...once it grows past this many
const STRATEGY_SERIES_MAX: usize = 100;

// ============================================================================
// EVENT TYPES
// ============================================================================

/// One entry in the retrieval history log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalEvent {
    /// When the retrieval ran
    pub at: DateTime<Utc>,
    /// Query text
    pub query: String,
    /// Strategy used
    pub strategy: RetrievalStrategy,
    /// Number of results returned
    pub result_count: usize,
    /// Analyzed context features
    pub features: ContextFeatures,
    /// Mean total score of the results
    pub mean_score: f64,
}

struct CachedQuery {
    results: Vec<RetrievalResult>,
    cached_at: DateTime<Utc>,
}

// ============================================================================
// RETRIEVAL ENGINE
// ============================================================================

/// Multi-strategy retrieval engine
pub struct RetrievalEngine {
    store: Arc<ItemStore>,
    embeddings: Option<Arc<dyn EmbeddingProvider>>,
    profiles: Arc<ProfileStore>,
    params: RetrievalParams,
    cache: Mutex<LruCache<String, CachedQuery>>,
    history: Mutex<VecDeque<RetrievalEvent>>,
    strategy_performance: Mutex<HashMap<RetrievalStrategy, Vec<f64>>>,
}

impl RetrievalEngine {
    /// Create an engine over the given store and collaborators
    pub fn new(
        store: Arc<ItemStore>,
        embeddings: Option<Arc<dyn EmbeddingProvider>>,
        profiles: Arc<ProfileStore>,
        params: RetrievalParams,
    ) -> Self {
        let capacity = NonZeroUsize::new(params.cache_capacity.max(1))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            store,
            embeddings,
            profiles,
            params,
            cache: Mutex::new(LruCache::new(capacity)),
            history: Mutex::new(VecDeque::new()),
            strategy_performance: Mutex::new(HashMap::new()),
        }
    }

    /// Current parameters
    pub fn params(&self) -> &RetrievalParams {
        &self.params
    }

    /// Run one retrieval
    pub async fn retrieve(&self, query: &MemoryQuery) -> Result<Vec<RetrievalResult>> {
        let now = Utc::now();
        let cache_key = cache_key(query);

        if let Some(results) = self.cached(&cache_key, now)? {
            tracing::debug!(query = %truncate_for_log(&query.text), "Query cache hit");
            return Ok(results);
        }

        let context = query
            .context
            .clone()
            .unwrap_or_else(|| MemoryContext::at(now));
        let features = analyze(&context, &query.text, now);
        let profile = self.profiles.profile_for(query.context.as_ref())?;

        let strategy = query
            .strategy
            .unwrap_or_else(|| RetrievalStrategy::select(&query.text, query.context.as_ref()));

        let pool = self.store.matching_snapshot(query, now)?;
        let query_embedding = self.encode_query(&query.text).await;

        let candidates = self.generate_candidates(
            strategy,
            &pool,
            query,
            &profile,
            query_embedding.as_deref(),
            now,
        );

        let ranked = self.rank_candidates(candidates, query, &profile, strategy, now);
        let results = self.apply_diversity(ranked, query);

        let ids: Vec<String> = results.iter().map(|r| r.item.id.clone()).collect();
        self.store.record_access(&ids, now).await?;

        self.record_learning(query, &results, strategy, features, now)?;
        self.insert_cached(cache_key, &results)?;

        tracing::info!(
            strategy = %strategy,
            results = results.len(),
            query = %truncate_for_log(&query.text),
            "Retrieval finished"
        );

        Ok(results)
    }

    /// Snapshot of the most recent history events, newest last
    pub fn recent_events(&self, limit: usize) -> Result<Vec<RetrievalEvent>> {
        let history = self
            .history
            .lock()
            .map_err(|e| RetrievalError::Lock(e.to_string()))?;
        Ok(history
            .iter()
            .rev()
            .take(limit)
            .rev()
            .cloned()
            .collect())
    }

    /// Number of recorded history events
    pub fn history_len(&self) -> Result<usize> {
        let history = self
            .history
            .lock()
            .map_err(|e| RetrievalError::Lock(e.to_string()))?;
        Ok(history.len())
    }

    /// Rolling mean-confidence series per strategy
    pub fn strategy_performance(&self) -> Result<HashMap<RetrievalStrategy, Vec<f64>>> {
        let perf = self
            .strategy_performance
            .lock()
            .map_err(|e| RetrievalError::Lock(e.to_string()))?;
        Ok(perf.clone())
    }

    // ========================================================================
    // Candidate generation
    // ========================================================================

    fn generate_candidates(
        &self,
        strategy: RetrievalStrategy,
        pool: &[MemoryItem],
        query: &MemoryQuery,
        profile: &UserProfile,
        query_embedding: Option<&[f32]>,
        now: DateTime<Utc>,
    ) -> Vec<MemoryItem> {
        let cap = query.max_results * CANDIDATE_MULTIPLIER;

        match strategy {
            RetrievalStrategy::Semantic => {
                semantic_candidates(pool, query, query_embedding, cap)
            }
            RetrievalStrategy::Contextual => contextual_candidates(pool, query, cap),
            RetrievalStrategy::Temporal => temporal_candidates(pool, now, cap),
            RetrievalStrategy::Frequency => frequency_candidates(pool, now, cap),
            RetrievalStrategy::Importance => importance_candidates(pool, cap),
            RetrievalStrategy::Hybrid | RetrievalStrategy::Adaptive => {
                hybrid_candidates(pool, query, query_embedding, now, cap)
            }
            RetrievalStrategy::Collaborative => {
                collaborative_candidates(pool, query, profile, query_embedding, cap)
            }
        }
    }

    // ========================================================================
    // Ranking and filtering
    // ========================================================================

    fn rank_candidates(
        &self,
        candidates: Vec<MemoryItem>,
        query: &MemoryQuery,
        profile: &UserProfile,
        strategy: RetrievalStrategy,
        now: DateTime<Utc>,
    ) -> Vec<RetrievalResult> {
        let candidate_ids: HashSet<&str> =
            candidates.iter().map(|c| c.id.as_str()).collect();

        let mut results: Vec<RetrievalResult> = candidates
            .iter()
            .map(|item| {
                let factors = FactorScores {
                    semantic: item.similarity,
                    context: query
                        .context
                        .as_ref()
                        .map(|c| context_similarity(c, &item.context))
                        .unwrap_or(0.0),
                    temporal: temporal_relevance(item, now),
                    frequency: frequency_score(item, now),
                    importance: item.importance,
                    preference: profile.preference_for(item),
                    relationship: relationship_strength(item, &candidate_ids),
                    freshness: freshness_score(item, now),
                };

                let total = total_score(&factors, &self.params);
                let (dominant, _) = factors.dominant();

                RetrievalResult {
                    item: item.clone(),
                    total_score: total,
                    factors,
                    reason: dominant.reason().to_string(),
                    confidence: result_confidence(&factors, strategy),
                    rank: 0,
                }
            })
            .collect();

        results.sort_by(|a, b| {
            b.total_score
                .partial_cmp(&a.total_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.item.id.cmp(&b.item.id))
        });

        results
    }

    fn apply_diversity(
        &self,
        ranked: Vec<RetrievalResult>,
        query: &MemoryQuery,
    ) -> Vec<RetrievalResult> {
        let max_per_kind = (query.max_results / 3).max(1);
        let mut seen_fingerprints: HashSet<String> = HashSet::new();
        let mut kind_counts: HashMap<crate::memory::MemoryType, usize> = HashMap::new();
        let mut selected = Vec::with_capacity(query.max_results);

        for mut result in ranked {
            if seen_fingerprints.contains(&result.item.fingerprint) {
                continue;
            }

            if self.params.diversity_factor > 0.0
                && kind_counts.get(&result.item.kind).copied().unwrap_or(0) >= max_per_kind
            {
                continue;
            }

            if result.confidence < MIN_RESULT_CONFIDENCE {
                continue;
            }

            seen_fingerprints.insert(result.item.fingerprint.clone());
            *kind_counts.entry(result.item.kind).or_default() += 1;
            result.rank = selected.len() + 1;
            selected.push(result);

            if selected.len() >= query.max_results {
                break;
            }
        }

        selected
    }

    // ========================================================================
    // Learning hook
    // ========================================================================

    fn record_learning(
        &self,
        query: &MemoryQuery,
        results: &[RetrievalResult],
        strategy: RetrievalStrategy,
        features: ContextFeatures,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mean_score = if results.is_empty() {
            0.0
        } else {
            results.iter().map(|r| r.total_score).sum::<f64>() / results.len() as f64
        };

        {
            let mut history = self
                .history
                .lock()
                .map_err(|e| RetrievalError::Lock(e.to_string()))?;
            history.push_back(RetrievalEvent {
                at: now,
                query: query.text.clone(),
                strategy,
                result_count: results.len(),
                features,
                mean_score,
            });
            while history.len() > MAX_HISTORY_EVENTS {
                history.pop_front();
            }
        }

        if let Some(user) = query.context.as_ref().and_then(|c| c.user.as_deref()) {
            let items: Vec<&MemoryItem> = results.iter().map(|r| &r.item).collect();
            self.profiles.note_retrieved(user, &items, now)?;
        }

        if !results.is_empty() {
            let mean_confidence =
                results.iter().map(|r| r.confidence).sum::<f64>() / results.len() as f64;

            let mut perf = self
                .strategy_performance
                .lock()
                .map_err(|e| RetrievalError::Lock(e.to_string()))?;
            let series = perf.entry(strategy).or_default();
            series.push(mean_confidence);
            if series.len() > STRATEGY_SERIES_MAX {
                let drop = series.len() - STRATEGY_SERIES_KEEP;
                series.drain(..drop);
            }
        }

        Ok(())
    }

    // ========================================================================
    // Cache
    // ========================================================================

    fn cached(&self, key: &str, now: DateTime<Utc>) -> Result<Option<Vec<RetrievalResult>>> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|e| RetrievalError::Lock(e.to_string()))?;

        if let Some(entry) = cache.get(key) {
            let age = (now - entry.cached_at).num_seconds();
            if age < self.params.cache_ttl_secs {
                return Ok(Some(entry.results.clone()));
            }
            cache.pop(key);
        }

        Ok(None)
    }

    fn insert_cached(&self, key: String, results: &[RetrievalResult]) -> Result<()> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|e| RetrievalError::Lock(e.to_string()))?;
        cache.put(
            key,
            CachedQuery {
                results: results.to_vec(),
                cached_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn encode_query(&self, text: &str) -> Option<Vec<f32>> {
        let provider = self.embeddings.as_ref()?;
        match provider.encode(&[text.to_string()]).await {
            Ok(mut vectors) if !vectors.is_empty() => Some(vectors.remove(0)),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Query embedding failed, degrading to token overlap: {}", e);
                None
            }
        }
    }
}

// ============================================================================
// STRATEGY CANDIDATE GENERATORS
// ============================================================================

fn finish_candidates(mut candidates: Vec<MemoryItem>, cap: usize) -> Vec<MemoryItem> {
    sort_by_similarity(&mut candidates);
    candidates.truncate(cap);
    candidates
}

fn semantic_similarity(
    item: &MemoryItem,
    query_text: &str,
    query_embedding: Option<&[f32]>,
) -> f64 {
    match (query_embedding, &item.embedding) {
        (Some(q), Some(e)) => cosine_similarity(q, e),
        _ => token_overlap(query_text, &item.content),
    }
}

fn semantic_candidates(
    pool: &[MemoryItem],
    query: &MemoryQuery,
    query_embedding: Option<&[f32]>,
    cap: usize,
) -> Vec<MemoryItem> {
    let candidates = pool
        .iter()
        .filter_map(|item| {
            let similarity = semantic_similarity(item, &query.text, query_embedding);
            if similarity >= query.similarity_threshold {
                let mut candidate = item.clone();
                candidate.similarity = similarity;
                Some(candidate)
            } else {
                None
            }
        })
        .collect();

    finish_candidates(candidates, cap)
}

fn contextual_candidates(
    pool: &[MemoryItem],
    query: &MemoryQuery,
    cap: usize,
) -> Vec<MemoryItem> {
    let Some(query_context) = &query.context else {
        return Vec::new();
    };

    let candidates = pool
        .iter()
        .filter_map(|item| {
            let score = context_similarity(query_context, &item.context);
            if score > MIN_CONTEXT_SCORE {
                let mut candidate = item.clone();
                candidate.similarity = score;
                Some(candidate)
            } else {
                None
            }
        })
        .collect();

    finish_candidates(candidates, cap)
}

fn temporal_candidates(pool: &[MemoryItem], now: DateTime<Utc>, cap: usize) -> Vec<MemoryItem> {
    let candidates = pool
        .iter()
        .map(|item| {
            let mut candidate = item.clone();
            candidate.similarity = temporal_raw(item, now);
            candidate
        })
        .collect();

    finish_candidates(candidates, cap)
}

fn frequency_candidates(pool: &[MemoryItem], now: DateTime<Utc>, cap: usize) -> Vec<MemoryItem> {
    let candidates = pool
        .iter()
        .map(|item| {
            let mut candidate = item.clone();
            candidate.similarity = frequency_score(item, now);
            candidate
        })
        .collect();

    finish_candidates(candidates, cap)
}

fn importance_candidates(pool: &[MemoryItem], cap: usize) -> Vec<MemoryItem> {
    let candidates = pool
        .iter()
        .map(|item| {
            let mut candidate = item.clone();
            candidate.similarity = item.importance;
            candidate
        })
        .collect();

    finish_candidates(candidates, cap)
}

/// Weighted union of the semantic (0.4), contextual (0.3), and temporal (0.3)
/// candidate sets; scores sum when an item appears in more than one subset.
fn hybrid_candidates(
    pool: &[MemoryItem],
    query: &MemoryQuery,
    query_embedding: Option<&[f32]>,
    now: DateTime<Utc>,
    cap: usize,
) -> Vec<MemoryItem> {
    let mut combined: HashMap<String, MemoryItem> = HashMap::new();

    let mut merge = |subset: Vec<MemoryItem>, weight: f64| {
        for item in subset {
            let weighted = item.similarity * weight;
            combined
                .entry(item.id.clone())
                .and_modify(|existing| existing.similarity += weighted)
                .or_insert_with(|| {
                    let mut candidate = item;
                    candidate.similarity = weighted;
                    candidate
                });
        }
    };

    merge(semantic_candidates(pool, query, query_embedding, cap), 0.4);
    merge(contextual_candidates(pool, query, cap), 0.3);
    merge(temporal_candidates(pool, now, cap), 0.3);

    finish_candidates(combined.into_values().collect(), cap)
}

fn collaborative_candidates(
    pool: &[MemoryItem],
    query: &MemoryQuery,
    profile: &UserProfile,
    query_embedding: Option<&[f32]>,
    cap: usize,
) -> Vec<MemoryItem> {
    if profile.similar_users.is_empty() {
        return semantic_candidates(pool, query, query_embedding, cap);
    }

    let candidates = pool
        .iter()
        .filter_map(|item| {
            let semantic = semantic_similarity(item, &query.text, query_embedding);
            let from_similar_user = item
                .context
                .user
                .as_ref()
                .map(|u| profile.similar_users.contains(u))
                .unwrap_or(false);

            let score = if from_similar_user {
                (semantic * 0.5).max(0.8)
            } else {
                semantic * 0.5
            };

            if score > MIN_COLLABORATIVE_SCORE {
                let mut candidate = item.clone();
                candidate.similarity = score;
                Some(candidate)
            } else {
                None
            }
        })
        .collect();

    finish_candidates(candidates, cap)
}

// ============================================================================
// HELPERS
// ============================================================================

/// Deterministic cache key over the full query
fn cache_key(query: &MemoryQuery) -> String {
    let payload = serde_json::json!({
        "query": query.text,
        "maxResults": query.max_results,
        "threshold": query.similarity_threshold,
        "strategy": query.strategy.map(|s| s.as_str()),
        "context": query.context,
    });

    let digest = Sha256::digest(payload.to_string().as_bytes());
    digest.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

fn truncate_for_log(text: &str) -> &str {
    let end = text
        .char_indices()
        .nth(50)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    &text[..end]
}

// ============================================================================
// TESTS
// ============================================================================
