//! Pattern Predictor
//!
//! Per-user pattern mining over recorded access events:
//! - temporal events pruned to a rolling window (default 30 days)
//! - context-key -> item -> cumulative-count associations
//! - a fixed-length sliding window of recent accesses (sequence pattern)
//! - session-grouped workflow sequences
//!
//! Each generator emits zero or more [`MemoryPrediction`]s with a
//! type-specific validity window; one call's predictions are merged, sorted
//! by confidence, deduplicated by claimed item id, and capped.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::RwLock;
use uuid::Uuid;

use crate::memory::MemoryContext;

use super::{
    ConfidenceTier, MemoryPrediction, PredictionType, PredictorError, Result,
};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Tunable pattern-mining parameters
#[derive(Debug, Clone)]
pub struct PredictorConfig {
    /// Rolling window for temporal access events, in days
    pub window_days: i64,
    /// Length of the per-user recent-access sequence
    pub sequence_window: usize,
    /// Maximum predictions surviving one prediction request
    pub max_predictions: usize,
    /// Jaccard similarity floor for similar users
    pub similar_user_threshold: f64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            window_days: 30,
            sequence_window: 5,
            max_predictions: 10,
            similar_user_threshold: 0.3,
        }
    }
}

/// Validity windows per prediction type, in hours
const SEQUENCE_VALIDITY_HOURS: i64 = 2;
const CONTEXT_VALIDITY_HOURS: i64 = 4;
const TEMPORAL_VALIDITY_HOURS: i64 = 3;
const WORKFLOW_VALIDITY_HOURS: i64 = 1;
const COLLABORATIVE_VALIDITY_HOURS: i64 = 6;
const SEASONAL_VALIDITY_HOURS: i64 = 6;
const RELATED_VALIDITY_HOURS: i64 = 24;

// ============================================================================
// STATE
// ============================================================================

#[derive(Debug, Clone)]
struct WorkflowTrace {
    session: String,
    steps: Vec<String>,
}

#[derive(Default)]
struct PredictorState {
    /// user -> time-ordered (timestamp, item id) events
    temporal: HashMap<String, Vec<(DateTime<Utc>, String)>>,
    /// context key -> item id -> cumulative access count
    associations: HashMap<String, HashMap<String, f64>>,
    /// user -> sliding window of recent item ids
    sequences: HashMap<String, VecDeque<String>>,
    /// user -> session-grouped workflow traces
    workflows: HashMap<String, Vec<WorkflowTrace>>,
}

// ============================================================================
// PATTERN PREDICTOR
// ============================================================================

/// Mines access patterns and emits ranked predictions
pub struct PatternPredictor {
    state: RwLock<PredictorState>,
    config: PredictorConfig,
}

impl Default for PatternPredictor {
    fn default() -> Self {
        Self::new(PredictorConfig::default())
    }
}

impl PatternPredictor {
    /// Create a predictor with the given configuration
    pub fn new(config: PredictorConfig) -> Self {
        Self {
            state: RwLock::new(PredictorState::default()),
            config,
        }
    }

    /// Current configuration
    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    /// Record one access event
    pub fn learn_from_access(
        &self,
        item_id: &str,
        context: &MemoryContext,
        at: DateTime<Utc>,
        user_id: &str,
    ) -> Result<()> {
        let cutoff = at - Duration::days(self.config.window_days);
        let mut state = self.write()?;

        let events = state.temporal.entry(user_id.to_string()).or_default();
        events.push((at, item_id.to_string()));
        events.retain(|(t, _)| *t > cutoff);

        *state
            .associations
            .entry(context.context_key())
            .or_default()
            .entry(item_id.to_string())
            .or_insert(0.0) += 1.0;

        let sequence = state.sequences.entry(user_id.to_string()).or_default();
        sequence.push_back(item_id.to_string());
        while sequence.len() > self.config.sequence_window {
            sequence.pop_front();
        }

        if let Some(session) = &context.session {
            let traces = state.workflows.entry(user_id.to_string()).or_default();
            match traces.iter_mut().find(|t| &t.session == session) {
                Some(trace) => {
                    if !trace.steps.iter().any(|s| s == item_id) {
                        trace.steps.push(item_id.to_string());
                    }
                }
                None => traces.push(WorkflowTrace {
                    session: session.clone(),
                    steps: vec![item_id.to_string()],
                }),
            }
        }

        Ok(())
    }

    /// Generate ranked predictions for the given context and recent accesses
    pub fn predict(
        &self,
        context: &MemoryContext,
        user_id: &str,
        recent: &[String],
        now: DateTime<Utc>,
    ) -> Result<Vec<MemoryPrediction>> {
        let state = self.read()?;
        let mut predictions = Vec::new();

        predictions.extend(self.predict_from_sequences(&state, context, user_id, recent, now));
        predictions.extend(self.predict_from_context(&state, context, now));
        predictions.extend(self.predict_from_temporal(&state, context, user_id, now));
        predictions.extend(self.predict_from_workflows(&state, context, user_id, recent, now));
        predictions.extend(self.predict_from_collaboration(&state, context, user_id, now));
        drop(state);

        Ok(self.rank_predictions(predictions))
    }

    /// Predict items historically co-accessed with the given item
    pub fn predict_related(
        &self,
        item_id: &str,
        context: &MemoryContext,
        now: DateTime<Utc>,
    ) -> Result<Vec<MemoryPrediction>> {
        let state = self.read()?;
        let mut predictions = Vec::new();
        let window = Duration::hours(1);

        for (user_id, events) in &state.temporal {
            let target_times: Vec<DateTime<Utc>> = events
                .iter()
                .filter(|(_, id)| id == item_id)
                .map(|(t, _)| *t)
                .collect();
            if target_times.is_empty() {
                continue;
            }

            let mut counts: HashMap<&str, usize> = HashMap::new();
            for target in &target_times {
                for (at, other_id) in events {
                    if other_id != item_id && (*at - *target).abs() <= window {
                        *counts.entry(other_id.as_str()).or_default() += 1;
                    }
                }
            }

            let related = top_counted(&counts, 3);
            if related.is_empty() {
                continue;
            }

            let tier = if related.len() >= 3 && context.project.is_some() {
                ConfidenceTier::High
            } else if related.len() >= 2 {
                ConfidenceTier::Medium
            } else {
                ConfidenceTier::Low
            };

            let base = (related.len() as f64 / 5.0).min(0.9);
            let mean_frequency = related
                .iter()
                .map(|id| counts.get(id.as_str()).copied().unwrap_or(0) as f64)
                .sum::<f64>()
                / related.len() as f64;
            let confidence = (base + (mean_frequency / 10.0).min(0.3)).min(1.0);

            predictions.push(MemoryPrediction {
                id: prediction_id(PredictionType::Related),
                predicted_ids: related.clone(),
                kind: PredictionType::Related,
                tier,
                confidence,
                reasoning: format!("Items commonly accessed together with {item_id}"),
                context: context.clone(),
                predicted_at: now,
                valid_until: now + Duration::hours(RELATED_VALIDITY_HOURS),
                evidence: evidence([
                    ("baseItem", serde_json::json!(item_id)),
                    ("coOccurrenceCount", serde_json::json!(related.len())),
                    ("observedUser", serde_json::json!(user_id)),
                ]),
            });
        }

        Ok(predictions)
    }

    /// Predict items from seasonal access cycles
    ///
    /// Seasonal means same hour (within one) on the same weekday, or the same
    /// calendar month.
    pub fn predict_seasonal(
        &self,
        context: &MemoryContext,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<MemoryPrediction>> {
        let state = self.read()?;
        let Some(events) = state.temporal.get(user_id) else {
            return Ok(Vec::new());
        };

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for (at, item_id) in events {
            let same_slot = hour_distance(at.hour(), now.hour()) <= 1
                && at.weekday() == now.weekday();
            if same_slot || at.month() == now.month() {
                *counts.entry(item_id.as_str()).or_default() += 1;
            }
        }

        let top = top_counted(&counts, 5);
        if top.is_empty() {
            return Ok(Vec::new());
        }

        Ok(vec![MemoryPrediction {
            id: prediction_id(PredictionType::Seasonal),
            predicted_ids: top,
            kind: PredictionType::Seasonal,
            tier: ConfidenceTier::Medium,
            confidence: 0.6,
            reasoning: "Items typically accessed in this season".to_string(),
            context: context.clone(),
            predicted_at: now,
            valid_until: now + Duration::hours(SEASONAL_VALIDITY_HOURS),
            evidence: evidence([
                ("hour", serde_json::json!(now.hour())),
                ("weekday", serde_json::json!(now.weekday().num_days_from_monday())),
                ("month", serde_json::json!(now.month())),
                ("patternStrength", serde_json::json!(counts.len())),
            ]),
        }])
    }

    /// Users with overlapping accessed-item sets (Jaccard > threshold, top 3)
    pub fn similar_users(&self, user_id: &str) -> Result<Vec<String>> {
        let state = self.read()?;
        Ok(self.similar_users_inner(&state, user_id))
    }

    /// Snapshot of per-user temporal events
    pub fn events_snapshot(&self) -> Result<HashMap<String, Vec<(DateTime<Utc>, String)>>> {
        Ok(self.read()?.temporal.clone())
    }

    /// Snapshot of context-key association tables
    pub fn associations_snapshot(&self) -> Result<HashMap<String, HashMap<String, f64>>> {
        Ok(self.read()?.associations.clone())
    }

    /// Snapshot of per-user recent-access sequences
    pub fn sequences_snapshot(&self) -> Result<HashMap<String, Vec<String>>> {
        Ok(self
            .read()?
            .sequences
            .iter()
            .map(|(user, seq)| (user.clone(), seq.iter().cloned().collect()))
            .collect())
    }

    // ========================================================================
    // Private generators
    // ========================================================================

    fn predict_from_sequences(
        &self,
        state: &PredictorState,
        context: &MemoryContext,
        user_id: &str,
        recent: &[String],
        now: DateTime<Utc>,
    ) -> Vec<MemoryPrediction> {
        let mut predictions = Vec::new();
        if recent.len() < 2 {
            return predictions;
        }

        let Some(sequence) = state.sequences.get(user_id) else {
            return predictions;
        };
        let pattern: Vec<&String> = sequence.iter().collect();
        if pattern.len() < recent.len() {
            return predictions;
        }

        for start in 0..=(pattern.len() - recent.len()) {
            let window = &pattern[start..start + recent.len()];
            if !window.iter().zip(recent.iter()).all(|(a, b)| *a == b) {
                continue;
            }

            let next_start = start + recent.len();
            let next: Vec<String> = pattern[next_start..]
                .iter()
                .take(3)
                .map(|s| (*s).clone())
                .collect();
            if next.is_empty() {
                continue;
            }

            let confidence =
                (recent.len() as f64 / pattern.len() as f64 + 0.2).min(1.0);

            predictions.push(MemoryPrediction {
                id: prediction_id(PredictionType::NextItem),
                predicted_ids: next,
                kind: PredictionType::NextItem,
                tier: ConfidenceTier::from_score(confidence),
                confidence,
                reasoning: "Based on observed access sequences".to_string(),
                context: context.clone(),
                predicted_at: now,
                valid_until: now + Duration::hours(SEQUENCE_VALIDITY_HOURS),
                evidence: evidence([
                    ("matchPosition", serde_json::json!(start)),
                    ("patternLength", serde_json::json!(pattern.len())),
                    ("recentAccesses", serde_json::json!(recent)),
                ]),
            });
        }

        predictions
    }

    fn predict_from_context(
        &self,
        state: &PredictorState,
        context: &MemoryContext,
        now: DateTime<Utc>,
    ) -> Vec<MemoryPrediction> {
        let context_key = context.context_key();
        let Some(associated) = state.associations.get(&context_key) else {
            return Vec::new();
        };

        let mut ranked: Vec<(&String, f64)> =
            associated.iter().map(|(id, count)| (id, *count)).collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        ranked.truncate(5);

        if ranked.is_empty() {
            return Vec::new();
        }

        let mean_strength =
            ranked.iter().map(|(_, count)| count).sum::<f64>() / ranked.len() as f64;
        let confidence = (mean_strength / 10.0).min(1.0);

        vec![MemoryPrediction {
            id: prediction_id(PredictionType::ContextBased),
            predicted_ids: ranked.iter().map(|(id, _)| (*id).clone()).collect(),
            kind: PredictionType::ContextBased,
            tier: ConfidenceTier::from_score(confidence),
            confidence,
            reasoning: format!("Items commonly accessed in context: {context_key}"),
            context: context.clone(),
            predicted_at: now,
            valid_until: now + Duration::hours(CONTEXT_VALIDITY_HOURS),
            evidence: evidence([
                ("contextKey", serde_json::json!(context_key)),
                ("associationStrength", serde_json::json!(mean_strength)),
                ("itemCount", serde_json::json!(ranked.len())),
            ]),
        }]
    }

    fn predict_from_temporal(
        &self,
        state: &PredictorState,
        context: &MemoryContext,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Vec<MemoryPrediction> {
        let Some(events) = state.temporal.get(user_id) else {
            return Vec::new();
        };

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for (at, item_id) in events {
            if hour_distance(at.hour(), now.hour()) <= 1 && at.weekday() == now.weekday() {
                *counts.entry(item_id.as_str()).or_default() += 1;
            }
        }

        let top = top_counted(&counts, 3);
        if top.is_empty() {
            return Vec::new();
        }

        vec![MemoryPrediction {
            id: prediction_id(PredictionType::Temporal),
            predicted_ids: top,
            kind: PredictionType::Temporal,
            tier: ConfidenceTier::Medium,
            confidence: 0.65,
            reasoning: "Items typically accessed at this time".to_string(),
            context: context.clone(),
            predicted_at: now,
            valid_until: now + Duration::hours(TEMPORAL_VALIDITY_HOURS),
            evidence: evidence([
                ("hour", serde_json::json!(now.hour())),
                ("weekday", serde_json::json!(now.weekday().num_days_from_monday())),
                ("patternCount", serde_json::json!(counts.len())),
            ]),
        }]
    }

    fn predict_from_workflows(
        &self,
        state: &PredictorState,
        context: &MemoryContext,
        user_id: &str,
        recent: &[String],
        now: DateTime<Utc>,
    ) -> Vec<MemoryPrediction> {
        let mut predictions = Vec::new();
        if recent.len() < 2 {
            return predictions;
        }

        let Some(traces) = state.workflows.get(user_id) else {
            return predictions;
        };

        for trace in traces {
            if trace.steps.len() < recent.len() {
                continue;
            }

            for start in 0..=(trace.steps.len() - recent.len()) {
                let window = &trace.steps[start..start + recent.len()];
                if window != recent {
                    continue;
                }

                let next_start = start + recent.len();
                let next: Vec<String> = trace.steps[next_start..]
                    .iter()
                    .take(2)
                    .cloned()
                    .collect();
                if next.is_empty() {
                    continue;
                }

                predictions.push(MemoryPrediction {
                    id: prediction_id(PredictionType::Workflow),
                    predicted_ids: next,
                    kind: PredictionType::Workflow,
                    tier: ConfidenceTier::High,
                    confidence: 0.8,
                    reasoning: "Based on observed workflow patterns".to_string(),
                    context: context.clone(),
                    predicted_at: now,
                    valid_until: now + Duration::hours(WORKFLOW_VALIDITY_HOURS),
                    evidence: evidence([
                        ("session", serde_json::json!(trace.session)),
                        ("matchPosition", serde_json::json!(start)),
                        ("workflowLength", serde_json::json!(trace.steps.len())),
                    ]),
                });
            }
        }

        predictions
    }

    fn predict_from_collaboration(
        &self,
        state: &PredictorState,
        context: &MemoryContext,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Vec<MemoryPrediction> {
        let similar = self.similar_users_inner(state, user_id);
        if similar.is_empty() {
            return Vec::new();
        }

        let cutoff = now - Duration::hours(24);
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for other in &similar {
            if let Some(events) = state.temporal.get(other) {
                for (at, item_id) in events {
                    if *at > cutoff {
                        *counts.entry(item_id.as_str()).or_default() += 1;
                    }
                }
            }
        }

        let top = top_counted(&counts, 3);
        if top.is_empty() {
            return Vec::new();
        }

        vec![MemoryPrediction {
            id: prediction_id(PredictionType::Collaborative),
            predicted_ids: top,
            kind: PredictionType::Collaborative,
            tier: ConfidenceTier::Medium,
            confidence: 0.55,
            reasoning: "Items recently accessed by similar users".to_string(),
            context: context.clone(),
            predicted_at: now,
            valid_until: now + Duration::hours(COLLABORATIVE_VALIDITY_HOURS),
            evidence: evidence([
                ("similarUsers", serde_json::json!(similar)),
                ("recentAccessCount", serde_json::json!(counts.len())),
            ]),
        }]
    }

    fn similar_users_inner(&self, state: &PredictorState, user_id: &str) -> Vec<String> {
        let Some(events) = state.temporal.get(user_id) else {
            return Vec::new();
        };
        let mine: HashSet<&str> = events.iter().map(|(_, id)| id.as_str()).collect();
        if mine.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(String, f64)> = state
            .temporal
            .iter()
            .filter(|(other, _)| other.as_str() != user_id)
            .filter_map(|(other, other_events)| {
                let theirs: HashSet<&str> =
                    other_events.iter().map(|(_, id)| id.as_str()).collect();
                let intersection = mine.intersection(&theirs).count();
                let union = mine.union(&theirs).count();
                if union == 0 {
                    return None;
                }

                let similarity = intersection as f64 / union as f64;
                (similarity > self.config.similar_user_threshold)
                    .then(|| (other.clone(), similarity))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.into_iter().take(3).map(|(user, _)| user).collect()
    }

    /// Sort by confidence, drop predictions reusing already-claimed item ids,
    /// cap the survivors
    pub(crate) fn rank_predictions(
        &self,
        mut predictions: Vec<MemoryPrediction>,
    ) -> Vec<MemoryPrediction> {
        predictions.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.kind.as_str().cmp(b.kind.as_str()))
        });

        let mut claimed: HashSet<String> = HashSet::new();
        let mut unique = Vec::new();

        for prediction in predictions {
            if prediction
                .predicted_ids
                .iter()
                .any(|id| claimed.contains(id))
            {
                continue;
            }

            claimed.extend(prediction.predicted_ids.iter().cloned());
            unique.push(prediction);
            if unique.len() >= self.config.max_predictions {
                break;
            }
        }

        unique
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, PredictorState>> {
        self.state
            .read()
            .map_err(|e| PredictorError::Lock(e.to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, PredictorState>> {
        self.state
            .write()
            .map_err(|e| PredictorError::Lock(e.to_string()))
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn prediction_id(kind: PredictionType) -> String {
    format!("{}-{}", kind.as_str(), Uuid::new_v4())
}

fn evidence<const N: usize>(
    entries: [(&str, serde_json::Value); N],
) -> HashMap<String, serde_json::Value> {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

fn hour_distance(a: u32, b: u32) -> u32 {
    a.abs_diff(b)
}

/// Most frequent ids, count descending with id tie-break
fn top_counted(counts: &HashMap<&str, usize>, limit: usize) -> Vec<String> {
    let mut ranked: Vec<(&str, usize)> = counts.iter().map(|(id, c)| (*id, *c)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(id, _)| id.to_string())
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn context_for(user: &str) -> MemoryContext {
        MemoryContext::for_project_user("atlas", user)
    }

    fn learn_chain(predictor: &PatternPredictor, user: &str, ids: &[&str]) {
        let context = context_for(user);
        let base = Utc::now() - Duration::minutes(ids.len() as i64);
        for (i, id) in ids.iter().enumerate() {
            predictor
                .learn_from_access(id, &context, base + Duration::minutes(i as i64), user)
                .unwrap();
        }
    }

    #[test]
    fn test_sequence_prediction_surfaces_next_item() {
        let predictor = PatternPredictor::default();
        learn_chain(&predictor, "alice", &["a", "b", "c"]);

        let recent = vec!["a".to_string(), "b".to_string()];
        let predictions = predictor
            .predict(&context_for("alice"), "alice", &recent, Utc::now())
            .unwrap();

        let sequence: Vec<_> = predictions
            .iter()
            .filter(|p| p.kind == PredictionType::NextItem)
            .collect();
        assert!(!sequence.is_empty());
        assert!(sequence[0].predicted_ids.contains(&"c".to_string()));
        // matched 2 of a 3-long pattern, plus the match bonus
        assert!((sequence[0].confidence - (2.0 / 3.0 + 0.2)).abs() < 1e-9);
    }

    #[test]
    fn test_context_prediction_ranks_by_count() {
        let predictor = PatternPredictor::default();
        let context = context_for("alice");
        let now = Utc::now();
        // Learn on a different weekday so the temporal generator stays quiet
        // and cannot claim the ids first
        let learned_at = now - Duration::days(1);

        for _ in 0..5 {
            predictor
                .learn_from_access("hot", &context, learned_at, "alice")
                .unwrap();
        }
        predictor
            .learn_from_access("cold", &context, learned_at, "alice")
            .unwrap();

        let predictions = predictor.predict(&context, "alice", &[], now).unwrap();
        let context_based = predictions
            .iter()
            .find(|p| p.kind == PredictionType::ContextBased)
            .expect("context prediction");

        assert_eq!(context_based.predicted_ids[0], "hot");
        assert!((0.0..=1.0).contains(&context_based.confidence));
    }

    #[test]
    fn test_temporal_prediction_same_slot() {
        let predictor = PatternPredictor::default();
        let context = context_for("alice");
        let now = Utc::now();

        // Accesses in the same hour/weekday slot, one week apart
        predictor
            .learn_from_access("slot-item", &context, now - Duration::days(7), "alice")
            .unwrap();
        predictor
            .learn_from_access("slot-item", &context, now - Duration::days(14), "alice")
            .unwrap();

        let predictions = predictor.predict(&context, "alice", &[], now).unwrap();
        let temporal = predictions
            .iter()
            .find(|p| p.kind == PredictionType::Temporal)
            .expect("temporal prediction");

        assert!(temporal.predicted_ids.contains(&"slot-item".to_string()));
        assert_eq!(temporal.tier, ConfidenceTier::Medium);
        assert!((temporal.confidence - 0.65).abs() < 1e-9);
    }

    #[test]
    fn test_workflow_prediction_follows_session_steps() {
        let predictor = PatternPredictor::default();
        let mut context = context_for("alice");
        context.session = Some("s-1".to_string());
        let now = Utc::now();

        for id in ["w1", "w2", "w3", "w4"] {
            predictor.learn_from_access(id, &context, now, "alice").unwrap();
        }
        // Repeated id in the same session is not re-appended
        predictor.learn_from_access("w2", &context, now, "alice").unwrap();

        let recent = vec!["w1".to_string(), "w2".to_string()];
        let predictions = predictor.predict(&context, "alice", &recent, now).unwrap();
        let workflow = predictions
            .iter()
            .find(|p| p.kind == PredictionType::Workflow)
            .expect("workflow prediction");

        assert_eq!(workflow.predicted_ids, vec!["w3".to_string(), "w4".to_string()]);
        assert_eq!(workflow.tier, ConfidenceTier::High);
    }

    #[test]
    fn test_similar_users_jaccard() {
        let predictor = PatternPredictor::default();
        learn_chain(&predictor, "alice", &["a", "b", "c"]);
        learn_chain(&predictor, "bob", &["a", "b", "d"]);
        learn_chain(&predictor, "carol", &["x", "y", "z"]);

        let similar = predictor.similar_users("alice").unwrap();
        // alice vs bob: 2 shared of 4 union = 0.5 > 0.3
        assert_eq!(similar, vec!["bob".to_string()]);
    }

    #[test]
    fn test_collaborative_prediction_from_similar_users() {
        let predictor = PatternPredictor::default();
        let now = Utc::now();
        // Alice's own accesses are days old (no temporal/context claim on
        // the shared ids); Bob's overlap qualifies him as similar and his
        // last-24h accesses feed the collaborative prediction
        let alice_context = context_for("alice");
        for id in ["a", "b", "c"] {
            predictor
                .learn_from_access(id, &alice_context, now - Duration::days(3), "alice")
                .unwrap();
        }
        learn_chain(&predictor, "bob", &["a", "b", "fresh"]);

        let fresh_context = MemoryContext::for_project_user("hermes", "alice");
        let predictions = predictor
            .predict(&fresh_context, "alice", &[], now)
            .unwrap();
        let collaborative = predictions
            .iter()
            .find(|p| p.kind == PredictionType::Collaborative)
            .expect("collaborative prediction");

        assert!((collaborative.confidence - 0.55).abs() < 1e-9);
        assert!(collaborative.predicted_ids.contains(&"fresh".to_string()));
    }

    #[test]
    fn test_related_prediction_co_access() {
        let predictor = PatternPredictor::default();
        let context = context_for("alice");
        let now = Utc::now();

        predictor
            .learn_from_access("anchor", &context, now - Duration::minutes(30), "alice")
            .unwrap();
        predictor
            .learn_from_access("companion", &context, now - Duration::minutes(25), "alice")
            .unwrap();
        predictor
            .learn_from_access("far-away", &context, now - Duration::days(2), "alice")
            .unwrap();

        let related = predictor.predict_related("anchor", &context, now).unwrap();
        assert_eq!(related.len(), 1);
        assert!(related[0].predicted_ids.contains(&"companion".to_string()));
        assert!(!related[0].predicted_ids.contains(&"far-away".to_string()));
    }

    #[test]
    fn test_events_pruned_to_window() {
        let predictor = PatternPredictor::default();
        let context = context_for("alice");
        let now = Utc::now();

        predictor
            .learn_from_access("ancient", &context, now - Duration::days(45), "alice")
            .unwrap();
        predictor.learn_from_access("recent", &context, now, "alice").unwrap();

        let events = predictor.events_snapshot().unwrap();
        let ids: Vec<&str> = events["alice"].iter().map(|(_, id)| id.as_str()).collect();
        assert_eq!(ids, vec!["recent"]);
    }

    #[test]
    fn test_rank_dedup_and_cap() {
        let predictor = PatternPredictor::default();
        let now = Utc::now();
        let context = context_for("alice");

        let make = |ids: &[&str], confidence: f64| MemoryPrediction {
            id: prediction_id(PredictionType::NextItem),
            predicted_ids: ids.iter().map(|s| s.to_string()).collect(),
            kind: PredictionType::NextItem,
            tier: ConfidenceTier::from_score(confidence),
            confidence,
            reasoning: String::new(),
            context: context.clone(),
            predicted_at: now,
            valid_until: now + Duration::hours(1),
            evidence: HashMap::new(),
        };

        let ranked = predictor.rank_predictions(vec![
            make(&["a", "b"], 0.5),
            make(&["b", "c"], 0.9),
            make(&["d"], 0.7),
        ]);

        // The 0.9 prediction claims b and c; the 0.5 one is dropped for reuse
        assert_eq!(ranked.len(), 2);
        assert!((ranked[0].confidence - 0.9).abs() < 1e-9);
        assert!((ranked[1].confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_prediction_confidences_in_bounds() {
        let predictor = PatternPredictor::default();
        learn_chain(&predictor, "alice", &["a", "b", "c", "d", "e"]);
        learn_chain(&predictor, "bob", &["a", "b", "c", "z", "q"]);

        let recent = vec!["a".to_string(), "b".to_string()];
        let predictions = predictor
            .predict(&context_for("alice"), "alice", &recent, Utc::now())
            .unwrap();

        for prediction in predictions {
            assert!((0.0..=1.0).contains(&prediction.confidence));
        }
    }
}
