//! User Profile Learner
//!
//! Per-user preference accumulators created lazily on first query. The
//! retrieval engine's learning hook nudges preferences upward after every
//! retrieval; the user-preference ranking factor reads them back. Similar-user
//! sets are mined by the pattern predictor and written in from there.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::memory::{MemoryContext, MemoryItem, MemoryType};

use super::{Result, RetrievalError};

/// Profile id used when no user is present in the query context
pub const ANONYMOUS_USER: &str = "anonymous";

/// Starting preference for a type or tag seen for the first time
const BASELINE_PREFERENCE: f64 = 0.5;

/// Per-retrieval preference increments
const KIND_INCREMENT: f64 = 0.05;
const TAG_INCREMENT: f64 = 0.02;

// ============================================================================
// USER PROFILE
// ============================================================================

/// Accumulated preferences for one user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// User identifier
    pub user_id: String,
    /// Tag -> preference weight
    pub tag_preferences: HashMap<String, f64>,
    /// Memory type -> preference weight
    pub kind_preferences: HashMap<MemoryType, f64>,
    /// Context key (`project:X`) -> preference weight
    pub context_preferences: HashMap<String, f64>,
    /// Users judged similar by access-pattern overlap
    pub similar_users: Vec<String>,
    /// Last accumulation time
    pub last_updated: DateTime<Utc>,
}

impl UserProfile {
    /// Create an empty profile
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            tag_preferences: HashMap::new(),
            kind_preferences: HashMap::new(),
            context_preferences: HashMap::new(),
            similar_users: Vec::new(),
            last_updated: Utc::now(),
        }
    }

    /// Preference score for an item, in [0, 1]
    ///
    /// Blend of 0.4x the type preference, 0.3x the mean tag preference, and
    /// 0.3x the preference for the item's project context.
    pub fn preference_for(&self, item: &MemoryItem) -> f64 {
        let mut score = 0.0;

        if let Some(weight) = self.kind_preferences.get(&item.kind) {
            score += weight * 0.4;
        }

        if !item.tags.is_empty() {
            let tag_sum: f64 = item
                .tags
                .iter()
                .map(|tag| self.tag_preferences.get(tag).copied().unwrap_or(0.0))
                .sum();
            score += (tag_sum / item.tags.len() as f64) * 0.3;
        }

        if let Some(project) = &item.context.project {
            let key = format!("project:{project}");
            if let Some(weight) = self.context_preferences.get(&key) {
                score += weight * 0.3;
            }
        }

        score.min(1.0)
    }

    /// Nudge preferences after a retrieval that surfaced this item
    pub fn note_retrieved(&mut self, item: &MemoryItem, now: DateTime<Utc>) {
        let kind = self
            .kind_preferences
            .entry(item.kind)
            .or_insert(BASELINE_PREFERENCE);
        *kind = (*kind + KIND_INCREMENT).min(1.0);

        for tag in &item.tags {
            let weight = self
                .tag_preferences
                .entry(tag.clone())
                .or_insert(BASELINE_PREFERENCE);
            *weight = (*weight + TAG_INCREMENT).min(1.0);
        }

        self.last_updated = now;
    }
}

// ============================================================================
// PROFILE STORE
// ============================================================================

/// Lazily-created profile registry keyed by user id
#[derive(Default)]
pub struct ProfileStore {
    profiles: RwLock<HashMap<String, UserProfile>>,
}

impl ProfileStore {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// User id for a query context (`anonymous` when absent)
    pub fn user_id_for(context: Option<&MemoryContext>) -> String {
        context
            .and_then(|c| c.user.clone())
            .unwrap_or_else(|| ANONYMOUS_USER.to_string())
    }

    /// Snapshot of the profile for a context, creating it if needed
    pub fn profile_for(&self, context: Option<&MemoryContext>) -> Result<UserProfile> {
        let user_id = Self::user_id_for(context);
        let mut profiles = self.write()?;
        Ok(profiles
            .entry(user_id.clone())
            .or_insert_with(|| UserProfile::new(user_id))
            .clone())
    }

    /// Apply the learning hook for a set of retrieved items
    pub fn note_retrieved(
        &self,
        user_id: &str,
        items: &[&MemoryItem],
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut profiles = self.write()?;
        let profile = profiles
            .entry(user_id.to_string())
            .or_insert_with(|| UserProfile::new(user_id));

        for item in items {
            profile.note_retrieved(item, now);
        }
        Ok(())
    }

    /// Replace a user's similar-user set (mined by the pattern predictor)
    pub fn set_similar_users(
        &self,
        user_id: &str,
        similar: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut profiles = self.write()?;
        let profile = profiles
            .entry(user_id.to_string())
            .or_insert_with(|| UserProfile::new(user_id));
        profile.similar_users = similar;
        profile.last_updated = now;
        Ok(())
    }

    /// Number of known profiles
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    /// Whether no profile exists yet
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, UserProfile>>> {
        self.profiles
            .read()
            .map_err(|e| RetrievalError::Lock(e.to_string()))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, UserProfile>>> {
        self.profiles
            .write()
            .map_err(|e| RetrievalError::Lock(e.to_string()))
    }
}

// ============================================================================
// TESTS
// ============================================================================
