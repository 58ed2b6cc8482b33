//! Preload Cache
//!
//! Bounded working set of items expected to be requested soon. Insertion
//! beyond capacity evicts the entry with the oldest load time (insertion-age,
//! not LRU-by-access). Hit rate is the fraction of cached entries with at
//! least one recorded access, recomputed on demand.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::memory::MemoryItem;

use super::{PredictorError, Result};

/// Default preload cache capacity
pub const DEFAULT_PRELOAD_CAPACITY: usize = 1_000;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone)]
struct PreloadEntry {
    item: MemoryItem,
    loaded_at: DateTime<Utc>,
    access_count: u32,
}

/// Point-in-time view of the preload cache
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreloadStats {
    /// Cached entries
    pub size: usize,
    /// Configured capacity
    pub capacity: usize,
    /// Fraction of cached entries with at least one recorded access
    pub hit_rate: f64,
}

// ============================================================================
// PRELOAD CACHE
// ============================================================================

/// Bounded insertion-age-evicted item cache
pub struct PreloadCache {
    entries: RwLock<HashMap<String, PreloadEntry>>,
    capacity: usize,
}

impl PreloadCache {
    /// Create a cache with the given capacity (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert an item, evicting the oldest-loaded entry when full
    pub fn insert(&self, item: MemoryItem, now: DateTime<Utc>) -> Result<()> {
        let mut entries = self.write()?;

        if entries.len() >= self.capacity && !entries.contains_key(&item.id) {
            let oldest = entries
                .iter()
                .min_by(|a, b| {
                    a.1.loaded_at
                        .cmp(&b.1.loaded_at)
                        .then_with(|| a.0.cmp(b.0))
                })
                .map(|(id, _)| id.clone());
            if let Some(id) = oldest {
                entries.remove(&id);
            }
        }

        entries.insert(
            item.id.clone(),
            PreloadEntry {
                item,
                loaded_at: now,
                access_count: 0,
            },
        );
        Ok(())
    }

    /// Fetch a cached item, counting the access
    pub fn get(&self, id: &str) -> Result<Option<MemoryItem>> {
        let mut entries = self.write()?;
        Ok(entries.get_mut(id).map(|entry| {
            entry.access_count += 1;
            entry.item.clone()
        }))
    }

    /// Whether an id is cached, without counting an access
    pub fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.read()?.contains_key(id))
    }

    /// Number of cached entries
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Current size, capacity, and hit rate
    pub fn stats(&self) -> Result<PreloadStats> {
        let entries = self.read()?;
        let size = entries.len();
        let hit_rate = if size == 0 {
            0.0
        } else {
            let touched = entries.values().filter(|e| e.access_count > 0).count();
            touched as f64 / size as f64
        };

        Ok(PreloadStats {
            size,
            capacity: self.capacity,
            hit_rate,
        })
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, PreloadEntry>>> {
        self.entries
            .read()
            .map_err(|e| PredictorError::Lock(e.to_string()))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, PreloadEntry>>> {
        self.entries
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
    use chrono::Duration;

    fn item(id: &str) -> MemoryItem {
        MemoryItem::with_id_at(id, format!("content {id}"), MemoryType::Text, Utc::now())
    }

    #[test]
    fn test_get_counts_access() {
        let cache = PreloadCache::new(10);
        let now = Utc::now();
        cache.insert(item("a"), now).unwrap();

        assert!(cache.get("a").unwrap().is_some());
        assert!(cache.get("missing").unwrap().is_none());

        let stats = cache.stats().unwrap();
        assert_eq!(stats.size, 1);
        assert_eq!(stats.hit_rate, 1.0);
    }

    #[test]
    fn test_capacity_evicts_oldest_load_time() {
        let cache = PreloadCache::new(3);
        let base = Utc::now();

        cache.insert(item("oldest"), base).unwrap();
        cache.insert(item("middle"), base + Duration::seconds(1)).unwrap();
        cache.insert(item("newer"), base + Duration::seconds(2)).unwrap();

        // Touch the oldest entry: eviction is by load time, not access
        cache.get("oldest").unwrap();

        cache.insert(item("newest"), base + Duration::seconds(3)).unwrap();

        assert_eq!(cache.len().unwrap(), 3);
        assert!(!cache.contains("oldest").unwrap());
        assert!(cache.contains("middle").unwrap());
        assert!(cache.contains("newest").unwrap());
    }

    #[test]
    fn test_reinsert_does_not_evict() {
        let cache = PreloadCache::new(2);
        let base = Utc::now();

        cache.insert(item("a"), base).unwrap();
        cache.insert(item("b"), base + Duration::seconds(1)).unwrap();
        // Same id: refresh in place, no eviction
        cache.insert(item("a"), base + Duration::seconds(2)).unwrap();

        assert_eq!(cache.len().unwrap(), 2);
        assert!(cache.contains("a").unwrap());
        assert!(cache.contains("b").unwrap());
    }

    #[test]
    fn test_hit_rate_fraction_of_touched_entries() {
        let cache = PreloadCache::new(10);
        let now = Utc::now();
        for id in ["a", "b", "c", "d"] {
            cache.insert(item(id), now).unwrap();
        }

        cache.get("a").unwrap();
        cache.get("a").unwrap();
        cache.get("b").unwrap();

        let stats = cache.stats().unwrap();
        // 2 of 4 entries have been accessed at least once
        assert!((stats.hit_rate - 0.5).abs() < 1e-9);
    }
}
