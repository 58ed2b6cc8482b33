//! JSON File Persistence
//!
//! One JSON document per item under `<data_dir>/items/`, plus a `stats.json`
//! snapshot of aggregate statistics. The default data directory is the
//! platform data dir (`~/.local/share/presage` on Linux).

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::memory::MemoryItem;
use crate::store::StoreStats;

use super::{Persistence, Result};

/// Persistence collaborator writing JSON documents to a directory tree
pub struct JsonFileStore {
    data_dir: PathBuf,
}

impl JsonFileStore {
    /// Create a store rooted at the given directory
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Create a store rooted at the platform data directory
    pub fn at_default_location() -> Self {
        let data_dir = directories::ProjectDirs::from("dev", "presage", "core")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".presage_data"));
        Self::new(data_dir)
    }

    fn items_dir(&self) -> PathBuf {
        self.data_dir.join("items")
    }

    fn item_path(&self, id: &str) -> PathBuf {
        // Item ids are UUIDs, safe as file names
        self.items_dir().join(format!("{id}.json"))
    }

    async fn ensure_dir(&self, dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(dir).await?;
        Ok(())
    }
}

#[async_trait]
impl Persistence for JsonFileStore {
    async fn save_item(&self, item: &MemoryItem) -> Result<()> {
        self.ensure_dir(&self.items_dir()).await?;
        let payload = serde_json::to_vec_pretty(item)?;
        tokio::fs::write(self.item_path(&item.id), payload).await?;
        Ok(())
    }

    async fn delete_item(&self, id: &str) -> Result<()> {
        let path = self.item_path(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn load_items(&self) -> Result<Vec<MemoryItem>> {
        let dir = self.items_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut items = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<MemoryItem>(&bytes) {
                Ok(item) => items.push(item),
                Err(e) => {
                    tracing::warn!("Skipping unreadable item file {:?}: {}", path, e);
                }
            }
        }

        Ok(items)
    }

    async fn save_stats(&self, stats: &StoreStats) -> Result<()> {
        self.ensure_dir(&self.data_dir).await?;
        let payload = serde_json::to_vec_pretty(stats)?;
        tokio::fs::write(self.data_dir.join("stats.json"), payload).await?;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryType;

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        let item = MemoryItem::new("persisted content", MemoryType::Text)
            .with_tags(["durable"]);
        store.save_item(&item).await.unwrap();

        let loaded = store.load_items().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, item.id);
        assert_eq!(loaded[0].content, "persisted content");
        assert_eq!(loaded[0].fingerprint, item.fingerprint);
    }

    #[tokio::test]
    async fn test_delete_item() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        let item = MemoryItem::new("ephemeral", MemoryType::Text);
        store.save_item(&item).await.unwrap();
        store.delete_item(&item.id).await.unwrap();

        assert!(store.load_items().await.unwrap().is_empty());

        // Deleting an absent item is not an error
        store.delete_item("missing").await.unwrap();
    }

    #[tokio::test]
    async fn test_load_from_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested"));
        assert!(store.load_items().await.unwrap().is_empty());
    }
}
