//! Local Embedding Provider
//!
//! In-process [`EmbeddingProvider`] backed by fastembed (ONNX inference).
//! Model files are downloaded on first use and cached under the platform
//! cache directory, or `PRESAGE_EMBED_CACHE` when set.

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::Mutex;

use super::{EmbeddingError, EmbeddingProvider, Result};

/// Maximum text length submitted to the model (truncated if longer)
const MAX_TEXT_LENGTH: usize = 8192;

/// Output dimensionality of the default model (bge-small-en-v1.5)
const LOCAL_DIMENSIONS: usize = 384;

fn cache_dir() -> PathBuf {
    if let Ok(path) = std::env::var("PRESAGE_EMBED_CACHE") {
        return PathBuf::from(path);
    }

    if let Some(dirs) = directories::ProjectDirs::from("dev", "presage", "core") {
        return dirs.cache_dir().join("fastembed");
    }

    PathBuf::from(".fastembed_cache")
}

/// Embedding provider running entirely in-process
pub struct LocalEmbeddingProvider {
    model: Mutex<TextEmbedding>,
}

impl LocalEmbeddingProvider {
    /// Initialize the provider, downloading model files if necessary
    pub fn new() -> Result<Self> {
        let cache = cache_dir();
        if let Err(e) = std::fs::create_dir_all(&cache) {
            tracing::warn!("Failed to create embedding cache directory {:?}: {}", cache, e);
        }

        let options = InitOptions::new(EmbeddingModel::BGESmallENV15)
            .with_show_download_progress(false)
            .with_cache_dir(cache);

        let model = TextEmbedding::try_new(options)
            .map_err(|e| EmbeddingError::Init(e.to_string()))?;

        Ok(Self {
            model: Mutex::new(model),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddingProvider {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let truncated: Vec<&str> = texts
            .iter()
            .map(|t| {
                if t.len() > MAX_TEXT_LENGTH {
                    &t[..MAX_TEXT_LENGTH]
                } else {
                    t.as_str()
                }
            })
            .collect();

        let mut model = self
            .model
            .lock()
            .map_err(|e| EmbeddingError::Encoding(format!("Lock poisoned: {e}")))?;

        model
            .embed(truncated, None)
            .map_err(|e| EmbeddingError::Encoding(e.to_string()))
    }

    fn dimensions(&self) -> usize {
        LOCAL_DIMENSIONS
    }
}
