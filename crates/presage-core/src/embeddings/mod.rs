//! Embedding Service Boundary
//!
//! Embedding generation is an external collaborator: the engine consumes any
//! [`EmbeddingProvider`] and degrades to token-overlap similarity when the
//! provider is absent or fails. Similarity math lives here so the store and
//! the retrieval engine share one implementation.
//!
//! The optional `local-embeddings` feature supplies an in-process provider
//! backed by fastembed (ONNX inference, no network service required).

use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;

#[cfg(feature = "local-embeddings")]
mod local;

#[cfg(feature = "local-embeddings")]
pub use local::LocalEmbeddingProvider;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Embedding collaborator errors
#[non_exhaustive]
#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    /// Provider could not be initialized
    #[error("Provider initialization failed: {0}")]
    Init(String),
    /// Encoding call failed
    #[error("Encoding failed: {0}")]
    Encoding(String),
    /// Invalid input (empty batch, oversized text, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for embedding operations
pub type Result<T> = std::result::Result<T, EmbeddingError>;

// ============================================================================
// PROVIDER TRAIT
// ============================================================================

/// External embedding service boundary
///
/// `encode` returns one fixed-dimension vector per input string. Failures are
/// expected and non-fatal: callers fall back to token-overlap similarity.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Encode a batch of texts into embedding vectors
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Dimensionality of the produced vectors
    fn dimensions(&self) -> usize;
}

// ============================================================================
// SIMILARITY FUNCTIONS
// ============================================================================

/// Compute cosine similarity between two vectors
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot_product = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;

    for (x, y) in a.iter().zip(b.iter()) {
        dot_product += (*x as f64) * (*y as f64);
        norm_a += (*x as f64) * (*x as f64);
        norm_b += (*y as f64) * (*y as f64);
    }

    let denominator = (norm_a * norm_b).sqrt();
    if denominator > 0.0 {
        dot_product / denominator
    } else {
        0.0
    }
}

/// Token-overlap (Jaccard) similarity between two texts
///
/// The degraded similarity path used whenever no embedding is available for
/// either side of a comparison.
pub fn token_overlap(a: &str, b: &str) -> f64 {
    let tokens_a: HashSet<String> =
        a.to_lowercase().split_whitespace().map(String::from).collect();
    let tokens_b: HashSet<String> =
        b.to_lowercase().split_whitespace().map(String::from).collect();

    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();

    intersection as f64 / union as f64
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&a, &a);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_dimension_mismatch() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_token_overlap_identical() {
        let sim = token_overlap("rust async runtime", "rust async runtime");
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_token_overlap_partial() {
        let sim = token_overlap("rust async", "rust sync");
        // intersection {rust} = 1, union {rust, async, sync} = 3
        assert!((sim - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_token_overlap_case_insensitive() {
        let sim = token_overlap("Fibonacci Numbers", "fibonacci numbers");
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_token_overlap_empty() {
        assert_eq!(token_overlap("", "anything"), 0.0);
    }
}
