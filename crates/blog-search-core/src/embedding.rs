//! Embedding backend trait and vector utilities.
//!
//! Defines the [`Embedder`] trait that all embedding backends implement,
//! plus pure helpers for normalization and similarity.
//!
//! Concrete backends (local fastembed model, Ollama, OpenAI, feature hashing)
//! live in the `blog-search` app crate and are injected into the ranker.
//!
//! # Query asymmetry
//!
//! Posts are embedded chunk by chunk as-is. Queries go through
//! [`embed_query`], which normalizes the query text and prepends
//! [`QUERY_PREFIX`], the retrieval instruction used by asymmetric
//! dual-encoder models such as BGE.

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::normalize::normalize;

/// Instruction prepended to search queries before embedding.
pub const QUERY_PREFIX: &str = "Represent this sentence for searching relevant passages: ";

/// A text-to-vector embedding backend.
///
/// Implementations must return L2-normalized vectors and must fail rather
/// than return a placeholder (for example a zero vector) when the backend is
/// unavailable.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"bge-small-en-v1.5"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("embedding backend returned no vector"))
    }
}

/// Build the exact string embedded for a search query.
pub fn query_text(query: &str) -> String {
    format!("{}{}", QUERY_PREFIX, normalize(query))
}

/// Embed a search query with the retrieval instruction prefix.
pub async fn embed_query(embedder: &dyn Embedder, query: &str) -> Result<Vec<f32>> {
    embedder.embed(&query_text(query)).await
}

/// Scale a vector to unit length in place.
///
/// Zero vectors are left untouched.
pub fn l2_normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in vec.iter_mut() {
            *x /= norm;
        }
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors, zero vectors, or vectors of different
/// lengths. Never panics.
///
/// # Formula
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Best cosine similarity between a query and any chunk vector of a post.
///
/// A post without chunk vectors scores exactly `0.0`.
pub fn max_similarity(query: &[f32], chunks: &[Vec<f32>]) -> f32 {
    chunks
        .iter()
        .map(|c| cosine_similarity(query, c))
        .reduce(f32::max)
        .unwrap_or(0.0)
}
