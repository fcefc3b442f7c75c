//! FNV-1a feature-hashing embedder.
//!
//! Deterministic, dependency-free vectors built from token and bigram
//! hashes. Semantically weak, but needs no model download, which makes it
//! the provider for offline builds and tests.

use anyhow::Result;
use async_trait::async_trait;
use blog_search_core::embedding::{l2_normalize, Embedder};

pub const HASH_MODEL_NAME: &str = "fnv1a-hash";
pub const DEFAULT_HASH_DIMS: usize = 384;

pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0; self.dims];
        if self.dims == 0 {
            return embedding;
        }

        let tokens = tokenize(text);
        for token in &tokens {
            accumulate(&mut embedding, token, 1.0);
        }
        for window in tokens.windows(2) {
            accumulate(&mut embedding, &format!("{} {}", window[0], window[1]), 0.5);
        }

        l2_normalize(&mut embedding);
        embedding
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        HASH_MODEL_NAME
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.len() >= 2)
        .map(str::to_string)
        .collect()
}

fn accumulate(embedding: &mut [f32], token: &str, weight: f32) {
    let token_hash = fnv1a(token.as_bytes());
    let len = embedding.len();
    for i in 0..len {
        let mut salted = [0u8; 16];
        salted[..8].copy_from_slice(&token_hash.to_le_bytes());
        salted[8..].copy_from_slice(&(i as u64).to_le_bytes());
        // FNV-1a low bits track the input's low bits; mix before slicing.
        let dim_hash = splitmix64(fnv1a(&salted));
        let sign = if dim_hash >> 63 == 0 { weight } else { -weight };
        embedding[((dim_hash >> 32) as usize) % len] += sign;
    }
}

fn splitmix64(mut x: u64) -> u64 {
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d049bb133111eb);
    x ^ (x >> 31)
}

fn fnv1a(data: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    data.iter()
        .fold(OFFSET, |hash, byte| (hash ^ *byte as u64).wrapping_mul(PRIME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use blog_search_core::embedding::cosine_similarity;

    #[test]
    fn test_deterministic_and_normalized() {
        let e = HashEmbedder::new(64);
        let a = e.embed_text("async rust executors");
        assert_eq!(a, e.embed_text("async rust executors"));
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_power_of_two_dims_stay_normalized() {
        let samples = [
            "async rust executors",
            "borrow checker notes",
            "tokio in practice",
            "lifetimes and borrows",
            "sourdough baking schedule",
            "the quick brown fox jumps over the lazy dog",
            "rust",
        ];
        for dims in [64, 128, 384] {
            let e = HashEmbedder::new(dims);
            for text in samples {
                let v = e.embed_text(text);
                let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
                assert!((norm - 1.0).abs() < 1e-5, "dims {dims}, {text:?}: norm {norm}");
            }
        }
    }

    #[test]
    fn test_shared_tokens_are_closer() {
        let e = HashEmbedder::new(256);
        let base = e.embed_text("async rust executors and wakers");
        let near = e.embed_text("rust executors and wakers explained");
        let far = e.embed_text("sourdough baking schedule");
        assert!(cosine_similarity(&base, &near) > cosine_similarity(&base, &far));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let v = HashEmbedder::new(8).embed_text("!");
        assert_eq!(v, vec![0.0; 8]);
    }

    #[tokio::test]
    async fn test_embed_batch_order() {
        let e = HashEmbedder::new(16);
        let texts = vec!["one".to_string(), "two".to_string()];
        let out = e.embed_batch(&texts).await.unwrap();
        assert_eq!(out[0], e.embed_text("one"));
        assert_eq!(out[1], e.embed_text("two"));
    }
}
