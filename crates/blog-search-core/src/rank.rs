//! Query ranking strategies.
//!
//! Both strategies implement [`Ranker`] and rank the posts of a
//! [`Corpus`]:
//!
//! - [`HybridRanker`] blends semantic similarity with lexical overlap.
//! - [`LexicalRanker`] asks the corpus [`LexicalIndex`](crate::lexical::LexicalIndex)
//!   and flattens its per-field hits.
//!
//! # Hybrid Scoring Algorithm
//!
//! 1. Blank query: every post in corpus order, score 0, no embedding call.
//! 2. Embed the query (with the retrieval prefix).
//! 3. `semantic` = best cosine similarity over the post's chunk vectors
//!    (0 for a post without chunks).
//! 4. Query tokens are lowercased, punctuation-stripped words.
//!    `boost` = 1 if any token occurs in the post, else 0.
//!    `coverage` = distinct tokens present / distinct tokens.
//! 5. `score = 0.7 × semantic + 0.15 × coverage + 0.15 × boost`.
//! 6. Sort by score (desc, stable on corpus order), keep `score > 0.3`.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::corpus::Corpus;
use crate::embedding::{embed_query, max_similarity, Embedder};
use crate::error::SearchError;
use crate::normalize::tokenize;

/// Weights and cut-off of the hybrid score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingParams {
    pub semantic_weight: f64,
    pub coverage_weight: f64,
    pub boost_weight: f64,
    /// Results must score strictly above this.
    pub threshold: f64,
}

impl Default for RankingParams {
    fn default() -> Self {
        Self {
            semantic_weight: 0.7,
            coverage_weight: 0.15,
            boost_weight: 0.15,
            threshold: 0.3,
        }
    }
}

impl RankingParams {
    /// Weighted sum of the three signals.
    pub fn score(&self, semantic: f64, coverage: f64, boost: f64) -> f64 {
        self.semantic_weight * semantic + self.coverage_weight * coverage + self.boost_weight * boost
    }

    /// Whether a final score survives the threshold.
    pub fn passes(&self, score: f64) -> bool {
        score > self.threshold
    }
}

/// Scoring breakdown for a ranked post.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub semantic: f64,
    pub coverage: f64,
    pub boost: f64,
    pub score: f64,
}

/// A post in a ranked result list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedPost {
    /// Position of the post in [`Corpus::posts`].
    pub index: usize,
    pub filename: String,
    pub score: f64,
    /// Present for hybrid results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explain: Option<ScoreBreakdown>,
}

/// A ranking strategy.
#[async_trait]
pub trait Ranker: Send + Sync {
    /// Short strategy name for logs and `--explain` output.
    fn name(&self) -> &str;

    /// Rank the corpus for `query`.
    ///
    /// A blank query returns every post in corpus order with score 0.
    async fn rank(&self, query: &str, corpus: &Corpus) -> Result<Vec<RankedPost>, SearchError>;
}

/// Every post in corpus order, unscored.
pub fn unranked(corpus: &Corpus) -> Vec<RankedPost> {
    corpus
        .posts()
        .iter()
        .enumerate()
        .map(|(index, post)| RankedPost {
            index,
            filename: post.filename().to_string(),
            score: 0.0,
            explain: None,
        })
        .collect()
}

/// Distinct query tokens, in first-seen order.
pub fn query_tokens(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    tokenize(query)
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// `(coverage, boost)` of a token list against one post.
pub fn lexical_signals(tokens: &[String], has_token: impl Fn(&str) -> bool) -> (f64, f64) {
    if tokens.is_empty() {
        return (0.0, 0.0);
    }
    let present = tokens.iter().filter(|t| has_token(t)).count();
    let coverage = present as f64 / tokens.len() as f64;
    let boost = if present > 0 { 1.0 } else { 0.0 };
    (coverage, boost)
}

/// Semantic + lexical ranking over precomputed chunk embeddings.
pub struct HybridRanker {
    embedder: Arc<dyn Embedder>,
    params: RankingParams,
}

impl HybridRanker {
    pub fn new(embedder: Arc<dyn Embedder>, params: RankingParams) -> Self {
        Self { embedder, params }
    }
}

#[async_trait]
impl Ranker for HybridRanker {
    fn name(&self) -> &str {
        "hybrid"
    }

    async fn rank(&self, query: &str, corpus: &Corpus) -> Result<Vec<RankedPost>, SearchError> {
        if query.trim().is_empty() {
            return Ok(unranked(corpus));
        }

        let query_vec = embed_query(self.embedder.as_ref(), query)
            .await
            .map_err(SearchError::embedding)?;
        let tokens = query_tokens(query);

        let mut results: Vec<RankedPost> = corpus
            .posts()
            .iter()
            .enumerate()
            .map(|(index, post)| {
                let semantic = max_similarity(&query_vec, &post.chunks) as f64;
                let (coverage, boost) = lexical_signals(&tokens, |t| post.has_token(t));
                let score = self.params.score(semantic, coverage, boost);
                RankedPost {
                    index,
                    filename: post.filename().to_string(),
                    score,
                    explain: Some(ScoreBreakdown {
                        semantic,
                        coverage,
                        boost,
                        score,
                    }),
                }
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.retain(|r| self.params.passes(r.score));

        tracing::debug!(
            query,
            candidates = corpus.len(),
            kept = results.len(),
            "hybrid rank"
        );
        Ok(results)
    }
}

/// Ranking through the corpus keyword index.
///
/// Hits are taken field by field (title, description, tags, content); a post
/// keeps the first position it is seen at. No threshold applies.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalRanker;

#[async_trait]
impl Ranker for LexicalRanker {
    fn name(&self) -> &str {
        "lexical"
    }

    async fn rank(&self, query: &str, corpus: &Corpus) -> Result<Vec<RankedPost>, SearchError> {
        if query.trim().is_empty() {
            return Ok(unranked(corpus));
        }

        let mut seen = HashSet::new();
        let mut results = Vec::new();
        for field_hits in corpus.index().search(query) {
            for hit in field_hits.hits {
                let Some(index) = corpus.position(&hit.filename) else {
                    continue;
                };
                if seen.insert(index) {
                    results.push(RankedPost {
                        index,
                        filename: hit.filename,
                        score: hit.score,
                        explain: None,
                    });
                }
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Artifact, EmbeddedPost, PostMeta, PostRecord};
    use anyhow::{bail, Result};

    /// Two-dimensional embedder counting "rust" and "go" tokens.
    struct TopicEmbedder;

    #[async_trait]
    impl Embedder for TopicEmbedder {
        fn model_name(&self) -> &str {
            "topic"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| topic_vector(t)).collect())
        }
    }

    fn topic_vector(text: &str) -> Vec<f32> {
        let tokens = tokenize(text);
        let count = |w: &str| tokens.iter().filter(|t| t.as_str() == w).count() as f32;
        let mut v = vec![count("rust"), count("go")];
        crate::embedding::l2_normalize(&mut v);
        v
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model_name(&self) -> &str {
            "failing"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            bail!("model not loaded")
        }
    }

    fn post(filename: &str, date: &str, title: &str, tags: &[&str], body: &str) -> EmbeddedPost {
        EmbeddedPost {
            post: PostRecord {
                filename: filename.into(),
                meta: PostMeta {
                    date: date.into(),
                    title: title.into(),
                    tags: tags.iter().map(|t| t.to_string()).collect(),
                    ..Default::default()
                },
                content: body.to_lowercase(),
            },
            embedding: vec![topic_vector(&format!("{} {}", title, body))],
        }
    }

    fn blog() -> Corpus {
        Corpus::from_artifact(Artifact::Embedded(vec![
            post("a.md", "2024-03-01", "Async Rust internals", &["rust"], "Executors and wakers."),
            post("b.md", "2024-02-01", "Go concurrency patterns", &["go"], "Goroutines and channels."),
            post("c.md", "2024-01-01", "Comparing Rust and Go", &["rust", "go"], "Tradeoffs."),
        ]))
    }

    fn hybrid() -> HybridRanker {
        HybridRanker::new(Arc::new(TopicEmbedder), RankingParams::default())
    }

    fn names(results: &[RankedPost]) -> Vec<&str> {
        results.iter().map(|r| r.filename.as_str()).collect()
    }

    #[tokio::test]
    async fn test_hybrid_rust_query() {
        let results = hybrid().rank("rust", &blog()).await.unwrap();
        assert_eq!(names(&results), vec!["a.md", "c.md"]);
        assert!(results[0].score > results[1].score);
        let a = results[0].explain.unwrap();
        assert!((a.semantic - 1.0).abs() < 1e-6);
        assert_eq!(a.coverage, 1.0);
        assert_eq!(a.boost, 1.0);
    }

    #[tokio::test]
    async fn test_hybrid_tag_filter_after_rank() {
        let results = hybrid().rank("rust", &blog()).await.unwrap();
        let corpus = blog();
        let selected = crate::tags::tag_set(["go"]);
        let kept: Vec<&str> = results
            .iter()
            .filter(|r| crate::tags::has_all_tags(&corpus.posts()[r.index], &selected))
            .map(|r| r.filename.as_str())
            .collect();
        assert_eq!(kept, vec!["c.md"]);
    }

    #[tokio::test]
    async fn test_blank_query_returns_corpus_order() {
        let corpus = blog();
        for ranker in [&hybrid() as &dyn Ranker, &LexicalRanker] {
            let results = ranker.rank("   ", &corpus).await.unwrap();
            assert_eq!(names(&results), vec!["a.md", "b.md", "c.md"]);
            assert!(results.iter().all(|r| r.score == 0.0));
        }
    }

    #[tokio::test]
    async fn test_blank_query_skips_embedder() {
        let ranker = HybridRanker::new(Arc::new(FailingEmbedder), RankingParams::default());
        assert_eq!(ranker.rank("", &blog()).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_embedding_failure_is_error() {
        let ranker = HybridRanker::new(Arc::new(FailingEmbedder), RankingParams::default());
        let err = ranker.rank("rust", &blog()).await.unwrap_err();
        assert!(matches!(err, SearchError::Embedding(msg) if msg.contains("model not loaded")));
    }

    #[tokio::test]
    async fn test_lexical_only_match_scores_exactly_threshold_and_is_dropped() {
        // Orthogonal chunk vector: semantic 0, full lexical overlap gives
        // 0.15 + 0.15 = 0.3, which is not above the threshold.
        let mut p = post("x.md", "2024-01-01", "Go notes", &[], "rust mentioned once");
        p.embedding = vec![vec![0.0, 1.0]];
        let corpus = Corpus::from_artifact(Artifact::Embedded(vec![p]));
        let results = hybrid().rank("rust", &corpus).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_post_without_chunks_has_zero_semantic() {
        let mut p = post("x.md", "2024-01-01", "Rust", &[], "");
        p.embedding.clear();
        let params = RankingParams {
            threshold: -1.0,
            ..Default::default()
        };
        let ranker = HybridRanker::new(Arc::new(TopicEmbedder), params);
        let corpus = Corpus::from_artifact(Artifact::Embedded(vec![p]));
        let results = ranker.rank("rust", &corpus).await.unwrap();
        assert_eq!(results[0].explain.unwrap().semantic, 0.0);
    }

    #[tokio::test]
    async fn test_ties_keep_corpus_order() {
        let params = RankingParams {
            threshold: -1.0,
            ..Default::default()
        };
        let ranker = HybridRanker::new(Arc::new(TopicEmbedder), params);
        let results = ranker.rank("unrelated", &blog()).await.unwrap();
        assert_eq!(names(&results), vec!["a.md", "b.md", "c.md"]);
    }

    #[tokio::test]
    async fn test_lexical_ranker_dedups_across_fields() {
        let results = LexicalRanker.rank("rust", &blog()).await.unwrap();
        // Title hits first (a, c); tag and content hits add nothing new.
        assert_eq!(names(&results), vec!["a.md", "c.md"]);
        assert!(results.iter().all(|r| r.explain.is_none()));
    }

    #[tokio::test]
    async fn test_lexical_ranker_content_only_hit() {
        let results = LexicalRanker.rank("wakers", &blog()).await.unwrap();
        assert_eq!(names(&results), vec!["a.md"]);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let params = RankingParams::default();
        assert!(!params.passes(0.3));
        assert!(params.passes(0.30001));
        assert!(!params.passes(params.score(0.0, 1.0, 1.0)));
    }

    #[test]
    fn test_score_weights() {
        let params = RankingParams::default();
        assert!((params.score(1.0, 1.0, 1.0) - 1.0).abs() < 1e-12);
        assert!((params.score(0.5, 0.5, 1.0) - 0.575).abs() < 1e-12);
    }

    #[test]
    fn test_lexical_signals() {
        let tokens = query_tokens("Rust, rust and GO!");
        assert_eq!(tokens, vec!["rust", "and", "go"]);
        let (coverage, boost) = lexical_signals(&tokens, |t| t == "rust");
        assert!((coverage - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(boost, 1.0);
        assert_eq!(lexical_signals(&tokens, |_| false), (0.0, 0.0));
        assert_eq!(lexical_signals(&[], |_| true), (0.0, 0.0));
    }
}
