//! `blog search` and `blog posts`.
//!
//! Both open a [`SearchSession`] over the configured artifact. The ranking
//! strategy follows the artifact: a lexical-mode artifact, or any artifact
//! when the embedding provider is disabled, is ranked through the keyword
//! index; otherwise queries go through the hybrid ranker.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use blog_search_core::corpus::Corpus;
use blog_search_core::models::ArtifactMode;
use blog_search_core::rank::{HybridRanker, LexicalRanker, Ranker, ScoreBreakdown};
use blog_search_core::session::{Listing, SearchSession};
use blog_search_core::tags::tag_set;
use serde::Serialize;

use crate::config::Config;
use crate::embedding::create_embedder;

/// Flags shared by `search` and `posts`.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Keep posts carrying all of these tags.
    pub tags: Vec<String>,
    pub limit: Option<usize>,
    pub json: bool,
    /// Include the score breakdown.
    pub explain: bool,
}

/// One displayed result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub filename: String,
    pub title: String,
    pub date: String,
    pub description: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explain: Option<ScoreBreakdown>,
}

impl SearchHit {
    fn from_listing(listing: &Listing<'_>, explain: bool) -> Self {
        let meta = &listing.post.record.meta;
        Self {
            filename: listing.post.filename().to_string(),
            title: meta.title.clone(),
            date: meta.date.clone(),
            description: meta.description.clone(),
            tags: meta.tags.clone(),
            score: listing.rank.map(|r| r.score),
            explain: if explain {
                listing.rank.and_then(|r| r.explain)
            } else {
                None
            },
        }
    }
}

/// Pick the ranker for a loaded corpus.
pub fn build_ranker(config: &Config, corpus: &Corpus) -> Result<Arc<dyn Ranker>> {
    if corpus.mode() == ArtifactMode::Lexical {
        return Ok(Arc::new(LexicalRanker));
    }
    if !config.embedding.is_enabled() {
        tracing::info!("embedding provider disabled, ranking through the keyword index");
        return Ok(Arc::new(LexicalRanker));
    }

    let embedder = create_embedder(&config.embedding)?;
    if let Some(dims) = corpus.dims() {
        if dims != embedder.dims() {
            tracing::warn!(
                artifact_dims = dims,
                provider_dims = embedder.dims(),
                "artifact vectors do not match the embedding provider; rebuild the artifact"
            );
        }
    }
    Ok(Arc::new(HybridRanker::new(embedder, config.ranking.params())))
}

/// Load the configured artifact and start a session with the fitting ranker.
pub fn open_session(config: &Config) -> Result<SearchSession> {
    let path = &config.artifact.path;
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read artifact {} (run `blog build` first)", path.display()))?;
    let corpus = Corpus::from_json(&json)
        .with_context(|| format!("Failed to load artifact {}", path.display()))?;
    tracing::debug!(posts = corpus.len(), mode = %corpus.mode(), "artifact loaded");
    let ranker = build_ranker(config, &corpus)?;
    Ok(SearchSession::new(Arc::new(corpus), ranker))
}

/// Rank `query`, narrow by tags, and return the displayed hits.
///
/// A blank query lists every post newest first.
pub async fn search_posts(config: &Config, query: &str, opts: &SearchOptions) -> Result<Vec<SearchHit>> {
    let mut session = open_session(config)?;
    session.set_tags(tag_set(&opts.tags)).await;
    let state = session.search(query).await;
    if let Some(error) = state.error() {
        bail!("search failed: {}", error);
    }

    let mut hits: Vec<SearchHit> = session
        .visible()
        .iter()
        .map(|listing| SearchHit::from_listing(listing, opts.explain))
        .collect();
    if let Some(limit) = opts.limit {
        hits.truncate(limit);
    }
    tracing::debug!(query, ranker = session.ranker().name(), hits = hits.len(), "search finished");
    Ok(hits)
}

/// CLI entry point for `blog search`.
pub async fn run_search(config: &Config, query: &str, opts: &SearchOptions) -> Result<()> {
    let hits = search_posts(config, query, opts).await?;
    print_hits(&hits, opts)
}

/// CLI entry point for `blog posts`: the unranked listing.
pub async fn run_posts(config: &Config, opts: &SearchOptions) -> Result<()> {
    let hits = search_posts(config, "", opts).await?;
    print_hits(&hits, opts)
}

fn print_hits(hits: &[SearchHit], opts: &SearchOptions) -> Result<()> {
    if opts.json {
        println!("{}", serde_json::to_string_pretty(hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        let title = if hit.title.is_empty() {
            "(untitled)"
        } else {
            hit.title.as_str()
        };
        match hit.score {
            Some(score) => println!("{}. [{:.2}] {}", i + 1, score, title),
            None => println!("{}. {}", i + 1, title),
        }
        println!("    file: {}", hit.filename);
        if !hit.date.is_empty() {
            println!("    date: {}", hit.date);
        }
        if !hit.tags.is_empty() {
            println!("    tags: {}", hit.tags.join(", "));
        }
        if !hit.description.is_empty() {
            println!("    description: \"{}\"", hit.description.replace('\n', " ").trim());
        }
        if let Some(b) = &hit.explain {
            println!(
                "    explain: semantic {:.3}  coverage {:.3}  boost {:.1}",
                b.semantic, b.coverage, b.boost
            );
        }
        println!();
    }
    Ok(())
}
