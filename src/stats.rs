//! Artifact statistics.
//!
//! A quick summary of what a build produced: post and chunk counts, vector
//! dimensionality, keyword index size, and posts per tag. Used by
//! `blog stats` to check a build before publishing it.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use blog_search_core::corpus::Corpus;
use blog_search_core::models::ArtifactMode;
use blog_search_core::tags::tag_counts;
use serde::Serialize;

use crate::config::Config;

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactStats {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub mode: ArtifactMode,
    pub posts: usize,
    pub chunks: usize,
    /// Posts with no chunk vectors.
    pub unembedded: usize,
    pub dims: Option<usize>,
    /// Distinct keyword index tokens.
    pub terms: usize,
    /// Posts whose date does not parse.
    pub undated: usize,
    pub tags: BTreeMap<String, usize>,
}

/// Load the configured artifact and summarize it.
pub fn collect_stats(config: &Config) -> Result<ArtifactStats> {
    let path = &config.artifact.path;
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read artifact {}", path.display()))?;
    let size_bytes = json.len() as u64;
    let corpus = Corpus::from_json(&json)?;

    Ok(ArtifactStats {
        path: path.clone(),
        size_bytes,
        mode: corpus.mode(),
        posts: corpus.len(),
        chunks: corpus.posts().iter().map(|p| p.chunks.len()).sum(),
        unembedded: corpus.posts().iter().filter(|p| p.chunks.is_empty()).count(),
        dims: corpus.dims(),
        terms: corpus.index().term_count(),
        undated: corpus
            .posts()
            .iter()
            .filter(|p| p.record.meta.published().is_none())
            .count(),
        tags: tag_counts(corpus.posts()),
    })
}

/// CLI entry point.
pub fn run_stats(config: &Config, json: bool) -> Result<()> {
    let stats = collect_stats(config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Blog Search: Artifact Stats");
    println!("===========================");
    println!();
    println!("  Artifact:    {}", stats.path.display());
    println!("  Size:        {}", format_bytes(stats.size_bytes));
    println!("  Mode:        {}", stats.mode);
    println!();
    println!("  Posts:       {}", stats.posts);
    if stats.mode == ArtifactMode::Embedding {
        println!("  Chunks:      {}", stats.chunks);
        println!(
            "  Dimensions:  {}",
            stats.dims.map(|d| d.to_string()).unwrap_or_else(|| "-".into())
        );
        if stats.unembedded > 0 {
            println!("  Without vectors: {}", stats.unembedded);
        }
    }
    println!("  Terms:       {}", stats.terms);
    if stats.undated > 0 {
        println!("  Undated:     {}", stats.undated);
    }

    if !stats.tags.is_empty() {
        println!();
        println!("  By tag:");
        println!("  {:<24} {:>6}", "TAG", "POSTS");
        println!("  {}", "-".repeat(31));
        let mut tags: Vec<(&String, &usize)> = stats.tags.iter().collect();
        tags.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
        for (tag, count) in tags {
            println!("  {:<24} {:>6}", tag, count);
        }
    }

    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
