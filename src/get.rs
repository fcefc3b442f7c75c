//! Single post retrieval by filename.
//!
//! Backs `blog get`: selects the post in a session over the artifact and
//! prints its metadata and keyword content.

use anyhow::Result;
use blog_search_core::rank::LexicalRanker;
use blog_search_core::session::SearchSession;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::Config;

/// A post as shown by `blog get`.
#[derive(Debug, Clone, Serialize)]
pub struct PostResponse {
    pub filename: String,
    pub title: String,
    pub date: String,
    pub description: String,
    pub tags: Vec<String>,
    /// Front matter keys beyond the known ones.
    pub extra: BTreeMap<String, serde_json::Value>,
    pub content: String,
    pub chunks: usize,
}

/// Look up one post. Unknown filenames are an error.
pub fn get_post(config: &Config, filename: &str) -> Result<PostResponse> {
    let path = &config.artifact.path;
    // Selection never ranks, so no embedder is needed.
    let mut session = SearchSession::open(path, Arc::new(LexicalRanker))?;
    let post = session.select(filename)?;
    let meta = &post.record.meta;

    Ok(PostResponse {
        filename: post.filename().to_string(),
        title: meta.title.clone(),
        date: meta.date.clone(),
        description: meta.description.clone(),
        tags: meta.tags.clone(),
        extra: meta.extra.clone(),
        content: post.record.content.clone(),
        chunks: post.chunks.len(),
    })
}

/// CLI entry point.
pub fn run_get(config: &Config, filename: &str, json: bool) -> Result<()> {
    let post = get_post(config, filename)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&post)?);
        return Ok(());
    }

    println!("--- Post ---");
    println!("filename:     {}", post.filename);
    println!(
        "title:        {}",
        if post.title.is_empty() { "(untitled)" } else { &post.title }
    );
    println!("date:         {}", post.date);
    if !post.description.is_empty() {
        println!("description:  {}", post.description);
    }
    println!("tags:         {}", post.tags.join(", "));
    for (key, value) in &post.extra {
        println!("{:<13} {}", format!("{}:", key), value);
    }
    println!("chunks:       {}", post.chunks);
    println!();

    println!("--- Content ---");
    println!("{}", post.content);

    Ok(())
}
