//! Offline artifact build.
//!
//! Coordinates `blog build`: content scan → keyword cleaning → chunking →
//! embedding → one JSON artifact.
//!
//! # Incremental builds
//!
//! Without `--rebuild`, posts whose filename already appears in the existing
//! artifact are skipped and their entries are kept as they are; only new
//! posts are encoded and appended. Entries for posts that no longer exist
//! are pruned. With `--rebuild`, every post is encoded again.
//!
//! A missing artifact counts as empty. An unreadable or malformed one, or
//! one written in the other mode, is reported and the build encodes every
//! post.
//!
//! # Failures
//!
//! An embedding failure is recorded against its post and the build moves
//! on. The artifact is still written (a post that failed during
//! `--rebuild` keeps its previous entry) and the caller decides the exit
//! status from [`BuildReport::failed`].

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{bail, Context, Result};
use blog_search_core::chunk::chunk_words;
use blog_search_core::embedding::Embedder;
use blog_search_core::lexical::LexicalIndex;
use blog_search_core::models::{Artifact, ArtifactMode, EmbeddedPost, LexicalArtifact, PostRecord};
use blog_search_core::normalize::{clean_for_keywords, normalize};
use serde::Serialize;

use crate::config::{ChunkingConfig, Config};
use crate::content::{self, SourcePost};
use crate::embedding::create_embedder;
use crate::progress::{BuildProgressEvent, BuildProgressReporter};

/// Flags of one build run.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Encode every post, ignoring existing entries.
    pub rebuild: bool,
    pub mode: ArtifactMode,
    /// Count what would be encoded without embedding or writing.
    pub dry_run: bool,
}

/// A post that could not be encoded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostFailure {
    pub filename: String,
    pub error: String,
}

/// Outcome counters of a build.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuildReport {
    pub mode: ArtifactMode,
    pub dry_run: bool,
    /// Posts found under the content root.
    pub found: usize,
    /// Posts left untouched because an entry already existed.
    pub skipped: usize,
    /// Posts encoded again under `--rebuild`.
    pub rebuilt: usize,
    /// Posts encoded for the first time.
    pub newly_encoded: usize,
    /// Stale entries dropped because their file is gone.
    pub removed: usize,
    pub failed: Vec<PostFailure>,
    /// Posts in the written artifact.
    pub written: usize,
}

/// Run a full build as configured and write the artifact.
pub async fn run_build(
    config: &Config,
    opts: &BuildOptions,
    progress: &dyn BuildProgressReporter,
) -> Result<BuildReport> {
    if opts.mode == ArtifactMode::Embedding && !config.embedding.is_enabled() {
        bail!("embedding mode requires an embedding provider; use --mode lexical or configure [embedding]");
    }

    progress.report(BuildProgressEvent::Discovering {
        root: config.content.root.display().to_string(),
    });
    let posts = content::scan_posts(&config.content)?;

    let embedder = match opts.mode {
        ArtifactMode::Embedding => Some(create_embedder(&config.embedding)?),
        ArtifactMode::Lexical => None,
    };

    let path = &config.artifact.path;
    let prior = load_prior(path, opts.mode);
    if let Some(embedder) = &embedder {
        if !opts.rebuild {
            warn_on_dims_mismatch(&prior, embedder.dims());
        }
    }

    let (entries, mut report) = build_entries(
        &posts,
        prior,
        opts,
        &config.chunking,
        embedder.as_deref(),
        progress,
    )
    .await;

    if opts.dry_run {
        return Ok(report);
    }

    let artifact = into_artifact(entries, opts.mode);
    report.written = artifact.len();
    write_artifact(path, &artifact)?;
    progress.report(BuildProgressEvent::Written {
        path: path.display().to_string(),
        posts: report.written as u64,
    });

    Ok(report)
}

/// Merge scanned posts with existing entries, encoding what is needed.
///
/// Entries come back in artifact order: kept entries first in their
/// existing order, then newly encoded posts in filename order. Under
/// `--rebuild` the order is the scan order.
pub async fn build_entries(
    posts: &[SourcePost],
    prior: Vec<EmbeddedPost>,
    opts: &BuildOptions,
    chunking: &ChunkingConfig,
    embedder: Option<&dyn Embedder>,
    progress: &dyn BuildProgressReporter,
) -> (Vec<EmbeddedPost>, BuildReport) {
    let mut report = BuildReport {
        mode: opts.mode,
        dry_run: opts.dry_run,
        found: posts.len(),
        ..Default::default()
    };

    let present: HashSet<&str> = posts.iter().map(|p| p.filename.as_str()).collect();
    let prior_count = prior.len();
    let mut seen = HashSet::new();
    let prior: Vec<EmbeddedPost> = prior
        .into_iter()
        .filter(|e| present.contains(e.post.filename.as_str()))
        .filter(|e| seen.insert(e.post.filename.clone()))
        .collect();
    report.removed = prior_count - prior.len();
    if report.removed > 0 {
        tracing::info!(removed = report.removed, "pruning entries for deleted posts");
    }

    let existing: HashSet<String> = prior.iter().map(|e| e.post.filename.clone()).collect();
    let (mut entries, mut fallback): (Vec<EmbeddedPost>, HashMap<String, EmbeddedPost>) =
        if opts.rebuild {
            let fallback = prior
                .into_iter()
                .map(|e| (e.post.filename.clone(), e))
                .collect();
            (Vec::new(), fallback)
        } else {
            (prior, HashMap::new())
        };

    let pending: Vec<&SourcePost> = posts
        .iter()
        .filter(|p| opts.rebuild || !existing.contains(&p.filename))
        .collect();
    report.skipped = posts.len() - pending.len();

    let total = pending.len() as u64;
    for (i, post) in pending.into_iter().enumerate() {
        progress.report(BuildProgressEvent::Encoding {
            filename: post.filename.clone(),
            title: post.meta.title.clone(),
            n: i as u64 + 1,
            total,
        });

        let was_present = existing.contains(&post.filename);
        if opts.dry_run {
            count_encoded(&mut report, was_present);
            continue;
        }

        match encode_post(post, chunking, embedder).await {
            Ok(entry) => {
                tracing::debug!(
                    file = %post.filename,
                    chunks = entry.embedding.len(),
                    "encoded post"
                );
                entries.push(entry);
                count_encoded(&mut report, was_present);
            }
            Err(e) => {
                let error = format!("{:#}", e);
                tracing::warn!(file = %post.filename, error = %error, "failed to encode post");
                report.failed.push(PostFailure {
                    filename: post.filename.clone(),
                    error,
                });
                if let Some(previous) = fallback.remove(&post.filename) {
                    entries.push(previous);
                }
            }
        }
    }

    (entries, report)
}

fn count_encoded(report: &mut BuildReport, was_present: bool) {
    if was_present {
        report.rebuilt += 1;
    } else {
        report.newly_encoded += 1;
    }
}

/// The text embedded for a post: title, description, tags and body, one
/// per line.
pub fn embedding_text(post: &SourcePost) -> String {
    let mut parts = vec![post.meta.title.as_str(), post.meta.description.as_str()];
    parts.extend(post.meta.tags.iter().map(String::as_str));
    parts.push(post.body.as_str());
    parts.join("\n")
}

/// Clean one post and, when an embedder is given, embed its chunks.
pub async fn encode_post(
    post: &SourcePost,
    chunking: &ChunkingConfig,
    embedder: Option<&dyn Embedder>,
) -> Result<EmbeddedPost> {
    let record = PostRecord {
        filename: post.filename.clone(),
        meta: post.meta.clone(),
        content: clean_for_keywords(&post.body),
    };

    let embedding = match embedder {
        None => Vec::new(),
        Some(embedder) => {
            let chunks = chunk_words(
                &normalize(&embedding_text(post)),
                chunking.min_words,
                chunking.max_words,
            );
            if chunks.is_empty() {
                Vec::new()
            } else {
                let vectors = embedder
                    .embed_batch(&chunks)
                    .await
                    .with_context(|| format!("Failed to embed {}", post.filename))?;
                if vectors.len() != chunks.len() {
                    bail!(
                        "embedding backend returned {} vectors for {} chunks",
                        vectors.len(),
                        chunks.len()
                    );
                }
                vectors
            }
        }
    };

    Ok(EmbeddedPost {
        post: record,
        embedding,
    })
}

/// Read the existing artifact's entries for an incremental build.
///
/// Anything other than a readable artifact of the same mode yields no
/// entries, which makes the build encode every post.
pub fn load_prior(path: &Path, mode: ArtifactMode) -> Vec<EmbeddedPost> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not read existing artifact, rebuilding all");
            return Vec::new();
        }
    };

    match serde_json::from_str::<Artifact>(&raw) {
        Ok(artifact) if artifact.mode() == mode => match artifact {
            Artifact::Embedded(entries) => entries,
            Artifact::Lexical(lexical) => lexical
                .posts
                .into_iter()
                .map(|post| EmbeddedPost {
                    post,
                    embedding: Vec::new(),
                })
                .collect(),
        },
        Ok(artifact) => {
            tracing::warn!(
                path = %path.display(),
                found = %artifact.mode(),
                expected = %mode,
                "existing artifact was built in another mode, rebuilding all"
            );
            Vec::new()
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not parse existing artifact, rebuilding all");
            Vec::new()
        }
    }
}

fn warn_on_dims_mismatch(prior: &[EmbeddedPost], dims: usize) {
    let stale = prior
        .iter()
        .flat_map(|e| e.embedding.iter())
        .find(|v| v.len() != dims);
    if let Some(v) = stale {
        tracing::warn!(
            artifact_dims = v.len(),
            provider_dims = dims,
            "existing vectors do not match the embedding provider; run `blog build --rebuild`"
        );
    }
}

/// Shape entries into the artifact for `mode`.
pub fn into_artifact(entries: Vec<EmbeddedPost>, mode: ArtifactMode) -> Artifact {
    match mode {
        ArtifactMode::Embedding => Artifact::Embedded(entries),
        ArtifactMode::Lexical => {
            let posts: Vec<PostRecord> = entries.into_iter().map(|e| e.post).collect();
            let index = LexicalIndex::build(&posts);
            Artifact::Lexical(LexicalArtifact { posts, index })
        }
    }
}

/// Write the artifact as pretty-printed JSON (2-space indent).
pub fn write_artifact(path: &Path, artifact: &Artifact) -> Result<()> {
    let json = serde_json::to_string_pretty(artifact)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write artifact: {}", path.display()))?;
    Ok(())
}

/// Print the build summary on stdout.
pub fn print_report(report: &BuildReport, path: &Path) {
    if report.dry_run {
        println!("build {} (dry-run)", report.mode);
    } else {
        println!("build {}", report.mode);
    }
    println!("  posts found: {}", report.found);
    println!("  skipped: {}", report.skipped);
    println!("  rebuilt: {}", report.rebuilt);
    println!("  newly encoded: {}", report.newly_encoded);
    println!("  removed: {}", report.removed);
    println!("  failed: {}", report.failed.len());
    for failure in &report.failed {
        println!("    {}: {}", failure.filename, failure.error);
    }
    if !report.dry_run {
        println!("  wrote {} posts to {}", report.written, path.display());
    }
    if report.failed.is_empty() {
        println!("ok");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::progress::NoProgress;
    use async_trait::async_trait;
    use blog_search_core::models::PostMeta;

    /// Fails on any chunk mentioning "explode".
    struct FragileEmbedder;

    #[async_trait]
    impl Embedder for FragileEmbedder {
        fn model_name(&self) -> &str {
            "fragile"
        }
        fn dims(&self) -> usize {
            4
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if texts.iter().any(|t| t.to_lowercase().contains("explode")) {
                bail!("backend crashed");
            }
            HashEmbedder::new(4).embed_batch(texts).await
        }
    }

    fn source(filename: &str, title: &str, body: &str) -> SourcePost {
        SourcePost {
            filename: filename.into(),
            meta: PostMeta {
                title: title.into(),
                date: "2024-01-01".into(),
                tags: vec!["rust".into()],
                ..Default::default()
            },
            body: body.into(),
        }
    }

    fn opts(rebuild: bool) -> BuildOptions {
        BuildOptions {
            rebuild,
            mode: ArtifactMode::Embedding,
            dry_run: false,
        }
    }

    async fn build(
        posts: &[SourcePost],
        prior: Vec<EmbeddedPost>,
        opts: BuildOptions,
        embedder: &dyn Embedder,
    ) -> (Vec<EmbeddedPost>, BuildReport) {
        build_entries(
            posts,
            prior,
            &opts,
            &ChunkingConfig::default(),
            Some(embedder),
            &NoProgress,
        )
        .await
    }

    fn names(entries: &[EmbeddedPost]) -> Vec<&str> {
        entries.iter().map(|e| e.post.filename.as_str()).collect()
    }

    #[test]
    fn test_embedding_text_joins_fields() {
        let mut post = source("a.md", "Title", "Body");
        post.meta.description = "Desc".into();
        assert_eq!(embedding_text(&post), "Title\nDesc\nrust\nBody");
    }

    #[tokio::test]
    async fn test_encode_post_cleans_and_embeds() {
        let post = source("a.md", "Async Rust", "The executor **polls** futures.\n\nWakers wake them.");
        let entry = encode_post(&post, &ChunkingConfig::default(), Some(&HashEmbedder::new(8)))
            .await
            .unwrap();
        assert_eq!(entry.post.content, "executor polls futures. wakers wake them.");
        assert_eq!(entry.embedding.len(), 1);
        assert_eq!(entry.embedding[0].len(), 8);
    }

    #[tokio::test]
    async fn test_empty_post_has_no_chunks() {
        let mut post = source("empty.md", "", "");
        post.meta.tags.clear();
        let entry = encode_post(&post, &ChunkingConfig::default(), Some(&HashEmbedder::new(8)))
            .await
            .unwrap();
        assert!(entry.embedding.is_empty());
    }

    #[tokio::test]
    async fn test_incremental_skips_existing_and_appends_new() {
        let embedder = HashEmbedder::new(8);
        let first = [source("b.md", "B", "bee"), source("c.md", "C", "sea")];
        let (prior, report) = build(&first, Vec::new(), opts(false), &embedder).await;
        assert_eq!(report.newly_encoded, 2);

        let second = [
            source("a.md", "A", "new"),
            source("b.md", "B changed", "bee"),
            source("c.md", "C", "sea"),
        ];
        let (entries, report) = build(&second, prior.clone(), opts(false), &embedder).await;
        assert_eq!(report.skipped, 2);
        assert_eq!(report.newly_encoded, 1);
        assert_eq!(report.rebuilt, 0);
        assert_eq!(names(&entries), vec!["b.md", "c.md", "a.md"]);
        // Skipped entries are kept verbatim.
        assert_eq!(entries[0], prior[0]);
    }

    #[tokio::test]
    async fn test_rebuild_counts_rebuilt_and_new() {
        let embedder = HashEmbedder::new(8);
        let posts = [source("a.md", "A", "x"), source("b.md", "B", "y")];
        let (prior, _) = build(&posts[1..], Vec::new(), opts(false), &embedder).await;

        let (entries, report) = build(&posts, prior, opts(true), &embedder).await;
        assert_eq!(report.rebuilt, 1);
        assert_eq!(report.newly_encoded, 1);
        assert_eq!(report.skipped, 0);
        assert_eq!(names(&entries), vec!["a.md", "b.md"]);
    }

    #[tokio::test]
    async fn test_idempotent_second_run() {
        let embedder = HashEmbedder::new(8);
        let posts = [source("a.md", "A", "alpha"), source("b.md", "B", "beta")];
        let (first, _) = build(&posts, Vec::new(), opts(false), &embedder).await;
        let (second, report) = build(&posts, first.clone(), opts(false), &embedder).await;
        assert_eq!(report.skipped, 2);
        assert_eq!(report.newly_encoded + report.rebuilt, 0);
        assert_eq!(
            serde_json::to_string_pretty(&into_artifact(first, ArtifactMode::Embedding)).unwrap(),
            serde_json::to_string_pretty(&into_artifact(second, ArtifactMode::Embedding)).unwrap()
        );
    }

    #[tokio::test]
    async fn test_deleted_posts_are_pruned() {
        let embedder = HashEmbedder::new(8);
        let (prior, _) = build(
            &[source("gone.md", "G", "g"), source("kept.md", "K", "k")],
            Vec::new(),
            opts(false),
            &embedder,
        )
        .await;
        let (entries, report) =
            build(&[source("kept.md", "K", "k")], prior, opts(false), &embedder).await;
        assert_eq!(report.removed, 1);
        assert_eq!(names(&entries), vec!["kept.md"]);
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let posts = [
            source("a.md", "A", "fine"),
            source("b.md", "B", "this will explode"),
            source("c.md", "C", "also fine"),
        ];
        let (entries, report) = build(&posts, Vec::new(), opts(false), &FragileEmbedder).await;
        assert_eq!(names(&entries), vec!["a.md", "c.md"]);
        assert_eq!(report.newly_encoded, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].filename, "b.md");
        assert!(report.failed[0].error.contains("backend crashed"));
    }

    #[tokio::test]
    async fn test_failed_rebuild_keeps_previous_entry() {
        let (prior, _) = build(
            &[source("b.md", "B", "calm")],
            Vec::new(),
            opts(false),
            &FragileEmbedder,
        )
        .await;
        let posts = [source("b.md", "B", "now it will explode")];
        let (entries, report) = build(&posts, prior.clone(), opts(true), &FragileEmbedder).await;
        assert_eq!(report.failed.len(), 1);
        assert_eq!(entries, prior);
    }

    #[tokio::test]
    async fn test_dry_run_encodes_nothing() {
        let posts = [source("a.md", "A", "this would explode")];
        let options = BuildOptions {
            dry_run: true,
            ..opts(false)
        };
        let (entries, report) = build(&posts, Vec::new(), options, &FragileEmbedder).await;
        assert!(entries.is_empty());
        assert_eq!(report.newly_encoded, 1);
        assert!(report.failed.is_empty());
    }

    #[test]
    fn test_load_prior_missing_malformed_and_other_mode() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("blog.json");
        assert!(load_prior(&path, ArtifactMode::Embedding).is_empty());

        std::fs::write(&path, "{ definitely not json").unwrap();
        assert!(load_prior(&path, ArtifactMode::Embedding).is_empty());

        let lexical = into_artifact(
            vec![EmbeddedPost {
                post: PostRecord {
                    filename: "a.md".into(),
                    ..Default::default()
                },
                embedding: Vec::new(),
            }],
            ArtifactMode::Lexical,
        );
        write_artifact(&path, &lexical).unwrap();
        assert!(load_prior(&path, ArtifactMode::Embedding).is_empty());
        assert_eq!(load_prior(&path, ArtifactMode::Lexical).len(), 1);
    }

    #[test]
    fn test_lexical_artifact_has_index() {
        let artifact = into_artifact(
            vec![EmbeddedPost {
                post: PostRecord {
                    filename: "a.md".into(),
                    meta: PostMeta {
                        title: "Tokio runtime".into(),
                        ..Default::default()
                    },
                    content: String::new(),
                },
                embedding: Vec::new(),
            }],
            ArtifactMode::Lexical,
        );
        let Artifact::Lexical(lexical) = artifact else {
            panic!("expected lexical artifact");
        };
        assert_eq!(lexical.index.search("tokio")[0].hits[0].filename, "a.md");
    }

    #[test]
    fn test_write_artifact_pretty_two_space() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested/dir/blog.json");
        write_artifact(&path, &Artifact::Embedded(vec![EmbeddedPost::default()])).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("[\n  {\n    \"filename\""));
    }
}
