//! In-memory snapshot of a loaded artifact.
//!
//! A [`Corpus`] holds every post sorted newest first, each post's chunk
//! vectors (empty in lexical mode), the token set used for lexical overlap,
//! and a [`LexicalIndex`]. The index comes straight from a lexical-mode
//! artifact or is built from the posts of an embedding-mode one, so both
//! ranking strategies can run against any corpus.
//!
//! A corpus is read-only after construction and is shared between
//! concurrent searches behind an `Arc`.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::error::SearchError;
use crate::lexical::LexicalIndex;
use crate::models::{Artifact, ArtifactMode, EmbeddedPost, PostRecord};
use crate::normalize::tokenize;

/// One post plus its precomputed search data.
#[derive(Debug, Clone)]
pub struct CorpusPost {
    pub record: PostRecord,
    /// One vector per chunk. Empty when the post has no embeddings.
    pub chunks: Vec<Vec<f32>>,
    tokens: HashSet<String>,
}

impl CorpusPost {
    pub fn new(record: PostRecord, chunks: Vec<Vec<f32>>) -> Self {
        let tokens = document_tokens(&record);
        Self {
            record,
            chunks,
            tokens,
        }
    }

    pub fn filename(&self) -> &str {
        &self.record.filename
    }

    pub fn tags(&self) -> &[String] {
        &self.record.meta.tags
    }

    /// Whether the lexical document contains `token` (already lowercased).
    pub fn has_token(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }
}

/// Tokens of `title + description + tags + content`.
fn document_tokens(record: &PostRecord) -> HashSet<String> {
    let text = format!(
        "{} {} {} {}",
        record.meta.title,
        record.meta.description,
        record.meta.tags.join(" "),
        record.content
    );
    tokenize(&text).into_iter().collect()
}

/// The searchable post collection.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    posts: Vec<CorpusPost>,
    positions: HashMap<String, usize>,
    index: LexicalIndex,
    mode: ArtifactMode,
}

impl Corpus {
    /// Build a corpus from a decoded artifact.
    pub fn from_artifact(artifact: Artifact) -> Self {
        let mode = artifact.mode();
        let (posts, index) = match artifact {
            Artifact::Embedded(posts) => {
                let index = LexicalIndex::build(posts.iter().map(|p| &p.post));
                let posts = posts
                    .into_iter()
                    .map(|EmbeddedPost { post, embedding }| CorpusPost::new(post, embedding))
                    .collect();
                (posts, index)
            }
            Artifact::Lexical(a) => {
                let posts = a
                    .posts
                    .into_iter()
                    .map(|p| CorpusPost::new(p, Vec::new()))
                    .collect();
                (posts, a.index)
            }
        };
        Self::assemble(posts, index, mode)
    }

    /// Decode artifact JSON and build a corpus.
    pub fn from_json(json: &str) -> Result<Self, SearchError> {
        let artifact: Artifact = serde_json::from_str(json)?;
        Ok(Self::from_artifact(artifact))
    }

    fn assemble(mut posts: Vec<CorpusPost>, index: LexicalIndex, mode: ArtifactMode) -> Self {
        posts.sort_by(|a, b| newest_first(&a.record, &b.record));
        let positions = posts
            .iter()
            .enumerate()
            .map(|(i, p)| (p.record.filename.clone(), i))
            .collect();
        Self {
            posts,
            positions,
            index,
            mode,
        }
    }

    /// Posts, newest first.
    pub fn posts(&self) -> &[CorpusPost] {
        &self.posts
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn mode(&self) -> ArtifactMode {
        self.mode
    }

    pub fn index(&self) -> &LexicalIndex {
        &self.index
    }

    /// Corpus position of a post by filename.
    pub fn position(&self, filename: &str) -> Option<usize> {
        self.positions.get(filename).copied()
    }

    pub fn get(&self, filename: &str) -> Option<&CorpusPost> {
        self.position(filename).map(|i| &self.posts[i])
    }

    /// Dimensionality of the first chunk vector found, if any.
    pub fn dims(&self) -> Option<usize> {
        self.posts
            .iter()
            .flat_map(|p| p.chunks.iter())
            .map(Vec::len)
            .next()
    }
}

/// Date descending; posts without a parseable date go last. Stable sorts keep
/// artifact order among equals.
fn newest_first(a: &PostRecord, b: &PostRecord) -> Ordering {
    match (a.meta.published(), b.meta.published()) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
