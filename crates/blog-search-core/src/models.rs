//! Post and artifact data models.
//!
//! These types describe what the offline build writes and what a search
//! session reads back. Two artifact shapes exist:
//!
//! - **Embedding mode**: a JSON array of [`EmbeddedPost`], each carrying one
//!   vector per chunk.
//! - **Lexical mode**: a [`LexicalArtifact`] object `{ "posts": [...],
//!   "index": {...} }` holding an exported [`LexicalIndex`].
//!
//! [`Artifact`] deserializes either shape without being told which one to
//! expect.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::lexical::LexicalIndex;

/// Front-matter metadata of one post.
///
/// Keys other than `date`, `title`, `description` and `tags` are kept in
/// `extra` and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostMeta {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl PostMeta {
    /// Publication date, if `date` holds `YYYY-MM-DD` or an RFC 3339 timestamp.
    pub fn published(&self) -> Option<NaiveDate> {
        let raw = self.date.trim();
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Some(date);
        }
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.date_naive())
    }
}

/// A post as stored in the artifact, without vectors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    /// Unique key, the markdown file name relative to the content root.
    pub filename: String,
    #[serde(flatten)]
    pub meta: PostMeta,
    /// Cleaned keyword text (normalized, lowercased, stop words removed).
    #[serde(default)]
    pub content: String,
}

/// A post plus one embedding vector per chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedPost {
    #[serde(flatten)]
    pub post: PostRecord,
    #[serde(default)]
    pub embedding: Vec<Vec<f32>>,
}

/// Lexical-mode artifact: posts plus the exported keyword index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LexicalArtifact {
    pub posts: Vec<PostRecord>,
    pub index: LexicalIndex,
}

/// Either artifact shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Artifact {
    Embedded(Vec<EmbeddedPost>),
    Lexical(LexicalArtifact),
}

impl Artifact {
    pub fn mode(&self) -> ArtifactMode {
        match self {
            Artifact::Embedded(_) => ArtifactMode::Embedding,
            Artifact::Lexical(_) => ArtifactMode::Lexical,
        }
    }

    /// Number of posts in the artifact.
    pub fn len(&self) -> usize {
        match self {
            Artifact::Embedded(posts) => posts.len(),
            Artifact::Lexical(a) => a.posts.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Which artifact shape the build produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactMode {
    #[default]
    Embedding,
    Lexical,
}

impl fmt::Display for ArtifactMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactMode::Embedding => f.write_str("embedding"),
            ArtifactMode::Lexical => f.write_str("lexical"),
        }
    }
}

impl FromStr for ArtifactMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "embedding" => Ok(ArtifactMode::Embedding),
            "lexical" => Ok(ArtifactMode::Lexical),
            other => Err(format!(
                "unknown artifact mode '{}': expected 'embedding' or 'lexical'",
                other
            )),
        }
    }
}
