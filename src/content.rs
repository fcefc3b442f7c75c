//! Markdown post discovery and front-matter parsing.
//!
//! Walks `[content].root`, keeps files matching the include globs and not
//! matching the exclude globs, and splits each file into YAML front matter
//! and markdown body:
//!
//! ```text
//! ---
//! title: Async Rust internals
//! date: 2024-03-01
//! tags: [rust, async]
//! ---
//! Body text...
//! ```
//!
//! Front matter is optional. Malformed front matter is logged and treated
//! as empty; it never aborts a build.

use anyhow::{bail, Context, Result};
use blog_search_core::models::PostMeta;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde_yaml::Value;
use walkdir::WalkDir;

use crate::config::ContentConfig;

/// A post as read from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePost {
    /// Path relative to the content root, `/`-separated.
    pub filename: String,
    pub meta: PostMeta,
    /// Markdown body after the front matter.
    pub body: String,
}

/// Enumerate and parse every post under the content root, sorted by
/// filename.
///
/// Files that cannot be read as UTF-8 are skipped with a warning.
pub fn scan_posts(config: &ContentConfig) -> Result<Vec<SourcePost>> {
    let root = &config.root;
    if !root.exists() {
        bail!("Content root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut posts = Vec::new();

    let walker = WalkDir::new(root).follow_links(config.follow_symlinks);
    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(file = %rel_str, error = %e, "skipping unreadable post");
                continue;
            }
        };

        posts.push(parse_post(&rel_str, &raw));
    }

    posts.sort_by(|a, b| a.filename.cmp(&b.filename));
    tracing::debug!(root = %root.display(), posts = posts.len(), "content scanned");

    Ok(posts)
}

/// Split a markdown file into metadata and body.
pub fn parse_post(filename: &str, raw: &str) -> SourcePost {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    match split_front_matter(raw) {
        Some((yaml, body)) => SourcePost {
            filename: filename.to_string(),
            meta: meta_from_yaml(filename, yaml),
            body: body.to_string(),
        },
        None => {
            if raw.starts_with("---") {
                tracing::warn!(file = %filename, "unterminated front matter, treating file as body");
            }
            SourcePost {
                filename: filename.to_string(),
                meta: PostMeta::default(),
                body: raw.to_string(),
            }
        }
    }
}

/// Returns `(front matter, body)` when the text opens with a `---` fence
/// that is closed by another `---` line.
fn split_front_matter(raw: &str) -> Option<(&str, &str)> {
    let rest = raw.strip_prefix("---")?;
    let rest = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))?;

    let mut offset = 0usize;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

fn meta_from_yaml(filename: &str, yaml: &str) -> PostMeta {
    let mut meta = PostMeta::default();

    let value: Value = match serde_yaml::from_str(yaml) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(file = %filename, error = %e, "malformed front matter ignored");
            return meta;
        }
    };

    let map = match value {
        Value::Mapping(map) => map,
        Value::Null => return meta,
        _ => {
            tracing::warn!(file = %filename, "front matter is not a mapping, ignored");
            return meta;
        }
    };

    for (key, value) in map {
        let Some(key) = key.as_str() else {
            continue;
        };
        match key {
            "date" => meta.date = scalar_string(&value),
            "title" => meta.title = scalar_string(&value),
            "description" => meta.description = scalar_string(&value),
            "tags" => meta.tags = tag_list(&value),
            other => match serde_json::to_value(&value) {
                Ok(json) => {
                    meta.extra.insert(other.to_string(), json);
                }
                Err(e) => {
                    tracing::warn!(file = %filename, key = other, error = %e, "front matter key dropped");
                }
            },
        }
    }

    meta
}

fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Tags as a YAML list, or a single comma-separated string.
fn tag_list(value: &Value) -> Vec<String> {
    match value {
        Value::Sequence(items) => items
            .iter()
            .map(scalar_string)
            .filter(|t| !t.is_empty())
            .collect(),
        Value::String(s) => s
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}
