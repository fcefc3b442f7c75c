//! Tag selection and filtering.
//!
//! Tags compare case-insensitively. A post passes a selection when it
//! carries every selected tag (AND); an empty selection passes everything.

use std::collections::{BTreeMap, BTreeSet};

use crate::corpus::CorpusPost;
use crate::models::{PostMeta, PostRecord};

/// A set of selected tags, stored lowercased.
pub type TagSet = BTreeSet<String>;

/// Anything that carries post tags.
pub trait Tagged {
    fn tags(&self) -> &[String];
}

impl Tagged for PostMeta {
    fn tags(&self) -> &[String] {
        &self.tags
    }
}

impl Tagged for PostRecord {
    fn tags(&self) -> &[String] {
        &self.meta.tags
    }
}

impl Tagged for CorpusPost {
    fn tags(&self) -> &[String] {
        CorpusPost::tags(self)
    }
}

impl<T: Tagged + ?Sized> Tagged for &T {
    fn tags(&self) -> &[String] {
        (**self).tags()
    }
}

/// Canonical form of a tag.
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

/// Build a [`TagSet`] from user input, dropping blank entries.
pub fn tag_set<I, S>(tags: I) -> TagSet
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| normalize_tag(t.as_ref()))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Whether `item` carries every tag in `selected`.
pub fn has_all_tags<T: Tagged + ?Sized>(item: &T, selected: &TagSet) -> bool {
    if selected.is_empty() {
        return true;
    }
    let own: TagSet = tag_set(item.tags());
    selected.is_subset(&own)
}

/// Keep the items that carry every selected tag, preserving order.
pub fn filter_by_tags<T: Tagged>(items: Vec<T>, selected: &TagSet) -> Vec<T> {
    if selected.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| has_all_tags(item, selected))
        .collect()
}

/// Number of items per tag, keyed by canonical tag.
pub fn tag_counts<'a, T, I>(items: I) -> BTreeMap<String, usize>
where
    T: Tagged + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut counts = BTreeMap::new();
    for item in items {
        for tag in tag_set(item.tags()) {
            *counts.entry(tag).or_insert(0) += 1;
        }
    }
    counts
}
