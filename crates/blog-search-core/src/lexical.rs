//! Tolerant inverted index over post fields.
//!
//! [`LexicalIndex`] maps each token to the places it occurs, per field
//! (title, description, tags, content). It is built offline, exported into
//! the lexical-mode artifact as JSON, and reloaded by the search session.
//!
//! # Matching
//!
//! Every query token is looked up three ways, and the best match per
//! document and field counts:
//!
//! | Match | Condition | Weight |
//! |-------|-----------|--------|
//! | exact | indexed token equals the query token | 3 |
//! | prefix | query token (2+ chars) starts an indexed token | 2 |
//! | tolerant | one edit apart (both tokens 4+ chars) | 1 |
//!
//! A document matches a field only when every query token matches in that
//! field. Its field score is the sum of the token weights plus a small bonus
//! for tokens that occur early in the field.
//!
//! # Example
//!
//! ```rust
//! use blog_search_core::lexical::{Field, LexicalIndex};
//!
//! let mut index = LexicalIndex::new();
//! index.add("async.md", Field::Title, "Async Rust in practice");
//! let hits = index.search("asyn");
//! assert_eq!(hits[0].field, Field::Title);
//! assert_eq!(hits[0].hits[0].filename, "async.md");
//! ```

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::models::PostRecord;

/// Indexed post fields, in result order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Title,
    Description,
    Tags,
    Content,
}

impl Field {
    pub const ALL: [Field; 4] = [Field::Title, Field::Description, Field::Tags, Field::Content];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Description => "description",
            Field::Tags => "tags",
            Field::Content => "content",
        }
    }
}

const EXACT_WEIGHT: f64 = 3.0;
const PREFIX_WEIGHT: f64 = 2.0;
const TOLERANT_WEIGHT: f64 = 1.0;
const MIN_PREFIX_CHARS: usize = 2;
const MIN_TOLERANT_CHARS: usize = 4;
const POSITION_BONUS: f64 = 0.5;

/// One occurrence: `(document, field, token position)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting(pub u32, pub Field, pub u32);

/// A matching document within one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    pub filename: String,
    pub score: f64,
}

/// All matching documents for one field, best first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldHits {
    pub field: Field,
    pub hits: Vec<Hit>,
}

/// Inverted index from token to postings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LexicalIndex {
    /// Document id to filename.
    docs: Vec<String>,
    /// Token to occurrences, sorted by token so exports are stable.
    terms: BTreeMap<String, Vec<Posting>>,
}

impl LexicalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index over the title, description, tags and content of
    /// each post.
    pub fn build<'a>(posts: impl IntoIterator<Item = &'a PostRecord>) -> Self {
        let mut index = Self::new();
        for post in posts {
            index.add_post(post);
        }
        index
    }

    /// Index every field of one post.
    pub fn add_post(&mut self, post: &PostRecord) {
        self.add(&post.filename, Field::Title, &post.meta.title);
        self.add(&post.filename, Field::Description, &post.meta.description);
        self.add(&post.filename, Field::Tags, &post.meta.tags.join(" "));
        self.add(&post.filename, Field::Content, &post.content);
    }

    /// Index `text` as `field` of the document `filename`.
    pub fn add(&mut self, filename: &str, field: Field, text: &str) {
        let doc = self.doc_id(filename);
        for (pos, token) in index_tokens(text).into_iter().enumerate() {
            self.terms
                .entry(token)
                .or_default()
                .push(Posting(doc, field, pos as u32));
        }
    }

    fn doc_id(&mut self, filename: &str) -> u32 {
        match self.docs.iter().position(|f| f == filename) {
            Some(id) => id as u32,
            None => {
                self.docs.push(filename.to_string());
                (self.docs.len() - 1) as u32
            }
        }
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Number of distinct indexed tokens.
    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// Run a query, returning hits per field in [`Field::ALL`] order.
    ///
    /// Fields without hits are omitted. A query without tokens yields
    /// nothing.
    pub fn search(&self, query: &str) -> Vec<FieldHits> {
        let mut tokens = index_tokens(query);
        tokens.sort();
        tokens.dedup();
        if tokens.is_empty() {
            return Vec::new();
        }

        // (field, doc) -> (tokens matched, weight sum, earliest position)
        let mut acc: HashMap<(Field, u32), (usize, f64, u32)> = HashMap::new();

        for token in &tokens {
            let mut best: HashMap<(Field, u32), (f64, u32)> = HashMap::new();
            for (term, weight) in self.matching_terms(token) {
                for &Posting(doc, field, pos) in &self.terms[term] {
                    let slot = best.entry((field, doc)).or_insert((weight, pos));
                    if weight > slot.0 {
                        *slot = (weight, pos);
                    } else if weight == slot.0 && pos < slot.1 {
                        slot.1 = pos;
                    }
                }
            }
            for (key, (weight, pos)) in best {
                let entry = acc.entry(key).or_insert((0, 0.0, u32::MAX));
                entry.0 += 1;
                entry.1 += weight;
                entry.2 = entry.2.min(pos);
            }
        }

        let mut per_field: BTreeMap<Field, Vec<Hit>> = BTreeMap::new();
        for ((field, doc), (matched, weight, first_pos)) in acc {
            if matched < tokens.len() {
                continue;
            }
            let Some(filename) = self.docs.get(doc as usize) else {
                continue;
            };
            per_field.entry(field).or_default().push(Hit {
                filename: filename.clone(),
                score: weight + POSITION_BONUS / (1.0 + first_pos as f64),
            });
        }

        per_field
            .into_iter()
            .map(|(field, mut hits)| {
                hits.sort_by(|a, b| {
                    b.score
                        .partial_cmp(&a.score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| a.filename.cmp(&b.filename))
                });
                FieldHits { field, hits }
            })
            .collect()
    }

    /// Indexed terms that match `token`, with their match weight.
    fn matching_terms<'a>(&'a self, token: &'a str) -> impl Iterator<Item = (&'a str, f64)> + 'a {
        let query: Vec<char> = token.chars().collect();
        let prefix_ok = query.len() >= MIN_PREFIX_CHARS;
        let tolerant_ok = query.len() >= MIN_TOLERANT_CHARS;

        self.terms.keys().filter_map(move |term| {
            if term == token {
                return Some((term.as_str(), EXACT_WEIGHT));
            }
            if prefix_ok && term.starts_with(token) {
                return Some((term.as_str(), PREFIX_WEIGHT));
            }
            if tolerant_ok {
                let candidate: Vec<char> = term.chars().collect();
                if candidate.len() >= MIN_TOLERANT_CHARS && within_one_edit(&query, &candidate) {
                    return Some((term.as_str(), TOLERANT_WEIGHT));
                }
            }
            None
        })
    }
}

/// Lowercase and split on anything that is not a letter or digit.
pub fn index_tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// True when `a` and `b` differ by at most one substitution, insertion,
/// deletion or adjacent transposition.
fn within_one_edit(a: &[char], b: &[char]) -> bool {
    if a.len().abs_diff(b.len()) > 1 {
        return false;
    }
    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    if prefix == a.len() && prefix == b.len() {
        return true;
    }
    let (ra, rb) = (&a[prefix..], &b[prefix..]);
    match a.len().cmp(&b.len()) {
        std::cmp::Ordering::Equal => {
            ra[1..] == rb[1..]
                || (ra.len() >= 2 && ra[0] == rb[1] && ra[1] == rb[0] && ra[2..] == rb[2..])
        }
        std::cmp::Ordering::Less => ra == &rb[1..],
        std::cmp::Ordering::Greater => &ra[1..] == rb,
    }
}
