//! Markdown-to-plain-text normalization.
//!
//! [`normalize`] is the single cleaning pass used for both indexing and
//! embedding. It removes markdown syntax in a fixed order, collapses
//! whitespace while keeping paragraph breaks, and drops every character that
//! is not a letter, digit, whitespace, or basic punctuation.
//!
//! Two token helpers sit next to it:
//!
//! - [`tokenize`]: lowercase + punctuation stripping + whitespace split.
//!   Used for lexical queries and for the lexical view of a post. Queries are
//!   never passed through [`normalize`] on this path.
//! - [`clean_for_keywords`]: [`normalize`] + lowercase + stop-word removal.
//!   Produces the `content` field stored in the artifact.
//!
//! # Example
//!
//! ```rust
//! use blog_search_core::normalize::normalize;
//!
//! let text = normalize("# Title\n\nSee [the docs](https://example.com) and `code`.");
//! assert_eq!(text, "Title\n\nSee the docs and .");
//! ```

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static FENCED_CODE: LazyLock<Regex> = LazyLock::new(|| re(r"(?s)```.*?```"));
static INLINE_CODE: LazyLock<Regex> = LazyLock::new(|| re(r"`[^`]*`"));
static IMAGE: LazyLock<Regex> = LazyLock::new(|| re(r"!\[.*?\]\(.*?\)"));
static LINK: LazyLock<Regex> = LazyLock::new(|| re(r"\[([^\]]*?)\]\(.*?\)"));
static HEADING: LazyLock<Regex> = LazyLock::new(|| re(r"(?mR)^[ \t]*#+[ \t]+"));
static BLOCKQUOTE: LazyLock<Regex> = LazyLock::new(|| re(r"(?mR)^[ \t]*>+[ \t]?"));
static EMPHASIS: LazyLock<Regex> = LazyLock::new(|| re(r"\*\*|__|\*|_|~~"));
static HORIZONTAL_RULE: LazyLock<Regex> = LazyLock::new(|| re(r"(?mR)^(?:-[ \t]*){3,}$"));
static BULLET: LazyLock<Regex> = LazyLock::new(|| re(r"(?mR)^[ \t]*[-+*][ \t]+"));
static ORDERED: LazyLock<Regex> = LazyLock::new(|| re(r"(?mR)^[ \t]*\d+\.[ \t]+"));

/// Punctuation that survives normalization.
const KEPT_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '\'', '"', '-'];

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid normalizer pattern {pattern}: {e}"))
}

/// Strip markdown syntax and non-linguistic characters from a post body.
///
/// Removal order: fenced code blocks, inline code, images, link syntax
/// (link text is kept), heading markers, blockquote markers, emphasis
/// markers, horizontal rules, list bullets and numbers. Whitespace is then
/// collapsed, characters outside letters, digits and `. , ; : ! ? ' " -` are
/// dropped, and the result is trimmed.
///
/// Whitespace collapsing keeps paragraph structure: a run that contains a
/// blank line becomes `"\n\n"`, every other run becomes a single space.
pub fn normalize(markdown: &str) -> String {
    let text = FENCED_CODE.replace_all(markdown, " ");
    let text = INLINE_CODE.replace_all(&text, " ");
    let text = IMAGE.replace_all(&text, " ");
    let text = LINK.replace_all(&text, "$1");
    let text = HEADING.replace_all(&text, "");
    let text = BLOCKQUOTE.replace_all(&text, "");
    let text = EMPHASIS.replace_all(&text, "");
    let text = HORIZONTAL_RULE.replace_all(&text, "");
    let text = BULLET.replace_all(&text, "");
    let text = ORDERED.replace_all(&text, "");

    let collapsed = collapse_whitespace(&text);

    collapsed
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || KEPT_PUNCTUATION.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Collapse whitespace runs, mapping blank-line runs to `"\n\n"`.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newlines = 0usize;
    let mut in_run = false;

    for c in text.chars() {
        if c.is_whitespace() {
            in_run = true;
            if c == '\n' {
                newlines += 1;
            }
            continue;
        }
        if in_run {
            out.push_str(if newlines >= 2 { "\n\n" } else { " " });
            in_run = false;
            newlines = 0;
        }
        out.push(c);
    }

    out
}

/// Lowercase, strip punctuation, and split on whitespace.
///
/// Characters that are neither alphanumeric nor whitespace are removed
/// outright, so `"don't"` becomes `"dont"` and `"Rust!"` becomes `"rust"`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Produce the cleaned keyword text stored as a post's `content`.
///
/// Applies [`normalize`], lowercases, and removes English stop words.
pub fn clean_for_keywords(markdown: &str) -> String {
    normalize(markdown)
        .to_lowercase()
        .split_whitespace()
        .filter(|w| !is_stop_word(w))
        .collect::<Vec<_>>()
        .join(" ")
}

static STOP_WORDS: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| ENGLISH_STOP_WORDS.iter().copied().collect());

/// Check whether a lowercase word is an English stop word.
pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(word)
}

const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself",
    "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just",
    "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once",
    "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same", "she",
    "should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them",
    "themselves", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours", "yourself",
    "yourselves",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removes_fenced_and_inline_code() {
        let md = "Before\n\n```rust\nfn main() {}\n```\n\nUse `cargo build` now.";
        let out = normalize(md);
        assert!(!out.contains("fn main"));
        assert!(!out.contains("cargo build"));
        assert!(out.starts_with("Before"));
        assert!(out.ends_with("Use now."));
    }

    #[test]
    fn test_keeps_link_text_drops_images() {
        let out = normalize("A ![logo](img.png) and [Tokio](https://tokio.rs) here.");
        assert_eq!(out, "A and Tokio here.");
    }

    #[test]
    fn test_strips_headings_quotes_and_emphasis() {
        let out = normalize("## Heading\n\n> quoted **bold** and _it_ ~~gone~~");
        assert_eq!(out, "Heading\n\nquoted bold and it gone");
    }

    #[test]
    fn test_strips_rules_and_list_markers() {
        let out = normalize("Intro\n\n---\n\n- one\n+ two\n1. three");
        assert!(!out.contains("---"));
        assert!(out.contains("one two three"));
    }

    #[test]
    fn test_crlf_rules_and_markers() {
        let out = normalize("Intro\r\n\r\n---\r\n\r\n# Title\r\n\r\n- one\r\n+ two\r\n\r\nBody");
        assert_eq!(out, "Intro\n\nTitle\n\none two\n\nBody");
    }

    #[test]
    fn test_paragraph_breaks_survive() {
        let out = normalize("first line\nsame paragraph\n\n\n\nsecond   paragraph");
        assert_eq!(out, "first line same paragraph\n\nsecond paragraph");
    }

    #[test]
    fn test_drops_non_linguistic_characters() {
        let out = normalize("Cost: $5 & <b>50%</b> off! It's \"great\" -- really?");
        // " & " loses its symbol after whitespace collapsing, leaving two spaces.
        assert_eq!(out, "Cost: 5  b50b off! It's \"great\" -- really?");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("```\nonly code\n```"), "");
    }

    #[test]
    fn test_tokenize_strips_punctuation() {
        assert_eq!(tokenize("Rust, Go & don't!"), vec!["rust", "go", "dont"]);
        assert!(tokenize("  ...  ").is_empty());
    }

    #[test]
    fn test_clean_for_keywords_removes_stop_words() {
        let out = clean_for_keywords("# The Rust Book\n\nIt is a guide to the language.");
        assert_eq!(out, "rust book guide language.");
    }
}
