//! Paragraph-boundary, word-bounded text chunker.
//!
//! Splits normalized post text into chunks that keep embedding inputs in a
//! stable length range. Splitting only happens on paragraph boundaries
//! (blank lines); a paragraph is never cut in half.
//!
//! # Algorithm
//!
//! 1. Split text on blank lines into paragraphs, dropping empty ones.
//! 2. Accumulate paragraphs into a running chunk.
//! 3. When adding the next paragraph would push the running chunk past
//!    `max_words` *and* the running chunk already holds at least
//!    `min_words`, emit the running chunk and start a new one with that
//!    paragraph.
//! 4. Emit the final running chunk, even if it is under `min_words`.
//!
//! A single paragraph longer than `max_words` becomes its own oversized
//! chunk.
//!
//! # Example
//!
//! ```rust
//! use blog_search_core::chunk::chunk_words;
//!
//! let chunks = chunk_words("Hello world.\n\nSecond paragraph.", 40, 80);
//! assert_eq!(chunks, vec!["Hello world. Second paragraph.".to_string()]);
//! ```

/// Default lower bound on words per chunk.
pub const DEFAULT_MIN_WORDS: usize = 40;

/// Default upper bound on words per chunk.
pub const DEFAULT_MAX_WORDS: usize = 80;

/// Split text into word-bounded chunks on paragraph boundaries.
///
/// Paragraphs inside a chunk are joined with a single space.
///
/// # Guarantees
///
/// - Empty or whitespace-only text yields no chunks.
/// - Every paragraph lands in exactly one chunk, in order.
/// - Every chunk except the last has at least `min_words` words.
pub fn chunk_words(text: &str, min_words: usize, max_words: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_words = 0usize;

    for para in split_paragraphs(text) {
        let words = para.split_whitespace().count();

        if current_words + words > max_words && current_words >= min_words {
            chunks.push(join_paragraphs(&current));
            current.clear();
            current_words = 0;
        }

        current.push(para);
        current_words += words;
    }

    if !current.is_empty() {
        chunks.push(join_paragraphs(&current));
    }

    chunks
}

/// Split on blank lines (a line break, optional horizontal whitespace, and
/// another line break), trimming each paragraph and dropping empty ones.
fn split_paragraphs(text: &str) -> Vec<&str> {
    let mut paragraphs = Vec::new();
    let mut start = 0usize;
    let lines: Vec<(usize, &str)> = line_spans(text);

    for (offset, line) in &lines {
        if line.trim().is_empty() {
            let para = text[start..*offset].trim();
            if !para.is_empty() {
                paragraphs.push(para);
            }
            start = offset + line.len();
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        paragraphs.push(tail);
    }

    paragraphs
}

/// Byte offsets and contents of each line, including the trailing `\n`.
fn line_spans(text: &str) -> Vec<(usize, &str)> {
    let mut spans = Vec::new();
    let mut offset = 0usize;
    for line in text.split_inclusive('\n') {
        spans.push((offset, line));
        offset += line.len();
    }
    spans
}

/// Join paragraphs into one chunk, collapsing internal line breaks.
fn join_paragraphs(paragraphs: &[&str]) -> String {
    paragraphs
        .iter()
        .flat_map(|p| p.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}
