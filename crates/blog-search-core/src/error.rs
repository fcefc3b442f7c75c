//! Error kinds surfaced by the search session.
//!
//! The ranking core and the session report failures through [`SearchError`]
//! so a front end can turn them into user-visible state instead of aborting.

use thiserror::Error;

/// Failures a search session can run into.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The artifact could not be read (missing file, permission, network).
    #[error("failed to load search artifact: {0}")]
    ArtifactFetch(String),

    /// The artifact was read but is not valid JSON of a known shape.
    #[error("failed to parse search artifact: {0}")]
    ArtifactParse(#[from] serde_json::Error),

    /// The embedding backend could not initialize or embed the query.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// A post was requested by a filename the corpus does not contain.
    #[error("unknown post: {0}")]
    UnknownPost(String),
}

impl SearchError {
    /// Wrap any embedding backend error, keeping its full context chain.
    pub fn embedding(err: impl std::fmt::Display) -> Self {
        SearchError::Embedding(format!("{:#}", err))
    }
}
