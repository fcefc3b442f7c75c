//! # Blog Search Core
//!
//! Search and ranking logic for a static blog search: markdown
//! normalization, chunking, the embedding trait and vector math, the
//! tolerant keyword index, artifact models, ranking strategies, tag
//! filtering, and the search session state machine.
//!
//! This crate performs no network access and no model inference. Embedding
//! backends are supplied by the caller through [`embedding::Embedder`].
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use blog_search_core::rank::LexicalRanker;
//! use blog_search_core::session::SearchSession;
//!
//! # async fn run() -> Result<(), blog_search_core::error::SearchError> {
//! let mut session = SearchSession::open(Path::new("data/blog.json"), Arc::new(LexicalRanker))?;
//! session.search("async rust").await;
//! for item in session.visible() {
//!     println!("{}", item.post.record.meta.title);
//! }
//! # Ok(())
//! # }
//! ```

pub mod chunk;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod lexical;
pub mod models;
pub mod normalize;
pub mod rank;
pub mod session;
pub mod tags;
