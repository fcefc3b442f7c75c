//! # Blog Search
//!
//! Static search for a markdown blog. An offline build turns posts into one
//! JSON artifact; the ranking in [`blog_search_core`] answers queries over
//! it, both here on the command line and in whatever front end loads the
//! artifact.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │  Markdown  │──▶│  Build pipeline  │──▶│  blog.json   │
//! │   posts    │   │ clean+chunk+embed│   │  (artifact)  │
//! └────────────┘   └──────────────────┘   └──────┬───────┘
//!                                                │
//!                                                ▼
//!                                        ┌──────────────┐
//!                                        │ SearchSession│
//!                                        │ hybrid/lexical│
//!                                        └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! blog build                         # encode new posts
//! blog build --mode lexical          # keyword index, no model
//! blog search "async rust" --explain
//! blog posts --tag rust
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`content`] | Post discovery and front matter |
//! | [`embedding`] | Embedding providers |
//! | [`indexer`] | Incremental artifact build |
//! | [`progress`] | Build progress reporting |
//! | [`search`] | Query and listing commands |
//! | [`get`] | Single post lookup |
//! | [`stats`] | Artifact summary |
//! | [`logging`] | Tracing subscriber setup |

pub mod config;
pub mod content;
pub mod embedding;
pub mod get;
pub mod indexer;
pub mod logging;
pub mod progress;
pub mod search;
pub mod stats;
