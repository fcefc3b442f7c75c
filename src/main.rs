//! # Blog search CLI (`blog`)
//!
//! Builds the static search artifact for a markdown blog and queries it
//! from the terminal.
//!
//! ## Usage
//!
//! ```bash
//! blog --config ./config/blog.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `blog build` | Scan posts and write the search artifact (incremental) |
//! | `blog search "<query>"` | Rank posts for a query |
//! | `blog posts` | List posts newest first, optionally by tag |
//! | `blog get <file>` | Show one post from the artifact |
//! | `blog stats` | Summarize the artifact |
//! | `blog completions <shell>` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! # Encode new posts only
//! blog build
//!
//! # Re-encode everything after switching models
//! blog build --rebuild
//!
//! # Keyword-only artifact, no model needed
//! blog build --mode lexical
//!
//! # Search with score breakdown, narrowed to a tag
//! blog search "async executors" --tag rust --explain
//! ```

use std::io;
use std::path::PathBuf;

use anyhow::bail;
use blog_search::config;
use blog_search::get;
use blog_search::indexer::{self, BuildOptions};
use blog_search::logging;
use blog_search::progress::ProgressMode;
use blog_search::search::{self, SearchOptions};
use blog_search::stats;
use blog_search_core::models::ArtifactMode;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

/// Static search for a markdown blog.
///
/// All commands except `completions` read a TOML configuration file given
/// by `--config`. See `config/blog.toml` for an example.
#[derive(Parser)]
#[command(
    name = "blog",
    about = "Static search for a markdown blog: build the search artifact and query it",
    version,
    long_about = "Scans markdown posts, cleans and chunks them, embeds the chunks (or builds a \
    keyword index), and writes one JSON artifact a static site can search. The same ranking \
    runs from the command line."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/blog.toml")]
    config: PathBuf,

    /// More diagnostic output on stderr (repeatable). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only errors on stderr.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Build the search artifact.
    ///
    /// Posts already in the artifact are skipped unless `--rebuild` is
    /// given; entries for deleted posts are pruned. Exits non-zero when any
    /// post failed to encode, after writing the rest.
    Build {
        /// Encode every post again.
        #[arg(long)]
        rebuild: bool,

        /// Artifact mode, overriding `[artifact].mode`: `embedding` or `lexical`.
        #[arg(long)]
        mode: Option<ArtifactMode>,

        /// Show counts without embedding or writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Progress on stderr. Defaults to `human` on a terminal, `off` otherwise.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Rank posts for a query.
    ///
    /// Uses hybrid ranking for an embedding artifact and the keyword index
    /// for a lexical one.
    Search {
        /// The search query.
        query: String,

        /// Only posts carrying this tag (repeatable; all must match).
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Maximum number of results.
        #[arg(long)]
        limit: Option<usize>,

        /// JSON output.
        #[arg(long)]
        json: bool,

        /// Show the semantic, coverage, and boost components.
        #[arg(long)]
        explain: bool,
    },

    /// List posts newest first.
    Posts {
        /// Only posts carrying this tag (repeatable; all must match).
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Maximum number of posts.
        #[arg(long)]
        limit: Option<usize>,

        /// JSON output.
        #[arg(long)]
        json: bool,
    },

    /// Show one post by filename.
    Get {
        /// Filename relative to the content root, e.g. `2024/async.md`.
        filename: String,

        /// JSON output.
        #[arg(long)]
        json: bool,
    },

    /// Summarize the artifact.
    Stats {
        /// JSON output.
        #[arg(long)]
        json: bool,
    },

    /// Print shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);

    // Commands that don't require config
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "blog", &mut io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Build {
            rebuild,
            mode,
            dry_run,
            progress,
        } => {
            let opts = BuildOptions {
                rebuild,
                mode: mode.unwrap_or(cfg.artifact.mode),
                dry_run,
            };
            let reporter = progress
                .unwrap_or_else(ProgressMode::default_for_tty)
                .reporter();
            let report = indexer::run_build(&cfg, &opts, reporter.as_ref()).await?;
            indexer::print_report(&report, &cfg.artifact.path);
            if !report.failed.is_empty() {
                bail!("{} post(s) failed to encode", report.failed.len());
            }
        }
        Commands::Search {
            query,
            tags,
            limit,
            json,
            explain,
        } => {
            let opts = SearchOptions {
                tags,
                limit,
                json,
                explain,
            };
            search::run_search(&cfg, &query, &opts).await?;
        }
        Commands::Posts { tags, limit, json } => {
            let opts = SearchOptions {
                tags,
                limit,
                json,
                explain: false,
            };
            search::run_posts(&cfg, &opts).await?;
        }
        Commands::Get { filename, json } => {
            get::run_get(&cfg, &filename, json)?;
        }
        Commands::Stats { json } => {
            stats::run_stats(&cfg, json)?;
        }
        Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
