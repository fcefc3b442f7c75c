//! TOML configuration for the `blog` binary.
//!
//! Every section and field has a default, so a config file only needs the
//! values that differ:
//!
//! ```toml
//! [content]
//! root = "./posts"
//!
//! [artifact]
//! path = "./public/search/blog.json"
//! mode = "embedding"            # or "lexical"
//!
//! [embedding]
//! provider = "local"            # local | ollama | openai | hash | disabled
//! model = "all-minilm-l6-v2"
//! ```
//!
//! [`load_config`] parses the file and validates cross-field constraints.

use anyhow::{bail, Context, Result};
use blog_search_core::chunk::{DEFAULT_MAX_WORDS, DEFAULT_MIN_WORDS};
use blog_search_core::models::ArtifactMode;
use blog_search_core::rank::RankingParams;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub artifact: ArtifactConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

/// Where the markdown posts live.
#[derive(Debug, Deserialize, Clone)]
pub struct ContentConfig {
    #[serde(default = "default_content_root")]
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            root: default_content_root(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_content_root() -> PathBuf {
    PathBuf::from("./posts")
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string()]
}

/// The generated search artifact.
#[derive(Debug, Deserialize, Clone)]
pub struct ArtifactConfig {
    #[serde(default = "default_artifact_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub mode: ArtifactMode,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            path: default_artifact_path(),
            mode: ArtifactMode::default(),
        }
    }
}

fn default_artifact_path() -> PathBuf {
    PathBuf::from("./public/search/blog.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_min_words")]
    pub min_words: usize,
    #[serde(default = "default_max_words")]
    pub max_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            min_words: DEFAULT_MIN_WORDS,
            max_words: DEFAULT_MAX_WORDS,
        }
    }
}

fn default_min_words() -> usize {
    DEFAULT_MIN_WORDS
}
fn default_max_words() -> usize {
    DEFAULT_MAX_WORDS
}

/// Hybrid score weights and cut-off.
#[derive(Debug, Deserialize, Clone)]
pub struct RankingConfig {
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f64,
    #[serde(default = "default_lexical_weight")]
    pub coverage_weight: f64,
    #[serde(default = "default_lexical_weight")]
    pub boost_weight: f64,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        let params = RankingParams::default();
        Self {
            semantic_weight: params.semantic_weight,
            coverage_weight: params.coverage_weight,
            boost_weight: params.boost_weight,
            threshold: params.threshold,
        }
    }
}

impl RankingConfig {
    pub fn params(&self) -> RankingParams {
        RankingParams {
            semantic_weight: self.semantic_weight,
            coverage_weight: self.coverage_weight,
            boost_weight: self.boost_weight,
            threshold: self.threshold,
        }
    }
}

fn default_semantic_weight() -> f64 {
    0.7
}
fn default_lexical_weight() -> f64 {
    0.15
}
fn default_threshold() -> f64 {
    0.3
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Chunking
    if config.chunking.max_words == 0 {
        bail!("chunking.max_words must be > 0");
    }
    if config.chunking.min_words > config.chunking.max_words {
        bail!(
            "chunking.min_words ({}) must not exceed chunking.max_words ({})",
            config.chunking.min_words,
            config.chunking.max_words
        );
    }

    // Ranking
    let r = &config.ranking;
    for (name, weight) in [
        ("semantic_weight", r.semantic_weight),
        ("coverage_weight", r.coverage_weight),
        ("boost_weight", r.boost_weight),
    ] {
        if !(0.0..=1.0).contains(&weight) {
            bail!("ranking.{} must be in [0.0, 1.0]", name);
        }
    }
    if r.semantic_weight + r.coverage_weight + r.boost_weight <= 0.0 {
        bail!("ranking weights must not all be zero");
    }
    if !(0.0..1.0).contains(&r.threshold) {
        bail!("ranking.threshold must be in [0.0, 1.0)");
    }

    // Embedding
    let e = &config.embedding;
    match e.provider.as_str() {
        "disabled" | "local" | "hash" => {}
        "openai" | "ollama" => {
            if e.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    e.provider
                );
            }
            if e.dims.is_none() || e.dims == Some(0) {
                bail!("embedding.dims must be > 0 when provider is '{}'", e.provider);
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, local, ollama, openai, or hash.",
            other
        ),
    }
    if e.dims == Some(0) {
        bail!("embedding.dims must be > 0");
    }
    if e.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    if config.artifact.mode == ArtifactMode::Embedding && !e.is_enabled() {
        bail!("artifact.mode = \"embedding\" requires an embedding provider; set artifact.mode = \"lexical\" or enable [embedding]");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_text: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_text)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.content.root, PathBuf::from("./posts"));
        assert_eq!(config.content.include_globs, vec!["**/*.md"]);
        assert_eq!(config.artifact.mode, ArtifactMode::Embedding);
        assert_eq!(config.chunking.min_words, 40);
        assert_eq!(config.chunking.max_words, 80);
        assert_eq!(config.ranking.params(), RankingParams::default());
        assert_eq!(config.embedding.provider, "local");
    }

    #[test]
    fn test_sample_config_matches_defaults() {
        let sample = parse(include_str!("../config/blog.toml")).unwrap();
        let defaults = Config::default();

        assert_eq!(sample.content.root, defaults.content.root);
        assert_eq!(sample.content.include_globs, defaults.content.include_globs);
        assert_eq!(sample.content.exclude_globs, defaults.content.exclude_globs);
        assert_eq!(sample.content.follow_symlinks, defaults.content.follow_symlinks);
        assert_eq!(sample.artifact.path, defaults.artifact.path);
        assert_eq!(sample.artifact.mode, defaults.artifact.mode);
        assert_eq!(sample.chunking.min_words, defaults.chunking.min_words);
        assert_eq!(sample.chunking.max_words, defaults.chunking.max_words);
        assert_eq!(sample.ranking.params(), defaults.ranking.params());
        assert_eq!(sample.embedding.provider, defaults.embedding.provider);
        assert_eq!(
            crate::embedding::resolve_local_model(&sample.embedding),
            crate::embedding::resolve_local_model(&defaults.embedding)
        );
        assert_eq!(sample.embedding.batch_size, defaults.embedding.batch_size);
        assert_eq!(sample.embedding.max_retries, defaults.embedding.max_retries);
        assert_eq!(sample.embedding.timeout_secs, defaults.embedding.timeout_secs);
    }

    #[test]
    fn test_partial_sections() {
        let config = parse(
            r#"
            [artifact]
            mode = "lexical"

            [ranking]
            threshold = 0.25

            [embedding]
            provider = "disabled"
            "#,
        )
        .unwrap();
        assert_eq!(config.artifact.mode, ArtifactMode::Lexical);
        assert_eq!(config.ranking.threshold, 0.25);
        assert_eq!(config.ranking.semantic_weight, 0.7);
    }

    #[test]
    fn test_rejects_inverted_chunk_bounds() {
        let err = parse("[chunking]\nmin_words = 100\nmax_words = 80\n").unwrap_err();
        assert!(err.to_string().contains("min_words"));
    }

    #[test]
    fn test_rejects_bad_weights() {
        assert!(parse("[ranking]\nsemantic_weight = 1.5\n").is_err());
        assert!(parse("[ranking]\nthreshold = 1.0\n").is_err());
        assert!(parse(
            "[ranking]\nsemantic_weight = 0.0\ncoverage_weight = 0.0\nboost_weight = 0.0\n"
        )
        .is_err());
    }

    #[test]
    fn test_http_providers_need_model_and_dims() {
        assert!(parse("[embedding]\nprovider = \"openai\"\n").is_err());
        assert!(parse("[embedding]\nprovider = \"ollama\"\nmodel = \"nomic-embed-text\"\n").is_err());
        assert!(parse(
            "[embedding]\nprovider = \"ollama\"\nmodel = \"nomic-embed-text\"\ndims = 768\n"
        )
        .is_ok());
    }

    #[test]
    fn test_embedding_mode_needs_provider() {
        let err = parse("[embedding]\nprovider = \"disabled\"\n").unwrap_err();
        assert!(err.to_string().contains("lexical"));
    }

    #[test]
    fn test_unknown_provider_and_mode() {
        assert!(parse("[embedding]\nprovider = \"magic\"\n").is_err());
        assert!(parse("[artifact]\nmode = \"vector\"\n").is_err());
    }
}
