//! Local inference through fastembed, loaded on first use.
//!
//! The ONNX model is downloaded from Hugging Face on the first run and
//! cached; later runs are fully offline. Loading happens at most once per
//! provider instance through [`LazyModel`], and inference runs on the
//! blocking thread pool.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::OnceCell;

/// Initialize-once slot for an expensive handle.
///
/// Concurrent first callers wait on the same in-flight load. A failed load
/// leaves the slot empty, so the next caller tries again.
pub struct LazyModel<T> {
    cell: OnceCell<Arc<T>>,
}

impl<T> Default for LazyModel<T> {
    fn default() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }
}

impl<T> LazyModel<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the loaded handle, running `load` if nothing is loaded yet.
    pub async fn get_or_load<F, Fut>(&self, load: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let handle = self
            .cell
            .get_or_try_init(|| async move { load().await.map(Arc::new) })
            .await?;
        Ok(Arc::clone(handle))
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
pub use fastembed_provider::LocalEmbedder;

#[cfg(feature = "local-embeddings-fastembed")]
mod fastembed_provider {
    use std::sync::{Arc, Mutex};

    use anyhow::{anyhow, bail, Result};
    use async_trait::async_trait;
    use blog_search_core::embedding::{l2_normalize, Embedder};
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

    use super::LazyModel;

    /// fastembed-backed [`Embedder`].
    pub struct LocalEmbedder {
        model_name: String,
        dims: usize,
        batch_size: usize,
        model: LazyModel<Mutex<TextEmbedding>>,
    }

    impl LocalEmbedder {
        pub fn new(model_name: String, dims: usize, batch_size: usize) -> Result<Self> {
            // Fail on unknown names now rather than at first query.
            config_to_fastembed_model(&model_name)?;
            Ok(Self {
                model_name,
                dims,
                batch_size,
                model: LazyModel::new(),
            })
        }

        async fn handle(&self) -> Result<Arc<Mutex<TextEmbedding>>> {
            let name = self.model_name.clone();
            self.model
                .get_or_load(|| async move {
                    let choice = config_to_fastembed_model(&name)?;
                    tracing::info!(model = %name, "loading local embedding model");
                    tokio::task::spawn_blocking(move || {
                        TextEmbedding::try_new(
                            InitOptions::new(choice).with_show_download_progress(true),
                        )
                        .map(Mutex::new)
                        .map_err(|e| anyhow!("Failed to initialize local embedding model: {}", e))
                    })
                    .await?
                })
                .await
        }
    }

    #[async_trait]
    impl Embedder for LocalEmbedder {
        fn model_name(&self) -> &str {
            &self.model_name
        }

        fn dims(&self) -> usize {
            self.dims
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            let handle = self.handle().await?;
            let texts = texts.to_vec();
            let batch_size = self.batch_size;

            let mut vectors = tokio::task::spawn_blocking(move || {
                let mut model = handle
                    .lock()
                    .map_err(|_| anyhow!("local embedding model lock poisoned"))?;
                model
                    .embed(texts, Some(batch_size))
                    .map_err(|e| anyhow!("Local embedding failed: {}", e))
            })
            .await??;

            for v in vectors.iter_mut() {
                l2_normalize(v);
            }
            Ok(vectors)
        }
    }

    fn config_to_fastembed_model(name: &str) -> Result<EmbeddingModel> {
        match name {
            "all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
            "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
            "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
            "bge-large-en-v1.5" => Ok(EmbeddingModel::BGELargeENV15),
            "nomic-embed-text-v1" => Ok(EmbeddingModel::NomicEmbedTextV1),
            "nomic-embed-text-v1.5" => Ok(EmbeddingModel::NomicEmbedTextV15),
            "multilingual-e5-small" => Ok(EmbeddingModel::MultilingualE5Small),
            "multilingual-e5-base" => Ok(EmbeddingModel::MultilingualE5Base),
            "multilingual-e5-large" => Ok(EmbeddingModel::MultilingualE5Large),
            other => bail!(
                "Unknown local embedding model: '{}'. Supported models: \
                 all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
                 nomic-embed-text-v1, nomic-embed-text-v1.5, \
                 multilingual-e5-small, multilingual-e5-base, multilingual-e5-large",
                other
            ),
        }
    }
}
