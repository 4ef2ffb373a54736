//! The answering pipeline.
//!
//! One [`Pipeline`] owns the whole mutable state of a session: the bound
//! model handle and the attached index handle. Nothing is global; two
//! pipelines in one process are independent apart from sharing a storage
//! directory on disk.
//!
//! ```text
//! ingest(path) ─► load ─► chunk ─► sanitize metadata ─► embed ─► index.add
//! ask(query)   ─► ensure attached ─► embed ─► index.search(k, threshold)
//!                                          ─► grounded prompt ─► model.invoke
//! ```
//!
//! Routine absences are not errors: with nothing indexed `ask` returns
//! [`NO_DOCUMENT_MESSAGE`], and an unknown model makes `select_model`
//! return `false` with the previous selection intact.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::chunk::Chunker;
use crate::config::{Config, RetrievalConfig};
use crate::embedding::{self, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::extract::{self, MIME_TEXT};
use crate::llm::{ChatModel, LanguageBackend, OllamaBackend};
use crate::models::{sanitize_metadata, ModelStatus, SourcePage};
use crate::prompt;
use crate::registry::{ModelRegistry, OllamaCliRegistry};
use crate::store::VectorStore;

/// Returned by [`Pipeline::ask`] when no index exists yet.
pub const NO_DOCUMENT_MESSAGE: &str = "Please, add a PDF document first.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// No model bound.
    Unbound,
    /// A model is bound; the index is attached or attachable on demand.
    Ready,
}

/// Outcome of one successful ingest.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub source: String,
    pub pages: usize,
    pub chunks: usize,
    /// Metadata keys removed because their values were not scalar.
    pub dropped_metadata: Vec<String>,
    pub elapsed: Duration,
}

pub struct Pipeline {
    storage_dir: PathBuf,
    retrieval: RetrievalConfig,
    batch_size: usize,
    chunker: Chunker,
    embedder: Arc<dyn EmbeddingProvider>,
    registry: Box<dyn ModelRegistry>,
    backend: Box<dyn LanguageBackend>,
    model: Option<Box<dyn ChatModel>>,
    store: Option<VectorStore>,
}

impl Pipeline {
    /// Build a pipeline with the stock collaborators: the configured
    /// embedding provider, the `ollama list` registry and the Ollama
    /// chat backend.
    pub fn from_config(config: &Config) -> Result<Self> {
        let embedder = embedding::create_provider(&config.embedding)?;
        let registry = Box::new(OllamaCliRegistry::from_config(&config.llm));
        let backend = Box::new(OllamaBackend::new(&config.llm)?);
        Self::new(config, embedder, registry, backend)
    }

    /// Build a pipeline around explicit collaborators.
    ///
    /// `llm.default_model` is bound without consulting the registry, so a
    /// pipeline can be constructed while the backend is down. A blank
    /// default leaves the pipeline [`Unbound`](PipelineState::Unbound).
    pub fn new(
        config: &Config,
        embedder: Arc<dyn EmbeddingProvider>,
        registry: Box<dyn ModelRegistry>,
        backend: Box<dyn LanguageBackend>,
    ) -> Result<Self> {
        config.validate()?;

        let default_model = config.llm.default_model.trim();
        let model = if default_model.is_empty() {
            None
        } else {
            Some(backend.bind(default_model)?)
        };

        Ok(Self {
            storage_dir: config.store.path.clone(),
            retrieval: config.retrieval.clone(),
            batch_size: config.embedding.batch_size,
            chunker: Chunker::from_config(&config.chunking),
            embedder,
            registry,
            backend,
            model,
            store: None,
        })
    }

    pub fn state(&self) -> PipelineState {
        if self.model.is_some() {
            PipelineState::Ready
        } else {
            PipelineState::Unbound
        }
    }

    pub fn current_model(&self) -> Option<&str> {
        self.model.as_deref().map(|m| m.name())
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn is_attached(&self) -> bool {
        self.store.is_some()
    }

    /// Switch to `name` if the registry lists it. On `false` the previous
    /// model stays bound.
    pub async fn select_model(&mut self, name: &str) -> bool {
        let name = name.trim();
        if !self.registry.is_available(name).await {
            tracing::warn!(model = %name, "model is not installed; keeping current selection");
            return false;
        }

        match self.backend.bind(name) {
            Ok(handle) => {
                let previous = self.model.replace(handle);
                tracing::info!(
                    model = %name,
                    previous = previous.as_deref().map(|m| m.name()).unwrap_or("-"),
                    "switched model"
                );
                true
            }
            Err(e) => {
                tracing::warn!(model = %name, error = %e, "failed to bind model");
                false
            }
        }
    }

    pub async fn list_available_models(&self) -> Vec<String> {
        self.registry.list_available().await
    }

    /// Name of the bound model and whether the backend lists it right now.
    /// An unbound pipeline reports an empty name, never available.
    pub async fn model_status(&self) -> ModelStatus {
        match self.current_model() {
            Some(name) => ModelStatus {
                name: name.to_string(),
                available: self.registry.is_available(name).await,
            },
            None => ModelStatus {
                name: String::new(),
                available: false,
            },
        }
    }

    /// Load, chunk, embed and index the document at `path`.
    ///
    /// Parse failures surface as [`RagError::Ingest`] and leave the index
    /// untouched.
    pub async fn ingest(&mut self, path: &Path) -> Result<IngestReport> {
        let started = Instant::now();
        tracing::info!(path = %path.display(), "ingesting document");
        let pages = extract::load_document(path).await?;
        self.ingest_pages(path.display().to_string(), pages, started)
            .await
    }

    /// Index text the caller already holds, as a single page.
    pub async fn ingest_text(&mut self, source: &str, text: &str) -> Result<IngestReport> {
        let started = Instant::now();
        let page = SourcePage {
            text: text.to_string(),
            metadata: extract::page_metadata(source, 0, 1, MIME_TEXT),
        };
        self.ingest_pages(source.to_string(), vec![page], started)
            .await
    }

    async fn ingest_pages(
        &mut self,
        source: String,
        pages: Vec<SourcePage>,
        started: Instant,
    ) -> Result<IngestReport> {
        let mut chunks = self.chunker.split_pages(&pages);

        let mut dropped_metadata = Vec::new();
        for chunk in &mut chunks {
            for key in sanitize_metadata(&mut chunk.metadata) {
                if !dropped_metadata.contains(&key) {
                    dropped_metadata.push(key);
                }
            }
        }
        if !dropped_metadata.is_empty() {
            tracing::debug!(keys = ?dropped_metadata, "dropped non-scalar metadata");
        }

        if chunks.is_empty() {
            tracing::warn!(source = %source, "document has no extractable text; nothing indexed");
            return Ok(IngestReport {
                source,
                pages: pages.len(),
                chunks: 0,
                dropped_metadata,
                elapsed: started.elapsed(),
            });
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedding::embed_all(self.embedder.as_ref(), &texts, self.batch_size).await?;

        if self.store.is_none() {
            let store = VectorStore::open_or_create(&self.storage_dir, self.embedder.as_ref()).await?;
            self.store = Some(store);
        }
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| RagError::NotFound(self.storage_dir.clone()))?;
        let written = store.add(&chunks, &vectors).await?;

        let report = IngestReport {
            source,
            pages: pages.len(),
            chunks: written,
            dropped_metadata,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            source = %report.source,
            pages = report.pages,
            chunks = report.chunks,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "ingest complete"
        );
        Ok(report)
    }

    /// Answer `query` from the indexed documents.
    ///
    /// Returns [`NO_DOCUMENT_MESSAGE`] when nothing was ever indexed at the
    /// storage directory. Zero retrieved chunks still reach the model, with
    /// an empty context.
    pub async fn ask(&mut self, query: &str) -> Result<String> {
        if !self.ensure_attached().await? {
            return Ok(NO_DOCUMENT_MESSAGE.to_string());
        }
        let model = self.model.as_deref().ok_or(RagError::NoModelSelected)?;
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| RagError::NotFound(self.storage_dir.clone()))?;

        let query_vector = self.embedder.embed(query).await?;
        let hits = store
            .search(&query_vector, self.retrieval.k, self.retrieval.score_threshold)
            .await?;
        tracing::debug!(
            retrieved = hits.len(),
            scores = ?hits.iter().map(|h| h.score).collect::<Vec<_>>(),
            "retrieval"
        );

        let messages = prompt::build_messages(&hits, query);
        model.invoke(&messages).await
    }

    /// Chunks in the index, or `None` when nothing was ever indexed.
    pub async fn indexed_chunks(&mut self) -> Result<Option<i64>> {
        if !self.ensure_attached().await? {
            return Ok(None);
        }
        match &self.store {
            Some(store) => Ok(Some(store.count().await?)),
            None => Ok(None),
        }
    }

    /// Detach the index handle. On-disk data is kept; the next `ask`
    /// re-attaches to it. Idempotent.
    pub async fn clear(&mut self) {
        if let Some(store) = self.store.take() {
            store.close().await;
            tracing::debug!("detached vector index");
        }
    }

    /// Attach to persisted state if not attached yet. `false` when no
    /// index exists at the storage directory.
    async fn ensure_attached(&mut self) -> Result<bool> {
        if self.store.is_some() {
            return Ok(true);
        }
        match VectorStore::open(&self.storage_dir, self.embedder.as_ref()).await {
            Ok(store) => {
                tracing::debug!(path = %store.path().display(), "attached vector index");
                self.store = Some(store);
                Ok(true)
            }
            Err(RagError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
