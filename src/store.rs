//! Persistent vector index.
//!
//! Stores `(vector, chunk text, metadata)` triples in a SQLite database
//! under the storage directory (see [`db`](crate::db)). The index is
//! append-only: every [`add`](VectorStore::add) extends the collection,
//! nothing is deleted or rewritten.
//!
//! Each index is bound to one embedding space. The provider fingerprint
//! recorded at creation is checked on every attach, and every vector
//! written or queried must have the recorded width.
//!
//! Search is brute-force cosine similarity over all stored vectors,
//! computed in Rust.

use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::db;
use crate::embedding::{self, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::migrate;
use crate::models::{self, Chunk, Metadata, RetrievedChunk};

const META_FINGERPRINT: &str = "fingerprint";
const META_DIMS: &str = "dims";

/// Handle to an attached index.
#[derive(Debug)]
pub struct VectorStore {
    pool: SqlitePool,
    path: PathBuf,
    fingerprint: String,
    dims: usize,
}

impl VectorStore {
    /// Attach to the index at `storage_dir`, creating it if absent.
    ///
    /// Fails with [`RagError::Configuration`] if an existing index was
    /// built with a different embedding provider.
    pub async fn open_or_create(
        storage_dir: &Path,
        provider: &dyn EmbeddingProvider,
    ) -> Result<Self> {
        let pool = db::connect(storage_dir, true).await?;
        migrate::run_migrations(&pool).await?;

        let fingerprint = provider.fingerprint();
        for (key, value) in [
            (META_FINGERPRINT, fingerprint.clone()),
            (META_DIMS, provider.dims().to_string()),
        ] {
            sqlx::query("INSERT INTO index_meta (key, value) VALUES (?, ?) ON CONFLICT(key) DO NOTHING")
                .bind(key)
                .bind(value)
                .execute(&pool)
                .await?;
        }

        Self::attach(pool, storage_dir, provider).await
    }

    /// Attach to an existing index without ingesting anything.
    ///
    /// Fails with [`RagError::NotFound`] if nothing was ever stored at
    /// `storage_dir`.
    pub async fn open(storage_dir: &Path, provider: &dyn EmbeddingProvider) -> Result<Self> {
        if !db::index_file(storage_dir).exists() {
            return Err(RagError::NotFound(storage_dir.to_path_buf()));
        }
        let pool = db::connect(storage_dir, false).await?;
        migrate::run_migrations(&pool).await?;

        if read_meta(&pool, META_FINGERPRINT).await?.is_none() {
            pool.close().await;
            return Err(RagError::NotFound(storage_dir.to_path_buf()));
        }

        Self::attach(pool, storage_dir, provider).await
    }

    async fn attach(
        pool: SqlitePool,
        storage_dir: &Path,
        provider: &dyn EmbeddingProvider,
    ) -> Result<Self> {
        let stored = read_meta(&pool, META_FINGERPRINT)
            .await?
            .unwrap_or_default();
        let expected = provider.fingerprint();
        if stored != expected {
            pool.close().await;
            return Err(RagError::Configuration(format!(
                "index at {} was built with embeddings '{}' but the configured provider is '{}'",
                storage_dir.display(),
                stored,
                expected
            )));
        }

        let dims = read_meta(&pool, META_DIMS)
            .await?
            .and_then(|d| d.parse::<usize>().ok())
            .unwrap_or_else(|| provider.dims());

        Ok(Self {
            pool,
            path: storage_dir.to_path_buf(),
            fingerprint: stored,
            dims,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Append chunks with their vectors. Returns the number of rows written.
    ///
    /// Metadata must already be scalar-only; see
    /// [`sanitize_metadata`](crate::models::sanitize_metadata).
    pub async fn add(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<usize> {
        if chunks.len() != vectors.len() {
            return Err(RagError::Embedding(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }
        for vector in vectors {
            self.check_dims(vector.len())?;
        }
        for chunk in chunks {
            check_scalar_metadata(&chunk.metadata)?;
        }

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;
        for (chunk, vector) in chunks.iter().zip(vectors) {
            let metadata_json = serde_json::to_string(&chunk.metadata)
                .map_err(|e| RagError::InvalidMetadata(e.to_string()))?;
            sqlx::query(
                "INSERT INTO chunks (id, text, metadata_json, hash, embedding, created_at) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&chunk.text)
            .bind(metadata_json)
            .bind(text_hash(&chunk.text))
            .bind(embedding::vec_to_blob(vector))
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(chunks.len())
    }

    /// Return at most `k` chunks scoring at least `score_threshold`,
    /// best first. Equal scores keep insertion order.
    pub async fn search(
        &self,
        query: &[f32],
        k: usize,
        score_threshold: f32,
    ) -> Result<Vec<RetrievedChunk>> {
        self.check_dims(query.len())?;

        let rows = sqlx::query("SELECT text, metadata_json, embedding FROM chunks ORDER BY seq")
            .fetch_all(&self.pool)
            .await?;

        let mut hits = Vec::new();
        for row in rows {
            let blob: Vec<u8> = row.try_get("embedding")?;
            let stored = embedding::blob_to_vec(&blob);
            self.check_dims(stored.len())?;

            let score = embedding::cosine_similarity(query, &stored);
            if score >= score_threshold {
                let metadata_json: String = row.try_get("metadata_json")?;
                hits.push(RetrievedChunk {
                    text: row.try_get("text")?,
                    metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
                    score,
                });
            }
        }

        // Stable sort: ties stay in `seq` order.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);

        tracing::debug!(
            candidates = hits.len(),
            top = hits.first().map(|h| h.score),
            "vector search"
        );
        Ok(hits)
    }

    /// Number of stored chunks.
    pub async fn count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    fn check_dims(&self, got: usize) -> Result<()> {
        if got != self.dims {
            return Err(RagError::Configuration(format!(
                "embedding dimension mismatch: index stores {}-d vectors, got {}",
                self.dims, got
            )));
        }
        Ok(())
    }
}

async fn read_meta(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM index_meta WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(value)
}

fn check_scalar_metadata(metadata: &Metadata) -> Result<()> {
    for (key, value) in metadata {
        if !models::is_scalar(value) {
            return Err(RagError::InvalidMetadata(format!(
                "field '{}' is not a string, number, or bool",
                key
            )));
        }
    }
    Ok(())
}

fn text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
