//! Vector backend capability surface
//!
//! A `Send + Sync` trait object seam with `Result<T>` returns everywhere.
//! The trait is `async_trait` rather than synchronous: the backend is an
//! out-of-process collaborator reached over HTTP, and its calls are
//! exactly the suspension points a caller needs its own timeout and retry
//! policy around.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;
use crate::types::{Chunk, ChunkMetadata, ContentHash};

/// The subset of `settings` a backend call needs to route and
/// authenticate a request. Deliberately narrower than
/// `pipeline::settings::PipelineSettings`, which also carries retrieval
/// policy the backend itself has no business seeing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Embedding provider id.
    pub source: String,
    pub model: Option<String>,
    pub vector_backend: Option<String>,
    pub api_url_custom: Option<String>,
    pub use_alt_endpoint: bool,
    pub alt_endpoint_url: Option<String>,
}

/// One item to insert, carrying everything the backend needs to both
/// embed (if `vector` is absent) and store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertItem {
    pub hash: ContentHash,
    pub text: String,
    pub index: usize,
    pub vector: Option<Vec<f32>>,
    pub metadata: ChunkMetadata,
}

/// Result of a single-collection query: hashes plus the chunk
/// records the backend resolved them to (text, metadata, and `score`).
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub hashes: Vec<ContentHash>,
    pub chunks: Vec<Chunk>,
}

/// # Design Principles
///
/// 1. **Narrow surface**: the pipeline and sync engine consume exactly
/// these nine operations; nothing about the storage engine, embedding
/// model wiring, or wire format leaks through.
/// 2. **Idempotent insert**: re-inserting an already-present hash is a
/// no-op, not an error.
/// 3. **Text preserved in metadata**: implementations MUST return each
/// chunk's `text` from `query`/`listHashesWithMetadata` without a
/// re-lookup against the original source.
/// 4. **Suspension points**: every method here is a blocking I/O point
/// under the cooperative scheduler; callers wrap them in their own
/// per-call timeout and retry policy (`backend::retry`).
#[async_trait]
pub trait VectorBackend: Send + Sync {
    async fn list_hashes(&self, collection_id: &str, settings: &BackendSettings) -> Result<Vec<ContentHash>>;

    async fn list_hashes_with_metadata(
        &self,
        collection_id: &str,
        settings: &BackendSettings,
    ) -> Result<Vec<Chunk>>;

    async fn insert(
        &self,
        collection_id: &str,
        items: Vec<InsertItem>,
        settings: &BackendSettings,
    ) -> Result<()>;

    async fn query(
        &self,
        collection_id: &str,
        text: &str,
        top_k: usize,
        settings: &BackendSettings,
    ) -> Result<QueryResult>;

    async fn query_multiple(
        &self,
        collection_ids: &[String],
        text: &str,
        top_k: usize,
        threshold: f32,
        settings: &BackendSettings,
    ) -> Result<HashMap<String, QueryResult>>;

    async fn delete(&self, collection_id: &str, hashes: &[ContentHash], settings: &BackendSettings) -> Result<()>;

    async fn purge(&self, collection_id: &str, settings: &BackendSettings) -> Result<bool>;

    async fn update_text(
        &self,
        collection_id: &str,
        hash: ContentHash,
        new_text: &str,
        settings: &BackendSettings,
    ) -> Result<()>;

    async fn update_metadata(
        &self,
        collection_id: &str,
        hash: ContentHash,
        metadata: ChunkMetadata,
        settings: &BackendSettings,
    ) -> Result<()>;
}
