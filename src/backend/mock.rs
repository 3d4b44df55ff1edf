//! Deterministic word-overlap vector backend, used by tests and the demo
//! binary in place of a real SQLite/Turso/Meilisearch-backed engine.
//!
//! "Similarity" here is deterministic word overlap, not a real embedding
//! distance — good enough to drive the pipeline's scoring stages without
//! a real embedding provider.

use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::backend::client::{BackendSettings, InsertItem, QueryResult, VectorBackend};
use crate::error::Result;
use crate::types::{Chunk, ChunkMetadata, ContentHash};

fn word_set(text: &str) -> std::collections::HashSet<String> {
    text.to_lowercase()
    .split(|c: char| !c.is_alphanumeric())
    .filter(|w| !w.is_empty())
    .map(str::to_string())
    .collect()
}

/// Jaccard overlap between the query's and the chunk's word sets, in
/// `[0, 1]`. Higher is better, matching the backend contract's "cosine or
/// equivalent" scoring.
fn overlap_score(query: &str, text: &str) -> f32 {
    let q = word_set(query);
    let t = word_set(text);
    if q.is_empty() || t.is_empty() {
        return 0.0;
    }
    let intersection = q.intersection(&t).count();
    let union = q.union(&t).count();
    intersection as f32 / union as f32
}

#[derive(Default)]
pub struct InMemoryVectorBackend {
    collections: DashMap<String, DashMap<ContentHash, Chunk>>,
}

impl InMemoryVectorBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a collection with chunks directly, bypassing `insert`. Useful
    /// to set up literal scenario fixtures without round-tripping
    /// through the scoring pipeline.
    pub fn seed(&self, collection_id: &str, chunks: Vec<Chunk>) {
        let coll = self.collections.entry(collection_id.to_string()).or_default();
        for chunk in chunks {
            coll.insert(chunk.hash, chunk);
        }
    }
}

#[async_trait]
impl VectorBackend for InMemoryVectorBackend {
    async fn list_hashes(&self, collection_id: &str, _settings: &BackendSettings) -> Result<Vec<ContentHash>> {
        Ok(self
            .collections
            .get(collection_id)
            .map(|c| c.iter().map(|e| *e.key).collect())
            .unwrap_or_default())
    }

    async fn list_hashes_with_metadata(
        &self,
        collection_id: &str,
        _settings: &BackendSettings,
    ) -> Result<Vec<Chunk>> {
        Ok(self
            .collections
            .get(collection_id)
            .map(|c| c.iter().map(|e| e.value.clone()).collect())
            .unwrap_or_default())
    }

    async fn insert(
        &self,
        collection_id: &str,
        items: Vec<InsertItem>,
        _settings: &BackendSettings,
    ) -> Result<()> {
        let coll = self.collections.entry(collection_id.to_string()).or_default();
        for item in items {
            // Idempotent on hash.
            coll.entry(item.hash).or_insert_with(|| Chunk {
                    hash: item.hash,
                    text: item.text,
                    index: item.index,
                    metadata: item.metadata,
                    score: None,
                });
        }
        Ok(())
    }

    async fn query(
        &self,
        collection_id: &str,
        text: &str,
        top_k: usize,
        _settings: &BackendSettings,
    ) -> Result<QueryResult> {
        let Some(coll) = self.collections.get(collection_id) else {
            return Ok(QueryResult::default());
        };

        let mut scored: Vec<Chunk> = coll
        .iter()
        .map(|e| {
                let mut c = e.value.clone();
                c.score = Some(overlap_score(text, &c.text));
                c
            })
        .collect();

        scored.sort_by(|a, b| {
                b.score
                .unwrap_or(0.0)
                .partial_cmp(&a.score.unwrap_or(0.0))
                .unwrap_or(std::cmp::Ordering::Equal)
            });
        scored.truncate(top_k);

        Ok(QueryResult {
                hashes: scored.iter().map(|c| c.hash).collect(),
                chunks: scored,
            })
    }

    async fn query_multiple(
        &self,
        collection_ids: &[String],
        text: &str,
        top_k: usize,
        threshold: f32,
        settings: &BackendSettings,
    ) -> Result<HashMap<String, QueryResult>> {
        let mut out = HashMap::new();
        for id in collection_ids {
            let mut result = self.query(id, text, top_k, settings).await?;
            result.chunks.retain(|c| c.score.unwrap_or(0.0) >= threshold);
            result.hashes = result.chunks.iter().map(|c| c.hash).collect();
            out.insert(id.clone(), result);
        }
        Ok(out)
    }

    async fn delete(&self, collection_id: &str, hashes: &[ContentHash], _settings: &BackendSettings) -> Result<()> {
        if let Some(coll) = self.collections.get(collection_id) {
            for h in hashes {
                coll.remove(h);
            }
        }
        Ok(())
    }

    async fn purge(&self, collection_id: &str, _settings: &BackendSettings) -> Result<bool> {
        Ok(self.collections.remove(collection_id).is_some())
    }

    async fn update_text(
        &self,
        collection_id: &str,
        hash: ContentHash,
        new_text: &str,
        _settings: &BackendSettings,
    ) -> Result<()> {
        if let Some(coll) = self.collections.get(collection_id) {
            if let Some(mut entry) = coll.get_mut(&hash) {
                entry.text = new_text.to_string();
            }
        }
        Ok(())
    }

    async fn update_metadata(
        &self,
        collection_id: &str,
        hash: ContentHash,
        metadata: ChunkMetadata,
        _settings: &BackendSettings,
    ) -> Result<()> {
        if let Some(coll) = self.collections.get(collection_id) {
            if let Some(mut entry) = coll.get_mut(&hash) {
                entry.metadata = metadata;
            }
        }
        Ok(())
    }
}
