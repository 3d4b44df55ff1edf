//! Incremental sync engine — keeps a chat collection's vector index
//! aligned with the conversation.
//!
//! The batch-draining loop is the usual shape: acquire a gate, diff
//! against a source of truth, process a bounded slice, report progress,
//! repeat — here, draining a queue of new message groups against a
//! vector backend.

use std::collections::HashSet;
use std::sync::Arc;

use crate::backend::{InsertItem, VectorBackend};
use crate::error::Result;
use crate::hashing::splitter::{group_messages, hash_text, split};
use crate::pipeline::settings::PipelineSettings;
use crate::registry::metadata_store::MetadataStore;
use crate::sync::gate::SyncGate;
use crate::types::{ChatMessage, ChunkMetadata};

/// Outcome of one sync batch. `remaining == 0` means done;
/// `-1` is the disabled/gate-busy sentinel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub remaining: i64,
    pub messages_processed: usize,
    pub chunks_created: usize,
    pub items_failed: usize,
}

impl SyncReport {
    fn sentinel() -> Self {
        Self {
            remaining: -1,
            ..Default::default()
        }
    }
}

pub struct SyncEngine {
    backend: Arc<dyn VectorBackend>,
    metadata: Arc<dyn MetadataStore>,
    gate: SyncGate,
}

impl SyncEngine {
    pub fn new(backend: Arc<dyn VectorBackend>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self {
            backend,
            metadata,
            gate: SyncGate::new(),
        }
    }

    /// Run one batch of up to `settings.batch_size` items against
    /// `collection_id`'s current `messages`.
    pub async fn sync_batch(
        &self,
        collection_id: &str,
        messages: &[ChatMessage],
        settings: &PipelineSettings,
    ) -> Result<SyncReport> {
        if !settings.enabled_chats {
            return Ok(SyncReport::sentinel());
        }

        let Some(_guard) = self.gate.try_acquire().await else {
            return Ok(SyncReport::sentinel());
        };

        let backend_settings = settings.backend_settings();
        let existing: HashSet<_> = self
        .backend
        .list_hashes(collection_id, &backend_settings)
        .await?
        .into_iter()
        .collect();

        let non_system: Vec<ChatMessage> = messages.iter().filter(|m| !m.is_system).cloned().collect();
        let groups = group_messages(&non_system, settings.chunking_strategy);

        let queue: Vec<_> = groups
        .into_iter()
        .filter(|g| !existing.contains(&hash_text(&g.text)))
        .collect();

        let mut processed = 0usize;
        let mut created = 0usize;
        let mut failed = 0usize;

        for group in queue.iter().take(settings.batch_size) {
            let pieces = split(&group.text, settings.message_chunk_size as i64);
            let mut items = Vec::with_capacity(pieces.len());
            for (idx, piece) in pieces.iter().enumerate() {
                let mut metadata = ChunkMetadata::default();
                metadata.source = "chat".to_string();
                metadata.message_hashes = group.message_hashes.clone();
                metadata.message_id = Some(group.message_index as i64);
                if pieces.len() > 1 {
                    metadata.chunk_index = Some(idx);
                    metadata.total_chunks = Some(pieces.len());
                    metadata.original_message_hash = group.message_hashes.first().copied();
                }
                items.push(InsertItem {
                        hash: hash_text(piece),
                        text: piece.clone(),
                        index: idx,
                        vector: None,
                        metadata,
                    });
            }

            match self.backend.insert(collection_id, items, &backend_settings).await {
                Ok(()) => {
                    processed += 1;
                    created += pieces.len();
                }
                Err(err) => {
                    tracing::warn!(error = %err, collection = %collection_id, "sync item failed");
                    failed += 1;
                }
            }
        }

        let remaining = queue.len().saturating_sub(settings.batch_size) as i64;

        Ok(SyncReport {
                remaining,
                messages_processed: processed,
                chunks_created: created,
                items_failed: failed,
            })
    }

    /// Passthrough purge, also unregistering the collection.
    pub async fn purge(&self, collection_id: &str, settings: &PipelineSettings) -> Result<bool> {
        let backend_settings = settings.backend_settings();
        let purged = self.backend.purge(collection_id, &backend_settings).await?;
        self.metadata.remove_from_registry(collection_id);
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryVectorBackend;
    use crate::registry::metadata_store::InMemoryMetadataStore;

    fn msg(text: &str) -> ChatMessage {
        ChatMessage {
            mes: text.to_string(),
            name: "User".into(),
            is_user: true,
            is_system: false,
            swipes: vec![],
            extra: Default::default(),
        }
    }

    #[tokio::test]
    async fn disabled_returns_sentinel() {
        let backend = Arc::new(InMemoryVectorBackend::new());
        let metadata = Arc::new(InMemoryMetadataStore::new());
        let engine = SyncEngine::new(backend, metadata);
        let mut settings = PipelineSettings::default();
        settings.enabled_chats = false;

        let report = engine.sync_batch("vh:chat:u1", &[], &settings).await.unwrap();
        assert_eq!(report.remaining, -1);
    }

    #[tokio::test]
    async fn new_messages_are_inserted_and_reported_done() {
        let backend = Arc::new(InMemoryVectorBackend::new());
        let metadata = Arc::new(InMemoryMetadataStore::new());
        let engine = SyncEngine::new(backend.clone(), metadata);
        let settings = PipelineSettings::default();
        let messages = vec![msg("hello there"), msg("how are you")];

        let report = engine.sync_batch("vh:chat:u1", &messages, &settings).await.unwrap();
        assert_eq!(report.remaining, 0);
        assert_eq!(report.messages_processed, 2);
        assert_eq!(report.items_failed, 0);

        let settings2 = PipelineSettings::default();
        let hashes = backend
        .list_hashes("vh:chat:u1", &settings2.backend_settings())
        .await
        .unwrap();
        assert_eq!(hashes.len(), 2);
    }

    #[tokio::test]
    async fn inserted_chunks_carry_a_message_id_for_decay() {
        let backend = Arc::new(InMemoryVectorBackend::new());
        let metadata = Arc::new(InMemoryMetadataStore::new());
        let engine = SyncEngine::new(backend.clone(), metadata);
        let settings = PipelineSettings::default();
        let messages = vec![msg("hello there"), msg("how are you")];

        engine.sync_batch("vh:chat:u1", &messages, &settings).await.unwrap();

        let chunks = backend
        .list_hashes_with_metadata("vh:chat:u1", &settings.backend_settings())
        .await
        .unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.metadata.message_id.is_some()));
    }

    #[tokio::test]
    async fn already_synced_messages_are_skipped_on_second_run() {
        let backend = Arc::new(InMemoryVectorBackend::new());
        let metadata = Arc::new(InMemoryMetadataStore::new());
        let engine = SyncEngine::new(backend, metadata);
        let settings = PipelineSettings::default();
        let messages = vec![msg("hello there")];

        engine.sync_batch("vh:chat:u1", &messages, &settings).await.unwrap();
        let second = engine.sync_batch("vh:chat:u1", &messages, &settings).await.unwrap();
        assert_eq!(second.remaining, 0);
        assert_eq!(second.messages_processed, 0);
    }

    #[tokio::test]
    async fn batch_size_caps_items_processed_per_call() {
        let backend = Arc::new(InMemoryVectorBackend::new());
        let metadata = Arc::new(InMemoryMetadataStore::new());
        let engine = SyncEngine::new(backend, metadata);
        let mut settings = PipelineSettings::default();
        settings.batch_size = 2;
        let messages: Vec<_> = (0..5).map(|i| msg(&format!("message number {i}"))).collect();

        let report = engine.sync_batch("vh:chat:u1", &messages, &settings).await.unwrap();
        assert_eq!(report.messages_processed, 2);
        assert_eq!(report.remaining, 3);
    }

    #[tokio::test]
    async fn purge_unregisters_the_collection() {
        let backend = Arc::new(InMemoryVectorBackend::new());
        backend.seed("vh:chat:u1", vec![]);
        let metadata = Arc::new(InMemoryMetadataStore::new());
        metadata.add_to_registry("vh:chat:u1".to_string());
        let engine = SyncEngine::new(backend, metadata.clone());
        let settings = PipelineSettings::default();

        let purged = engine.purge("vh:chat:u1", &settings).await.unwrap();
        assert!(purged);
        assert!(!metadata.registry().contains(&"vh:chat:u1".to_string()));
    }
}
