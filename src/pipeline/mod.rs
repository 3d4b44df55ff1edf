//! Retrieval pipeline — the hard core
//!
//! Orchestrates hashing, keyword boosting, temporal decay, the
//! condition evaluator, the activation gate, the collection
//! registry, and the vector backend client into the traced,
//! twelve-step staged search that produces (or doesn't) an injection
//! string. The smaller helper functions (`query::build_query_text`,
//! `query::live_context_hashes`) are kept as plain, unit-tested functions
//! over typed config rather than folded into the orchestration method.

pub mod activation_history;
pub mod groups;
pub mod query;
pub mod settings;
pub mod trace;

pub use settings::PipelineSettings;
pub use trace::{DebugData, InjectionRecord};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::activation::is_active;
use crate::backend::VectorBackend;
use crate::conditions::{self, ActiveChunkTag};
use crate::error::{Result, VhError};
use crate::host::ChatHost;
use crate::registry::collection::{ChunkLink, CollectionMeta};
use crate::registry::ids::CollectionId;
use crate::registry::metadata_store::MetadataStore;
use crate::scoring::{apply_decay, apply_keyword_boost, apply_rerank, overfetch_k, rerank_and_trim, RerankResult};
use crate::types::{
    ChatMessage, ContentHash, GenerationType, Scene, ScoredChunk, SearchContext, Verdict,
};

/// What happened to one retrieval run. Always `Ok` at the call boundary —
/// the pipeline never throws to the host, so a run that aborted
/// internally still reports as a (non-injecting) outcome.
#[derive(Debug, Clone, Default)]
pub struct PipelineOutcome {
    pub injected: bool,
    pub injected_text: String,
    /// Why nothing was injected, when `injected` is false and it isn't
    /// simply "no candidates survived" (e.g. an early-exit or an
    /// abort-worthy error).
    pub reason: Option<String>,
}

impl PipelineOutcome {
    fn empty(reason: impl Into<String>) -> Self {
        Self {
            injected: false,
            injected_text: String::new(),
            reason: Some(reason.into()),
        }
    }
}

pub struct RetrievalPipeline {
    host: Arc<dyn ChatHost>,
    backend: Arc<dyn VectorBackend>,
    metadata: Arc<dyn MetadataStore>,
    prompt_tag: String,
}

impl RetrievalPipeline {
    pub fn new(host: Arc<dyn ChatHost>, backend: Arc<dyn VectorBackend>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self {
            host,
            backend,
            metadata,
            prompt_tag: "vecthare".to_string(),
        }
    }

    pub fn with_prompt_tag(mut self, tag: impl Into<String>) -> Self {
        self.prompt_tag = tag.into();
        self
    }

    /// Run one retrieval. Never returns `Err` for anything that
    /// classifies as "this turn gets no injection" — those are captured
    /// internally and reported via `PipelineOutcome::reason`.
    pub async fn run(&self, settings: &PipelineSettings, generation_type: GenerationType) -> Result<PipelineOutcome> {
        match self.run_inner(settings, generation_type).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                tracing::warn!(error = %err, "retrieval aborted, no injection this turn");
                let _ = self.host.set_prompt(&self.prompt_tag, "", settings.position, settings.depth).await;
                Ok(PipelineOutcome::empty(err.user_message()))
            }
        }
    }

    async fn run_inner(&self, settings: &PipelineSettings, generation_type: GenerationType) -> Result<PipelineOutcome> {
        settings.validate()?;

        // Early-exit: background/silent generation never injects.
        if generation_type == GenerationType::Quiet {
            self.clear_prompt(settings).await?;
            return Ok(PipelineOutcome::empty("quiet generation"));
        }

        let chat_messages = self.host.chat_messages().await;
        if chat_messages.len() < settings.protect {
            self.clear_prompt(settings).await?;
            return Ok(PipelineOutcome::empty("below protect threshold"));
        }

        // Step 1: clear the prior slot unconditionally so a silent no-op
        // this turn leaves no stale injection.
        self.clear_prompt(settings).await?;

        let chat_id = self.host.current_chat_id().await;
        let search_ctx = self.build_search_context(&chat_messages, generation_type);

        // Step 2: assemble and activate candidate collections.
        let active = self.active_collections(settings, chat_id.as_deref(), &search_ctx).await?;
        if active.is_empty() {
            return Ok(PipelineOutcome::empty("no active collections"));
        }

        // Step 3: build the query string.
        let query_text = query::build_query_text(&chat_messages, settings.query_depth);
        if query_text.is_empty() {
            return Ok(PipelineOutcome::empty("empty query text"));
        }

        let mut recorder = trace::TraceRecorder::new(
            query_text.clone(),
            active.iter().map(|(id, _)| id.to_string_id()).collect(),
            serde_json::to_value(settings).unwrap_or(serde_json::json!({})),
        );

        // Step 4: per-collection query, overfetch, boost, trim.
        let backend_settings = settings.backend_settings();
        let mut all_chunks: Vec<ScoredChunk> = Vec::new();
        for (collection_id, _meta) in &active {
            let overfetch = overfetch_k(settings.insert);
            match self
            .backend
            .query(&collection_id.to_string_id(), &query_text, overfetch, &backend_settings)
            .await
            {
                Ok(result) => {
                    let mut scored: Vec<ScoredChunk> = result
                    .chunks
                    .into_iter()
                    .map(|c| ScoredChunk::new(c, collection_id.to_string_id()))
                    .collect();
                    for chunk in scored.iter_mut() {
                        apply_keyword_boost(chunk, &query_text);
                    }
                    let trimmed = rerank_and_trim(scored, settings.insert);
                    recorder.record(
                        "vector_search",
                        "query",
                        format!("{} candidates from {}", trimmed.len(), collection_id),
                        serde_json::json!({ "collection": collection_id.to_string_id() }),
                    );
                    for c in &trimmed {
                        recorder.fate(c.hash, "vector_search", Verdict::Passed, None, serde_json::json!({}));
                    }
                    all_chunks.extend(trimmed);
                }
                Err(err) => {
                    recorder.record(
                        "vector_search",
                        "error",
                        format!("collection {collection_id} failed: {err}"),
                        serde_json::json!({ "collection": collection_id.to_string_id() }),
                    );
                }
            }
        }

        // Step 5: merge & cap.
        let merged = rerank_and_trim(all_chunks, settings.insert);
        recorder.snapshot("initial", &merged);
        let source_pool = merged.clone();

        // Step 6: optional rerank.
        let mut working = merged;
        if settings.rerank_enabled {
            let results: Vec<RerankResult> = working
            .iter()
            .enumerate()
            .map(|(i, c)| RerankResult { index: i, score: c.final_score })
            .collect();
            apply_rerank(&mut working, &results, settings.rerank_blend_alpha);
        }
        recorder.snapshot("after_rerank", &working);

        // Step 7: threshold.
        working = self.apply_threshold(working, settings.score_threshold, &mut recorder);
        recorder.snapshot("after_threshold", &working);

        // Step 8: temporal decay, then re-threshold.
        let scenes = search_ctx.scenes.clone();
        for chunk in working.iter_mut() {
            if let Some(meta) = self.metadata.get_chunk_meta(chunk.hash) {
                chunk.temporally_blind = meta.temporally_blind;
            }
            apply_decay(chunk, &settings.temporal_decay, search_ctx.current_message_id, &scenes);
        }
        working = self.apply_threshold(working, settings.score_threshold, &mut recorder);
        recorder.snapshot("after_decay", &working);

        // Groups and links, ahead of the per-chunk conditional filter
        // so a force-included mandatory/hard-linked chunk still gets its
        // own conditions evaluated.
        let groups = self.collection_groups(&active);
        working = groups::apply_groups(working, &groups, &source_pool);
        let links = self.chunk_links(&working);
        working = groups::apply_links(working, &links, &source_pool);

        // Step 9: per-chunk conditional filter.
        working = self.apply_chunk_conditions(working, &search_ctx, &mut recorder);
        recorder.snapshot("after_conditions", &working);

        // Step 10: live-context dedup.
        let live_hashes = query::live_context_hashes(&chat_messages);
        let mut to_inject = Vec::new();
        for chunk in working {
            if live_hashes.contains(&chunk.hash) {
                recorder.fate(
                    chunk.hash,
                    "dedup",
                    Verdict::Skipped,
                    Some("already in context".to_string()),
                    serde_json::json!({}),
                );
            } else {
                to_inject.push(chunk);
            }
        }

        // Step 11: formatting & injection.
        if to_inject.is_empty() {
            self.clear_prompt(settings).await?;
            recorder.set_stat("injected_count", 0);
            let data = recorder.finalize(InjectionRecord::default());
            trace::set_last_search_debug(data);
            return Ok(PipelineOutcome::empty("no chunks survived to injection"));
        }

        recorder.snapshot("injected", &to_inject);
        let body = to_inject
        .iter()
        .map(|c| c.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
        let text = settings.template.replace("{{text}}", &body);
        let text = self.host.substitute_macros(&text).await;

        self.host
        .set_prompt(&self.prompt_tag, &text, settings.position, settings.depth)
        .await?;

        let verified = match self.host.get_prompt(&self.prompt_tag).await? {
            Some(slot) => slot.value == text,
            None => false,
        };
        if !verified {
            tracing::warn!(tag = %self.prompt_tag, "injection verification mismatch");
        }

        for c in &to_inject {
            recorder.fate(c.hash, "inject", Verdict::Injected, None, serde_json::json!({}));
        }

        // Step 12: trace finalize.
        recorder.set_stat("injected_count", to_inject.len());
        recorder.record(
            "pipeline",
            "complete",
            format!("PIPELINE COMPLETE: {} injected", to_inject.len()),
            serde_json::json!({ "injected": to_inject.len() }),
        );
        let injection = InjectionRecord {
            verified,
            text: text.clone(),
            position: settings.position,
            depth: settings.depth,
            char_count: text.chars().count(),
        };
        let data = recorder.finalize(injection);
        trace::set_last_search_debug(data);

        Ok(PipelineOutcome {
                injected: true,
                injected_text: text,
                reason: None,
            })
    }

    async fn clear_prompt(&self, settings: &PipelineSettings) -> Result<()> {
        self.host.set_prompt(&self.prompt_tag, "", settings.position, settings.depth).await
    }

    fn build_search_context(&self, messages: &[ChatMessage], generation_type: GenerationType) -> SearchContext {
        let non_system_count = messages.iter().filter(|m| !m.is_system).count();
        let last_speaker = messages.iter().rev().find(|m| !m.is_system).map(|m| m.name.clone());
        let message_speakers: Vec<String> = messages.iter().map(|m| m.name.clone()).collect();
        let swipe_count = messages.last().map(|m| m.swipes.len()).unwrap_or(0);
        let is_group_chat = message_speakers.iter().filter(|n| !n.is_empty()).collect::<HashSet<_>>().len() > 2;

        SearchContext {
            recent_messages: messages.to_vec(),
            last_speaker,
            message_count: non_system_count,
            message_speakers,
            active_chunks: Vec::new(),
            timestamp: Some(chrono::Utc::now()),
            generation_type: Some(generation_type),
            swipe_count,
            active_lorebook_entries: Vec::new(),
            is_group_chat,
            current_character: None,
            current_message_id: messages.len() as i64,
            scenes: self.scenes_from_messages(messages),
        }
    }

    /// Derive scene boundaries from any ingestion-tagged `isScene` markers
    /// surfaced on the chat's own messages' `extra` field, if the host
    /// forwards them. Absent that, no scenes are known and decay falls
    /// back to plain age.
    fn scenes_from_messages(&self, messages: &[ChatMessage]) -> Vec<Scene> {
        let mut scenes = Vec::new();
        let mut current_start: Option<i64> = None;
        for (idx, m) in messages.iter().enumerate() {
            let is_boundary = m
            .extra
            .get("sceneStart")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
            if is_boundary {
                if let Some(start) = current_start.take() {
                    scenes.push(Scene { start, end: Some(idx as i64 - 1) });
                }
                current_start = Some(idx as i64 + 1);
            }
        }
        if let Some(start) = current_start {
            scenes.push(Scene { start, end: None });
        }
        scenes
    }

    async fn active_collections(
        &self,
        settings: &PipelineSettings,
        chat_id: Option<&str>,
        ctx: &SearchContext,
    ) -> Result<Vec<(CollectionId, CollectionMeta)>> {
        let mut candidates: Vec<(CollectionId, CollectionMeta)> = Vec::new();

        if settings.enabled_chats {
            if let Some(chat_id) = chat_id {
                let id = CollectionId::chat(chat_id);
                let meta = self
                .metadata
                .get_collection_meta(&id.to_string_id(), &id.to_string_id())
                .unwrap_or_else(|| CollectionMeta::new_default("chat", chat_id));
                candidates.push((id, meta));
            }
        }

        for key in self.metadata.registry() {
            if candidates.iter().any(|(id, _)| id.to_string_id() == key) {
                continue;
            }
            let Ok(id) = CollectionId::parse(&key) else { continue };
            if let Some(meta) = self.metadata.get_collection_meta(&key, &key) {
                candidates.push((id, meta));
            }
        }

        let active_tags: Vec<ActiveChunkTag> = Vec::new();
        let mut active = Vec::new();
        for (id, meta) in candidates {
            let reason = is_active(&meta, ctx, &active_tags, None);
            if reason.activated() {
                active.push((id, meta));
            }
        }
        Ok(active)
    }

    fn apply_threshold(
        &self,
        chunks: Vec<ScoredChunk>,
        threshold: f32,
        recorder: &mut trace::TraceRecorder,
    ) -> Vec<ScoredChunk> {
        let (keep, drop): (Vec<_>, Vec<_>) = chunks.into_iter().partition(|c| c.final_score >= threshold);
        for c in drop {
            recorder.fate(
                c.hash,
                "threshold",
                Verdict::Dropped,
                Some("below score threshold".to_string()),
                serde_json::json!({ "score": c.final_score, "threshold": threshold }),
            );
        }
        keep
    }

    fn apply_chunk_conditions(
        &self,
        chunks: Vec<ScoredChunk>,
        ctx: &SearchContext,
        recorder: &mut trace::TraceRecorder,
    ) -> Vec<ScoredChunk> {
        let mut confirmed_hashes: Vec<ContentHash> = Vec::new();
        let mut out = Vec::new();

        for chunk in chunks {
            let chunk_meta = self.metadata.get_chunk_meta(chunk.hash);

            if let Some(meta) = &chunk_meta {
                if meta.disabled {
                    recorder.fate(
                        chunk.hash,
                        "conditions",
                        Verdict::Dropped,
                        Some("scene-disabled".to_string()),
                        serde_json::json!({}),
                    );
                    continue;
                }
            }

            let passes = match chunk_meta.as_ref().and_then(|m| m.conditions.as_ref()) {
                Some(set) if set.has_rules() => {
                    let mut scoped_ctx = ctx.clone();
                    scoped_ctx.active_chunks = confirmed_hashes.clone();
                    conditions::evaluate(set, &scoped_ctx, &[], None)
                }
                _ => true,
            };

            if passes {
                activation_history::record_activation(chunk.hash);
                confirmed_hashes.push(chunk.hash);
                out.push(chunk);
            } else {
                recorder.fate(
                    chunk.hash,
                    "conditions",
                    Verdict::Dropped,
                    Some("chunk conditions failed".to_string()),
                    serde_json::json!({}),
                );
            }
        }

        out
    }

    fn collection_groups(&self, active: &[(CollectionId, CollectionMeta)]) -> Vec<crate::registry::collection::ChunkGroup> {
        active.iter().flat_map(|(_, meta)| meta.groups.clone()).collect()
    }

    fn chunk_links(&self, chunks: &[ScoredChunk]) -> HashMap<ContentHash, Vec<ChunkLink>> {
        let mut links = HashMap::new();
        for chunk in chunks {
            if let Some(meta) = self.metadata.get_chunk_meta(chunk.hash) {
                if !meta.links.is_empty() {
                    links.insert(chunk.hash, meta.links);
                }
            }
        }
        links
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryVectorBackend;
    use crate::hashing::cache::reset_global_cache;
    use crate::host::InMemoryChatHost;
    use crate::registry::metadata_store::InMemoryMetadataStore;
    use crate::types::{Chunk, ChunkMetadata};

    fn msg(text: &str, id: i64) -> ChatMessage {
        let mut extra = HashMap::new();
        extra.insert("messageId".to_string(), serde_json::json!(id));
        ChatMessage {
            mes: text.to_string(),
            name: "Bot".into(),
            is_user: false,
            is_system: false,
            swipes: vec![],
            extra,
        }
    }

    fn chunk(hash: ContentHash, text: &str, message_id: i64) -> Chunk {
        let mut metadata = ChunkMetadata::default();
        metadata.source = "chat".to_string();
        metadata.message_id = Some(message_id);
        Chunk {
            hash,
            text: text.to_string(),
            index: 0,
            metadata,
            score: None,
        }
    }

    #[tokio::test]
    async fn basic_recall_scenario_s1() {
        reset_global_cache();
        let host = Arc::new(
            InMemoryChatHost::new()
            .with_chat_id("u1")
            .with_messages((8..=15).map(|i| msg(&format!("message {i}"), i)).collect()),
        );
        let backend = Arc::new(InMemoryVectorBackend::new());
        backend.seed(
            "vh:chat:u1",
            vec![
                chunk(1, "Aria found the blue key in the garden", 3),
                chunk(2, "They ate dinner silently", 5),
                chunk(3, "The tower was locked", 7),
            ],
        );
        let metadata = Arc::new(InMemoryMetadataStore::new());
        let mut default_meta = CollectionMeta::new_default("chat", "u1");
        default_meta.temporal_decay.enabled = false;
        metadata.set_collection_meta("vh:chat:u1", &default_meta).unwrap();

        let pipeline = RetrievalPipeline::new(host, backend, metadata);
        let mut settings = PipelineSettings::default();
        settings.score_threshold = 0.05;
        settings.insert = 5;
        settings.protect = 4;
        settings.template = "Relevant: {{text}}".to_string();

        let outcome = pipeline.run(&settings, GenerationType::Normal).await.unwrap();
        assert!(outcome.injected);
        assert!(outcome.injected_text.contains("Aria found the blue key"));
    }

    #[tokio::test]
    async fn quiet_generation_never_injects() {
        let host = Arc::new(InMemoryChatHost::new().with_chat_id("u1").with_messages(
                (0..10).map(|i| msg(&format!("m{i}"), i)).collect(),
            ));
        let backend = Arc::new(InMemoryVectorBackend::new());
        let metadata = Arc::new(InMemoryMetadataStore::new());
        let pipeline = RetrievalPipeline::new(host, backend, metadata);
        let settings = PipelineSettings::default();

        let outcome = pipeline.run(&settings, GenerationType::Quiet).await.unwrap();
        assert!(!outcome.injected);
        assert_eq!(outcome.reason.as_deref(), Some("quiet generation"));
    }

    #[tokio::test]
    async fn below_protect_threshold_skips_injection() {
        let host = Arc::new(
            InMemoryChatHost::new()
            .with_chat_id("u1")
            .with_messages(vec![msg("only one", 1)]),
        );
        let backend = Arc::new(InMemoryVectorBackend::new());
        let metadata = Arc::new(InMemoryMetadataStore::new());
        let pipeline = RetrievalPipeline::new(host, backend, metadata);
        let mut settings = PipelineSettings::default();
        settings.protect = 4;

        let outcome = pipeline.run(&settings, GenerationType::Normal).await.unwrap();
        assert!(!outcome.injected);
    }

    #[tokio::test]
    async fn dedup_excludes_chunks_already_in_live_context_s3() {
        reset_global_cache();
        let live_text = "the hero already said this aloud";
        let host = Arc::new(
            InMemoryChatHost::new().with_chat_id("u1").with_messages(
                (0..10)
                .map(|i| msg(if i == 9 { live_text } else { "filler message text" }, i))
                .collect(),
            ),
        );
        let backend = Arc::new(InMemoryVectorBackend::new());
        backend.seed(
            "vh:chat:u1",
            vec![chunk(1, live_text, 2), chunk(2, "a fresh unseen detail to recall", 3)],
        );
        let metadata = Arc::new(InMemoryMetadataStore::new());
        let mut default_meta = CollectionMeta::new_default("chat", "u1");
        default_meta.temporal_decay.enabled = false;
        metadata.set_collection_meta("vh:chat:u1", &default_meta).unwrap();

        let pipeline = RetrievalPipeline::new(host, backend, metadata);
        let mut settings = PipelineSettings::default();
        settings.score_threshold = 0.0;
        settings.protect = 2;

        let outcome = pipeline.run(&settings, GenerationType::Normal).await.unwrap();
        assert!(!outcome.injected_text.contains(live_text));
    }
}
