//! Core data model shared across the retrieval pipeline and sync engine
//!
//! Every retrieval-pipeline stage consumes these types; none of them
//! reach across module boundaries to reconstruct internal state.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A 32-bit content hash. Equality of normalized text implies equality of
/// hash; collisions are treated as identity (semantic dedup is intentional).
pub type ContentHash = u32;

/// A 1-indexed message id within a chat, used as the unit of age for
/// temporal decay.
pub type MessageId = i64;

/// The kind of generation event that triggered a retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationType {
    Normal,
    Swipe,
    Regenerate,
    Continue,
    Impersonate,
    /// Background/silent generation — always an early-exit for the pipeline.
    Quiet,
}

/// A single message in the live chat context, as supplied by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub mes: String,
    pub name: String,
    pub is_user: bool,
    #[serde(default)]
    pub is_system: bool,
    #[serde(default)]
    pub swipes: Vec<String>,
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// A contiguous scene boundary declared by the host, used by scene-aware
/// temporal decay.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Scene {
    pub start: MessageId,
    /// `None` means the scene is still open (extends to +infinity).
    pub end: Option<MessageId>,
}

impl Scene {
    pub fn contains(&self, message_id: MessageId) -> bool {
        message_id >= self.start && self.end.map_or(true, |end| message_id <= end)
    }
}

/// Per-chunk, ingestion-supplied metadata. Sparse: a missing field takes its
/// default. See `Chunk.metadata` description.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// `chat` | `lorebook` | `doc` | ...
    pub source: String,
    /// Present for chat-source chunks.
    pub message_id: Option<MessageId>,
    /// Set when a message was split into multiple chunks.
    pub chunk_index: Option<usize>,
    pub total_chunks: Option<usize>,
    /// Hash of the source message this chunk was split from.
    pub original_message_hash: Option<ContentHash>,
    /// Hashes of the individual messages combined into this chunk, for
    /// `conversation_turns`/`message_batch` grouping.
    pub message_hashes: Vec<ContentHash>,
    /// Keywords attached at ingestion time, consumed by keyword boosting.
    #[serde(default)]
    pub keywords: Vec<Keyword>,
    /// Inclusive/exclusive scoring group this chunk belongs to, if any.
    pub chunk_group: Option<String>,
    pub is_scene: bool,
    pub scene_start: Option<MessageId>,
    pub scene_end: Option<MessageId>,
    pub is_summary: bool,
    pub parent_hash: Option<ContentHash>,
    pub speaker: Option<String>,
    pub is_user: Option<bool>,
    /// Free-form ingestion fields not otherwise modeled.
    #[serde(default)]
    pub extras: HashMap<String, serde_json::Value>,
}

/// A keyword/weight pair attached to a chunk. String-only ingestion
/// entries are normalized to weight 1.5 by `Keyword::from_text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub text: String,
    pub weight: f32,
}

impl Keyword {
    /// Default weight applied to a bare-string keyword entry.
    pub const DEFAULT_WEIGHT: f32 = 1.5;

    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            weight: Self::DEFAULT_WEIGHT,
        }
    }
}

/// A chunk as returned from a vector backend query, before scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub hash: ContentHash,
    pub text: String,
    pub index: usize,
    pub metadata: ChunkMetadata,
    /// Similarity score from the backend, higher is better. `None` for
    /// chunks fetched outside of a query context (e.g. via `listHashes`).
    pub score: Option<f32>,
}

/// A chunk after keyword boosting, carrying the audit trail requires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub collection_id: String,
    pub original_score: f32,
    pub keyword_boost: f32,
    pub matched_keywords: Vec<String>,
    pub matched_keywords_with_weights: Vec<Keyword>,
    pub keyword_boosted: bool,
    /// The score after all stages applied so far; starts as
    /// `original_score * keyword_boost` and is mutated by rerank/decay.
    pub final_score: f32,
    /// Set once scene-aware or plain temporal decay has been applied.
    pub decay_applied: Option<f32>,
    pub temporally_blind: bool,
}

impl ScoredChunk {
    pub fn new(chunk: Chunk, collection_id: impl Into<String>) -> Self {
        let original_score = chunk.score.unwrap_or(0.0);
        Self {
            chunk,
            collection_id: collection_id.into(),
            original_score,
            keyword_boost: 1.0,
            matched_keywords: Vec::new(),
            matched_keywords_with_weights: Vec::new(),
            keyword_boosted: false,
            final_score: original_score,
            decay_applied: None,
            temporally_blind: false,
        }
    }

    pub fn hash(&self) -> ContentHash {
        self.chunk.hash
    }
}

/// Built once per retrieval, consumed by the activation gate and the
/// condition evaluator.
#[derive(Debug, Clone, Default)]
pub struct SearchContext {
    pub recent_messages: Vec<ChatMessage>,
    pub last_speaker: Option<String>,
    pub message_count: usize,
    pub message_speakers: Vec<String>,
    pub active_chunks: Vec<ContentHash>,
    pub timestamp: Option<DateTime<Utc>>,
    pub generation_type: Option<GenerationType>,
    pub swipe_count: usize,
    pub active_lorebook_entries: Vec<LorebookEntryRef>,
    pub is_group_chat: bool,
    pub current_character: Option<String>,
    /// Current message id, used as `currentMessageId` in age
    /// formula.
    pub current_message_id: MessageId,
    /// Scene boundaries known to the host, if any.
    pub scenes: Vec<Scene>,
}

/// Minimal reference to an active lorebook entry, for the `lorebookActive`
/// condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LorebookEntryRef {
    pub key: String,
    pub uid: String,
}

/// One entry in the debug trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    pub stage: String,
    pub phase: String,
    pub message: String,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Terminal outcome of a chunk at a given pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Passed,
    Dropped,
    Skipped,
    Injected,
}

/// A single fate entry for one chunk at one stage. Fates accumulate: a
/// chunk may `Passed` at `vector_search`, `Passed` at `threshold`, then
/// `Dropped` at `decay`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkFate {
    pub stage: String,
    pub verdict: Verdict,
    pub reason: Option<String>,
    pub data: serde_json::Value,
}
