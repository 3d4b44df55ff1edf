//! The `settings` record — every tunable the host supplies to a
//! retrieval or sync run.
//!
//! One field per tunable, literal constants, a doc comment per field.
//! The defaults below are the literal values the end-to-end scenarios
//! exercise.

use serde::{Deserialize, Serialize};

use crate::backend::BackendSettings;
use crate::hashing::splitter::{GroupingStrategy, SPLIT_THRESHOLD};
use crate::scoring::decay::DecayConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Embedding provider id.
    pub source: String,
    pub model: Option<String>,
    /// Storage selector (qdrant/chroma/..).
    pub vector_backend: Option<String>,
    /// Whether the current chat's own collection participates at all.
    pub enabled_chats: bool,
    /// How many of the most recent non-system messages build the query
    /// string.
    pub query_depth: usize,
    /// Top-K kept per collection and after the cross-collection merge.
    pub insert: usize,
    pub score_threshold: f32,
    /// Minimum live messages before a retrieval is attempted at all.
    pub protect: usize,
    /// Must contain the literal token `{{text}}`.
    pub template: String,
    pub position: i32,
    pub depth: i32,
    pub chunking_strategy: GroupingStrategy,
    /// Sync engine's per-call batch size.
    pub batch_size: usize,
    /// Chat ingestion splits any message combination past this length.
    pub message_chunk_size: usize,
    /// Whether the optional rerank stage runs at all.
    #[serde(alias = "bananabread_rerank")]
    pub rerank_enabled: bool,
    /// `None` fully overwrites the similarity score with the rerank score;
    /// `Some(a)` blends `a*rerank + (1-a)*previous`.
    pub rerank_blend_alpha: Option<f32>,
    pub temporal_decay: DecayConfig,
    pub api_url_custom: Option<String>,
    pub use_alt_endpoint: bool,
    pub alt_endpoint_url: Option<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            source: "openai".to_string(),
            model: None,
            vector_backend: None,
            enabled_chats: true,
            query_depth: 10,
            insert: 5,
            score_threshold: 0.25,
            protect: 4,
            template: "{{text}}".to_string(),
            position: 0,
            depth: 4,
            chunking_strategy: GroupingStrategy::PerMessage,
            batch_size: 10,
            message_chunk_size: SPLIT_THRESHOLD,
            rerank_enabled: false,
            rerank_blend_alpha: None,
            temporal_decay: DecayConfig::chat_default(),
            api_url_custom: None,
            use_alt_endpoint: false,
            alt_endpoint_url: None,
        }
    }
}

impl PipelineSettings {
    /// The subset of fields the vector backend actually needs to route a
    /// call.
    pub fn backend_settings(&self) -> BackendSettings {
        BackendSettings {
            source: self.source.clone(),
            model: self.model.clone(),
            vector_backend: self.vector_backend.clone(),
            api_url_custom: self.api_url_custom.clone(),
            use_alt_endpoint: self.use_alt_endpoint,
            alt_endpoint_url: self.alt_endpoint_url.clone(),
        }
    }

    /// Whether `template` satisfies contract.
    pub fn validate(&self) -> crate::error::Result<()> {
        if !self.template.contains("{{text}}") {
            return Err(crate::error::VhError::Internal(
                    "template is missing the {{text}} token".to_string(),
                ));
        }
        Ok(())
    }
}
