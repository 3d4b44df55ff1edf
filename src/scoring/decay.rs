//! Temporal decay, with scene-aware age reset and blind-chunk immunity
//!
//! Exponential decay follows the usual half-life recency curve
//! (`0.5_f32.powf(age / half_life)`), measured in message-id distance
//! rather than wall-clock time, with a `min_relevance` floor and a
//! linear alternative for callers who want a gentler falloff.

use serde::{Deserialize, Serialize};

use crate::types::{MessageId, Scene, ScoredChunk};

/// Decay curve shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecayMode {
    Exponential,
    Linear,
}

/// Per-collection temporal decay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecayConfig {
    pub enabled: bool,
    pub mode: DecayMode,
    pub half_life: f32,
    pub linear_rate: f32,
    pub min_relevance: f32,
    pub scene_aware: bool,
}

impl DecayConfig {
    /// Default policy for `chat`-source collections: enabled, scene-aware.
    pub fn chat_default() -> Self {
        Self {
            enabled: true,
            mode: DecayMode::Exponential,
            half_life: 20.0,
            linear_rate: 0.02,
            min_relevance: 0.3,
            scene_aware: true,
        }
    }

    /// Default policy for any non-chat collection: disabled.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            mode: DecayMode::Exponential,
            half_life: 20.0,
            linear_rate: 0.02,
            min_relevance: 0.3,
            scene_aware: false,
        }
    }
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Compute the decay multiplier for an age of `a` messages,
/// two curve modes. Always within `[min_relevance, 1]`, bounds law.
pub fn decay_multiplier(config: &DecayConfig, age: f32) -> f32 {
    let raw = match config.mode {
        DecayMode::Exponential => 0.5_f32.powf(age / config.half_life),
        DecayMode::Linear => 1.0 - age * config.linear_rate,
    };
    raw.max(config.min_relevance).min(1.0)
}

/// Effective age for scene-aware decay:
/// - same scene as current → plain message-id distance
/// - different scene → distance from the chunk's scene start to current
/// - no scene info → plain distance
pub fn effective_age(
    current_message_id: MessageId,
    chunk_message_id: MessageId,
    scenes: &[Scene],
) -> f32 {
    let current_scene = scenes.iter().find(|s| s.contains(current_message_id));
    let chunk_scene = scenes.iter().find(|s| s.contains(chunk_message_id));

    match (current_scene, chunk_scene) {
        (Some(cur), Some(chunk)) if std::ptr::eq(cur, chunk) => {
            (current_message_id - chunk_message_id) as f32
        }
        (Some(_), Some(chunk)) => (current_message_id - chunk.start) as f32,
        _ => (current_message_id - chunk_message_id) as f32,
    }
}

/// Apply temporal decay to one chunk in place. No-op (but flagged) for
/// chunks marked `temporally_blind`; no-op for non-chat-source chunks,
/// since they have no meaningful age.
pub fn apply_decay(
    chunk: &mut ScoredChunk,
    config: &DecayConfig,
    current_message_id: MessageId,
    scenes: &[Scene],
) {
    if !config.enabled || chunk.temporally_blind {
        return;
    }

    let Some(chunk_message_id) = chunk.chunk.metadata.message_id else {
        return;
    };

    let age = if config.scene_aware && !scenes.is_empty() {
        effective_age(current_message_id, chunk_message_id, scenes)
    } else {
        (current_message_id - chunk_message_id) as f32
    };

    let multiplier = decay_multiplier(config, age);
    chunk.final_score *= multiplier;
    chunk.decay_applied = Some(multiplier);
}
