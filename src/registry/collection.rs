//! Per-collection and per-chunk metadata

use serde::{Deserialize, Serialize};

use crate::conditions::ConditionSet;
use crate::scoring::decay::DecayConfig;
use crate::types::ContentHash;

/// `any` = a single matching trigger activates the collection; `all` =
/// every configured trigger must match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerMatchMode {
    Any,
    All,
}

/// How a chunk-group's members compose into the final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupMode {
    /// All members may appear; a soft boost is distributed across them.
    Inclusive,
    /// Only the single best-scoring member survives.
    Exclusive,
}

/// A scoring group a chunk can belong to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkGroup {
    pub id: String,
    pub mode: GroupMode,
    /// For exclusive groups: a member hash that must be force-included if
    /// no member of the group is otherwise present in the result set.
    pub mandatory_member: Option<ContentHash>,
    /// Additive boost applied to each inclusive-group member once any
    /// member of the group is present.
    pub boost: f32,
}

/// Per-collection metadata stored in the metadata store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionMeta {
    pub enabled: bool,
    pub auto_sync: bool,
    pub display_name: String,
    pub scope: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_used: Option<chrono::DateTime<chrono::Utc>>,
    pub query_count: u64,

    pub always_active: bool,
    pub triggers: Vec<String>,
    pub trigger_match_mode: TriggerMatchMode,
    pub trigger_case_sensitive: bool,
    pub trigger_scan_depth: usize,

    pub conditions: ConditionSet,
    pub temporal_decay: DecayConfig,
    pub groups: Vec<ChunkGroup>,
    pub context: Option<String>,
    pub xml_tag: Option<String>,
}

impl CollectionMeta {
    /// A freshly registered collection of kind `kind`.
    pub fn new_default(kind: &str, display_name: impl Into<String>) -> Self {
        Self {
            enabled: true,
            auto_sync: kind == "chat",
            display_name: display_name.into(),
            scope: kind.to_string(),
            created_at: chrono::Utc::now(),
            last_used: None,
            query_count: 0,
            always_active: false,
            triggers: Vec::new(),
            trigger_match_mode: TriggerMatchMode::Any,
            trigger_case_sensitive: false,
            trigger_scan_depth: 10,
            conditions: ConditionSet::default(),
            temporal_decay: if kind == "chat" {
                DecayConfig::chat_default()
            } else {
                DecayConfig::disabled()
            },
            groups: Vec::new(),
            context: None,
            xml_tag: None,
        }
    }
}

/// Per-chunk metadata, keyed by hash.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkMeta {
    pub conditions: Option<ConditionSet>,
    pub temporally_blind: bool,
    pub keywords: Vec<crate::types::Keyword>,
    pub links: Vec<ChunkLink>,
    pub disabled: bool,
    pub is_summary: bool,
    pub parent_hash: Option<ContentHash>,
    pub scene_id: Option<String>,
    pub context: Option<String>,
    pub xml_tag: Option<String>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// One edge in a chunk-link graph. Links are
/// directed but the underlying graph may be cyclic (A↔B soft links); the
/// BFS walk in `pipeline::groups` carries its own `visited` guard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkLink {
    pub target: ContentHash,
    pub link_type: LinkType,
    pub weight: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    /// A present source chunk nudges the target's score upward.
    Soft,
    /// A present source chunk forces the target to be included.
    Hard,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_collections_default_to_scene_aware_decay() {
        let meta = CollectionMeta::new_default("chat", "My Chat");
        assert!(meta.temporal_decay.enabled);
        assert!(meta.temporal_decay.scene_aware);
    }

    #[test]
    fn non_chat_collections_default_to_decay_disabled() {
        let meta = CollectionMeta::new_default("lorebook", "My Lorebook");
        assert!(!meta.temporal_decay.enabled);
    }

    #[test]
    fn chunk_meta_defaults_are_permissive() {
        let meta = ChunkMeta::default();
        assert!(!meta.temporally_blind);
        assert!(!meta.disabled);
        assert!(meta.conditions.is_none());
    }
}
