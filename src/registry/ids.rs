//! Collection ID grammar
//!
//! ```text
//! collection_id:= "vh:" type ":" source_id
//! type:= "chat" | "lorebook" | "doc" | identifier
//! source_id:= any non-empty string; may contain ":"
//! registry_key:= provider ":" collection_id -- when disambiguation needed
//! ```
//!
//! Legacy forms (`vecthare_chat_{chatId}`, `carrotkernel_char_{name}`,
//! `ragbooks_lorebook_{…}`) are recognized read-only for migration.

use crate::error::{Result, VhError};

/// A parsed `vh:{type}:{sourceId}` collection id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionId {
    pub kind: String,
    pub source_id: String,
}

impl CollectionId {
    pub fn new(kind: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            source_id: source_id.into(),
        }
    }

    /// Parse `vh:{type}:{sourceId}`. `source_id` may itself contain `:`,
    /// so only the first two colons are structural.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut parts = raw.splitn(3, ':');
        let prefix = parts
        .next()
        .ok_or_else(|| VhError::InvalidCollectionId(raw.to_string()))?;
        if prefix != "vh" {
            return Err(VhError::InvalidCollectionId(format!(
                        "missing 'vh:' prefix: {raw}"
                    )));
        }
        let kind = parts
        .next()
        .ok_or_else(|| VhError::InvalidCollectionId(raw.to_string()))?;
        let source_id = parts
        .next()
        .ok_or_else(|| VhError::InvalidCollectionId(raw.to_string()))?;
        if kind.is_empty() || source_id.is_empty() {
            return Err(VhError::InvalidCollectionId(raw.to_string()));
        }
        Ok(Self {
                kind: kind.to_string(),
                source_id: source_id.to_string(),
            })
    }

    pub fn to_string_id(&self) -> String {
        format!("vh:{}:{}", self.kind, self.source_id)
    }

    pub fn chat(chat_id: impl Into<String>) -> Self {
        Self::new("chat", chat_id)
    }

    pub fn lorebook(uid: impl Into<String>) -> Self {
        Self::new("lorebook", uid)
    }

    pub fn doc(id: impl Into<String>) -> Self {
        Self::new("doc", id)
    }
}

impl std::fmt::Display for CollectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_string_id())
    }
}

/// `{provider}:{collectionId}` — used when the same collection id may exist
/// under different embedding providers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistryKey {
    pub provider: String,
    pub collection_id: CollectionId,
}

impl RegistryKey {
    pub fn new(provider: impl Into<String>, collection_id: CollectionId) -> Self {
        Self {
            provider: provider.into(),
            collection_id,
        }
    }

    /// Parse `{provider}:vh:{type}:{sourceId}`.
    pub fn parse(raw: &str) -> Result<Self> {
        let Some(idx) = raw.find(":vh:") else {
            return Err(VhError::InvalidCollectionId(format!(
                        "not a registry key: {raw}"
                    )));
        };
        let provider = &raw[..idx];
        let collection_id = CollectionId::parse(&raw[idx + 1..])?;
        Ok(Self {
                provider: provider.to_string(),
                collection_id,
            })
    }

    pub fn to_string_key(&self) -> String {
        format!("{}:{}", self.provider, self.collection_id)
    }
}

impl std::fmt::Display for RegistryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_string_key())
    }
}

/// Recognize (read-only) one of the three legacy id forms predating the
/// `vh:{type}:{sourceId}` grammar, translating it into the modern shape for
/// migration/discovery purposes. Returns `None` if `raw` matches none.
pub fn recognize_legacy(raw: &str) -> Option<CollectionId> {
    if let Some(chat_id) = raw.strip_prefix("vecthare_chat_") {
        return Some(CollectionId::chat(chat_id));
    }
    if let Some(name) = raw.strip_prefix("carrotkernel_char_") {
        return Some(CollectionId::new("doc", format!("char:{name}")));
    }
    if let Some(uid) = raw.strip_prefix("ragbooks_lorebook_") {
        return Some(CollectionId::lorebook(uid));
    }
    None
}
