//! Key-value metadata store abstraction
//!
//! A `Send + Sync` trait-first seam with a documented principles block,
//! backed by `dashmap` wherever a shared map needs concurrent access
//! without hand-rolled locking.

use std::collections::HashSet;

use dashmap::DashMap;
use serde_json::Value;

use crate::error::{Result, VhError};
use crate::registry::collection::{ChunkMeta, CollectionMeta};
use crate::types::ContentHash;

/// Per-chunk metadata key prefix, persisted-state layout.
pub const CHUNK_META_PREFIX: &str = "vecthare_chunk_meta_";
const COLLECTIONS_KEY: &str = "collections";
const REGISTRY_KEY: &str = "collection_registry";

/// Legacy scattered-key prefixes predating the nested `collections[id]`
/// layout. Detected and rewritten on first run.
const LEGACY_ENABLED_PREFIX: &str = "vh_scattered_enabled_";
const LEGACY_ALWAYS_ACTIVE_PREFIX: &str = "vh_scattered_always_active_";
const LEGACY_DISPLAY_NAME_PREFIX: &str = "vh_scattered_display_name_";

/// Arbitrary key-value metadata store. All methods are synchronous
/// and infallible at the storage layer; `Result` is reserved for
/// (de)serialization failures.
///
/// # Design Principles
///
/// 1. **Dirty reads are tolerated**: only defaults apply when a
/// write is in flight, so no read-modify-write locking is required here.
/// 2. **Nested layout**: collections live under one `"collections"` JSON
/// object keyed by registry key or plain collection id; chunk metadata
/// is flat, one entry per `vecthare_chunk_meta_{hash}` key.
/// 3. **Migration is part of the contract**: `migrate_legacy_layout` must
/// be idempotent and safe to call on every startup.
pub trait MetadataStore: Send + Sync {
    fn get_raw(&self, key: &str) -> Option<Value>;
    fn set_raw(&self, key: &str, value: Value);
    fn remove_raw(&self, key: &str);
    fn raw_keys(&self) -> Vec<String>;

    /// Look up collection metadata, preferring `registry_key` and falling
    /// back to the plain `collection_id`.
    fn get_collection_meta(&self, registry_key: &str, collection_id: &str) -> Option<CollectionMeta> {
        let collections = self.get_raw(COLLECTIONS_KEY)?;
        let obj = collections.as_object()?;
        obj.get(registry_key)
        .or_else(|| obj.get(collection_id))
        .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    fn set_collection_meta(&self, key: &str, meta: &CollectionMeta) -> Result<()> {
        let mut collections = self
        .get_raw(COLLECTIONS_KEY)
        .unwrap_or_else(|| Value::Object(Default::default()));
        let obj = collections
        .as_object_mut()
        .ok_or_else(|| VhError::Internal("collections value is not an object".into()))?;
        obj.insert(key.to_string(), serde_json::to_value(meta)?);
        self.set_raw(COLLECTIONS_KEY, collections);
        Ok(())
    }

    fn get_chunk_meta(&self, hash: ContentHash) -> Option<ChunkMeta> {
        self.get_raw(&format!("{CHUNK_META_PREFIX}{hash}"))
        .and_then(|v| serde_json::from_value(v).ok())
    }

    fn set_chunk_meta(&self, hash: ContentHash, meta: &ChunkMeta) -> Result<()> {
        self.set_raw(&format!("{CHUNK_META_PREFIX}{hash}"), serde_json::to_value(meta)?);
        Ok(())
    }

    fn registry(&self) -> Vec<String> {
        self.get_raw(REGISTRY_KEY)
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
    }

    fn set_registry(&self, keys: Vec<String>) {
        self.set_raw(REGISTRY_KEY, serde_json::to_value(keys).unwrap_or(Value::Array(vec![])));
    }

    fn add_to_registry(&self, key: String) {
        let mut reg = self.registry();
        if !reg.contains(&key) {
            reg.push(key);
            self.set_registry(reg);
        }
    }

    fn remove_from_registry(&self, key: &str) {
        let reg: Vec<String> = self.registry().into_iter().filter(|k| k != key).collect();
        self.set_registry(reg);
    }

    /// Detect the pre-nested scattered-key layout and rewrite it into the
    /// `collections[id]` layout. Idempotent: a second call is a no-op
    /// because the scattered keys are removed as they're consumed.
    fn migrate_legacy_layout(&self) -> Result<usize> {
        let mut migrated = 0usize;
        let legacy_ids: Vec<String> = self
        .raw_keys()
        .into_iter()
        .filter_map(|k| k.strip_prefix(LEGACY_ENABLED_PREFIX).map(str::to_string()))
        .collect();

        for id in legacy_ids {
            let enabled_key = format!("{LEGACY_ENABLED_PREFIX}{id}");
            let always_active_key = format!("{LEGACY_ALWAYS_ACTIVE_PREFIX}{id}");
            let display_name_key = format!("{LEGACY_DISPLAY_NAME_PREFIX}{id}");

            let mut meta = self
            .get_collection_meta(&id, &id)
            .unwrap_or_else(|| CollectionMeta::new_default("chat", &id));

            if let Some(v) = self.get_raw(&enabled_key).and_then(|v| v.as_bool()) {
                meta.enabled = v;
            }
            if let Some(v) = self.get_raw(&always_active_key).and_then(|v| v.as_bool()) {
                meta.always_active = v;
            }
            if let Some(v) = self.get_raw(&display_name_key).and_then(|v| v.as_str().map(str::to_string)) {
                meta.display_name = v;
            }

            self.set_collection_meta(&id, &meta)?;
            self.remove_raw(&enabled_key);
            self.remove_raw(&always_active_key);
            self.remove_raw(&display_name_key);
            migrated += 1;
        }

        Ok(migrated)
    }

    /// Remove `ChunkMeta` entries with no corresponding hash in the
    /// backend's current set.
    fn reclaim_orphans(&self, known_hashes: &HashSet<ContentHash>) -> usize {
        let mut reclaimed = 0usize;
        for key in self.raw_keys() {
            let Some(hash_str) = key.strip_prefix(CHUNK_META_PREFIX) else {
                continue;
            };
            let Ok(hash) = hash_str.parse::<ContentHash>() else {
                continue;
            };
            if !known_hashes.contains(&hash) {
                self.remove_raw(&key);
                reclaimed += 1;
            }
        }
        reclaimed
    }
}

/// `dashmap`-backed in-memory implementation, used by tests, the demo
/// binary, and as the reference shape for a persisted implementation.
#[derive(Default)]
pub struct InMemoryMetadataStore {
    raw: DashMap<String, Value>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn get_raw(&self, key: &str) -> Option<Value> {
        self.raw.get(key).map(|v| v.clone())
    }

    fn set_raw(&self, key: &str, value: Value) {
        self.raw.insert(key.to_string(), value);
    }

    fn remove_raw(&self, key: &str) {
        self.raw.remove(key);
    }

    fn raw_keys(&self) -> Vec<String> {
        self.raw.iter().map(|e| e.key.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_meta_round_trips() {
        let store = InMemoryMetadataStore::new();
        let meta = CollectionMeta::new_default("chat", "Test Chat");
        store.set_collection_meta("vh:chat:u1", &meta).unwrap();
        let read = store.get_collection_meta("vh:chat:u1", "vh:chat:u1").unwrap();
        assert_eq!(read.display_name, "Test Chat");
    }

    #[test]
    fn registry_key_takes_precedence_over_plain_id() {
        let store = InMemoryMetadataStore::new();
        let mut meta = CollectionMeta::new_default("chat", "By Registry Key");
        store.set_collection_meta("openai:vh:chat:u1", &meta).unwrap();
        meta.display_name = "By Plain Id".into();
        store.set_collection_meta("vh:chat:u1", &meta).unwrap();

        let read = store
        .get_collection_meta("openai:vh:chat:u1", "vh:chat:u1")
        .unwrap();
        assert_eq!(read.display_name, "By Registry Key");
    }

    #[test]
    fn chunk_meta_round_trips() {
        let store = InMemoryMetadataStore::new();
        let mut meta = ChunkMeta::default();
        meta.temporally_blind = true;
        store.set_chunk_meta(42, &meta).unwrap();
        assert!(store.get_chunk_meta(42).unwrap().temporally_blind);
        assert!(store.get_chunk_meta(99).is_none());
    }

    #[test]
    fn registry_add_remove() {
        let store = InMemoryMetadataStore::new();
        store.add_to_registry("vh:chat:u1".into());
        store.add_to_registry("vh:chat:u1".into()); // idempotent
        assert_eq!(store.registry(), vec!["vh:chat:u1".to_string()]);
        store.remove_from_registry("vh:chat:u1");
        assert!(store.registry().is_empty());
    }

    #[test]
    fn legacy_layout_migrates_into_nested_collections() {
        let store = InMemoryMetadataStore::new();
        store.set_raw("vh_scattered_enabled_vh:chat:u1", Value::Bool(true));
        store.set_raw("vh_scattered_always_active_vh:chat:u1", Value::Bool(true));
        store.set_raw(
            "vh_scattered_display_name_vh:chat:u1",
            Value::String("Legacy Chat".into()),
        );

        let migrated = store.migrate_legacy_layout().unwrap();
        assert_eq!(migrated, 1);

        let meta = store.get_collection_meta("vh:chat:u1", "vh:chat:u1").unwrap();
        assert!(meta.enabled);
        assert!(meta.always_active);
        assert_eq!(meta.display_name, "Legacy Chat");

        assert!(store.get_raw("vh_scattered_enabled_vh:chat:u1").is_none());
        // second call is a no-op
        assert_eq!(store.migrate_legacy_layout().unwrap(), 0);
    }

    #[test]
    fn orphan_chunk_meta_is_reclaimed() {
        let store = InMemoryMetadataStore::new();
        store.set_chunk_meta(1, &ChunkMeta::default()).unwrap();
        store.set_chunk_meta(2, &ChunkMeta::default()).unwrap();

        let known: HashSet<ContentHash> = [1].into_iter().collect();
        let reclaimed = store.reclaim_orphans(&known);
        assert_eq!(reclaimed, 1);
        assert!(store.get_chunk_meta(1).is_some());
        assert!(store.get_chunk_meta(2).is_none());
    }
}
