//! Collection registry discovery
//!
//! On startup (and on demand) a plugin-assisted sweep replaces the
//! registry with ground truth: stale entries removed, new entries added.
//! When no such collaborator is available, a fallback probes a handful of
//! heuristically derived ids per collection type.

use async_trait::async_trait;

use crate::error::Result;
use crate::registry::metadata_store::MetadataStore;

/// A collaborator capable of sweeping all known storage locations for
/// collection ids. Implemented by whatever owns the vector backend's
/// storage directories/buckets; absence falls back to `fallback_probe`.
#[async_trait]
pub trait DiscoveryProvider: Send + Sync {
    async fn discover(&self) -> Result<Vec<String>>;
}

/// The outcome of a registry reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

/// Replace the registry with `discovered`, reporting the delta.
pub fn reconcile_registry(store: &dyn MetadataStore, discovered: Vec<String>) -> ReconcileReport {
    let existing = store.registry();
    let added: Vec<String> = discovered
    .iter()
    .filter(|k| !existing.contains(k))
    .cloned()
    .collect();
    let removed: Vec<String> = existing
    .iter()
    .filter(|k| !discovered.contains(k))
    .cloned()
    .collect();

    store.set_registry(discovered);
    ReconcileReport { added, removed }
}

/// Run a full discovery sweep, falling back to heuristic probing if no
/// `DiscoveryProvider` is available.
pub async fn sweep(
    store: &dyn MetadataStore,
    provider: Option<&dyn DiscoveryProvider>,
    known_chat_ids: &[String],
) -> Result<ReconcileReport> {
    let discovered = match provider {
        Some(p) => p.discover().await?,
        None => fallback_probe(known_chat_ids),
    };
    Ok(reconcile_registry(store, discovered))
}

/// Heuristically derive the collection ids most likely to exist for the
/// chat ids the host currently knows about, when plugin-assisted discovery
/// is unavailable.
pub fn fallback_probe(known_chat_ids: &[String]) -> Vec<String> {
    known_chat_ids
    .iter()
    .map(|id| format!("vh:chat:{id}"))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::metadata_store::InMemoryMetadataStore;

    #[test]
    fn fallback_probe_derives_chat_collection_ids() {
        let ids = fallback_probe(&["u1".to_string(), "u2".to_string()]);
        assert_eq!(ids, vec!["vh:chat:u1".to_string(), "vh:chat:u2".to_string()]);
    }

    #[test]
    fn reconcile_reports_added_and_removed() {
        let store = InMemoryMetadataStore::new();
        store.set_registry(vec!["vh:chat:stale".to_string(), "vh:chat:keep".to_string()]);

        let report = reconcile_registry(
            &store,
            vec!["vh:chat:keep".to_string(), "vh:chat:fresh".to_string()],
        );

        assert_eq!(report.added, vec!["vh:chat:fresh".to_string()]);
        assert_eq!(report.removed, vec!["vh:chat:stale".to_string()]);
        assert_eq!(
            store.registry(),
            vec!["vh:chat:keep".to_string(), "vh:chat:fresh".to_string()]
        );
    }

    #[tokio::test]
    async fn sweep_without_provider_uses_fallback() {
        let store = InMemoryMetadataStore::new();
        let report = sweep(&store, None, &["abc".to_string()]).await.unwrap();
        assert_eq!(report.added, vec!["vh:chat:abc".to_string()]);
    }
}
