//! Collection registry & metadata

pub mod collection;
pub mod discovery;
pub mod ids;
pub mod metadata_store;

pub use collection::{ChunkGroup, ChunkLink, ChunkMeta, CollectionMeta, GroupMode, LinkType, TriggerMatchMode};
pub use discovery::{fallback_probe, reconcile_registry, sweep, DiscoveryProvider, ReconcileReport};
pub use ids::{recognize_legacy, CollectionId, RegistryKey};
pub use metadata_store::{InMemoryMetadataStore, MetadataStore};
