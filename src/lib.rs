//! Retrieval-augmented context injection pipeline for a conversational LLM
//! host: collection activation, keyword-boosted per-collection vector
//! search, multi-stage score transformation (rerank, threshold, temporal
//! decay, conditional filtering), cross-collection merging, live-context
//! dedup, a traced debug record, and an incremental chat-collection sync
//! engine.

pub mod activation;
pub mod backend;
pub mod conditions;
pub mod error;
pub mod hashing;
pub mod host;
pub mod pipeline;
pub mod registry;
pub mod scoring;
pub mod sync;
pub mod types;

pub use error::{Result, VhError};
pub use pipeline::{PipelineOutcome, PipelineSettings, RetrievalPipeline};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
