//! Score transformation stages
//!
//! Keyword boosting, temporal decay, and rerank integration each operate on
//! `ScoredChunk`s in place and are composed by `pipeline::RetrievalPipeline`
//! in the strict stage order requires.

pub mod decay;
pub mod keyword_boost;
pub mod rerank;

pub use decay::{apply_decay, decay_multiplier, effective_age, DecayConfig, DecayMode};
pub use keyword_boost::{apply_keyword_boost, overfetch_k, rerank_and_trim};
pub use rerank::{apply_rerank, RerankResult};
