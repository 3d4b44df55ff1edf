//! Debug trace recorder
//!
//! Process-wide state behind `once_cell::sync::Lazy` + `parking_lot::Mutex`,
//! the same pattern used elsewhere in this crate for singletons. Stage
//! entries are snapshots (deep copies at the moment of transition); fate
//! entries accumulate per hash across the whole run.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::Serialize;

use crate::types::{ChunkFate, ContentHash, ScoredChunk, TraceRecord, Verdict};

/// One named snapshot of the result set at a pipeline stage transition.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageSnapshots {
    pub initial: Vec<ScoredChunk>,
    pub after_rerank: Vec<ScoredChunk>,
    pub after_threshold: Vec<ScoredChunk>,
    pub after_decay: Vec<ScoredChunk>,
    pub after_conditions: Vec<ScoredChunk>,
    pub injected: Vec<ScoredChunk>,
}

/// Injection verification outcome.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InjectionRecord {
    pub verified: bool,
    pub text: String,
    pub position: i32,
    pub depth: i32,
    pub char_count: usize,
}

/// The full per-query debug record.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DebugData {
    pub query: String,
    pub collections_queried: Vec<String>,
    pub settings: serde_json::Value,
    pub stages: StageSnapshots,
    pub stats: HashMap<String, serde_json::Value>,
    pub traces: Vec<TraceRecord>,
    pub chunk_fates: HashMap<ContentHash, Vec<ChunkFate>>,
    pub injection: InjectionRecord,
}

/// Accumulates trace records and per-chunk fates across one retrieval run,
/// then finalizes into a publishable `DebugData`.
pub struct TraceRecorder {
    query: String,
    collections_queried: Vec<String>,
    settings: serde_json::Value,
    stages: StageSnapshots,
    stats: HashMap<String, serde_json::Value>,
    traces: Vec<TraceRecord>,
    chunk_fates: HashMap<ContentHash, Vec<ChunkFate>>,
}

impl TraceRecorder {
    pub fn new(query: impl Into<String>, collections_queried: Vec<String>, settings: serde_json::Value) -> Self {
        Self {
            query: query.into(),
            collections_queried,
            settings,
            stages: StageSnapshots::default(),
            stats: HashMap::new(),
            traces: Vec::new(),
            chunk_fates: HashMap::new(),
        }
    }

    pub fn record(&mut self, stage: &str, phase: &str, message: impl Into<String>, data: serde_json::Value) {
        let record = TraceRecord {
            stage: stage.to_string(),
            phase: phase.to_string(),
            message: message.into(),
            data,
            timestamp: chrono::Utc::now(),
        };
        tracing::debug!(stage = %record.stage, phase = %record.phase, message = %record.message, "pipeline trace");
        self.traces.push(record);
    }

    pub fn fate(&mut self, hash: ContentHash, stage: &str, verdict: Verdict, reason: Option<String>, data: serde_json::Value) {
        self.chunk_fates.entry(hash).or_default().push(ChunkFate {
                stage: stage.to_string(),
                verdict,
                reason,
                data,
            });
    }

    pub fn snapshot(&mut self, stage: &str, chunks: &[ScoredChunk]) {
        let snapshot = chunks.to_vec();
        match stage {
            "initial" => self.stages.initial = snapshot,
            "after_rerank" => self.stages.after_rerank = snapshot,
            "after_threshold" => self.stages.after_threshold = snapshot,
            "after_decay" => self.stages.after_decay = snapshot,
            "after_conditions" => self.stages.after_conditions = snapshot,
            "injected" => self.stages.injected = snapshot,
            other => tracing::warn!(stage = other, "unknown trace stage, snapshot dropped"),
        }
    }

    pub fn set_stat(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.stats.insert(key.into(), value.into());
    }

    pub fn finalize(self, injection: InjectionRecord) -> DebugData {
        DebugData {
            query: self.query,
            collections_queried: self.collections_queried,
            settings: self.settings,
            stages: self.stages,
            stats: self.stats,
            traces: self.traces,
            chunk_fates: self.chunk_fates,
            injection,
        }
    }
}

static LAST_TRACE: Lazy<Mutex<Option<DebugData>>> = Lazy::new(|| Mutex::new(None));

/// Publish the most recent trace for the host's debug UI. Older traces
/// are discarded — only the single most recent run is ever kept.
pub fn set_last_search_debug(data: DebugData) {
    *LAST_TRACE.lock() = Some(data);
}

pub fn last_search_debug() -> Option<DebugData> {
    LAST_TRACE.lock().clone()
}

/// Test-only reset of the published trace slot.
pub fn reset_last_search_debug() {
    *LAST_TRACE.lock() = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, ChunkMetadata};

    fn chunk(hash: ContentHash) -> ScoredChunk {
        let c = Chunk {
            hash,
            text: "t".into(),
            index: 0,
            metadata: ChunkMetadata::default(),
            score: Some(0.5),
        };
        ScoredChunk::new(c, "vh:chat:u1")
    }

    #[test]
    fn fates_accumulate_across_stages() {
        let mut rec = TraceRecorder::new("query", vec!["vh:chat:u1".into()], serde_json::json!({}));
        rec.fate(1, "vector_search", Verdict::Passed, None, serde_json::json!({}));
        rec.fate(1, "threshold", Verdict::Passed, None, serde_json::json!({}));
        rec.fate(1, "decay", Verdict::Dropped, Some("below threshold".into()), serde_json::json!({"score": 0.1}));

        let data = rec.finalize(InjectionRecord::default());
        assert_eq!(data.chunk_fates[&1].len(), 3);
        assert_eq!(data.chunk_fates[&1][2].verdict, Verdict::Dropped);
    }

    #[test]
    fn snapshots_are_independent_deep_copies() {
        let mut rec = TraceRecorder::new("q", vec![], serde_json::json!({}));
        let mut chunks = vec![chunk(1)];
        rec.snapshot("initial", &chunks);
        chunks[0].final_score = 999.0;

        let data = rec.finalize(InjectionRecord::default());
        assert_eq!(data.stages.initial[0].final_score, 0.5);
    }

    #[test]
    fn publish_and_read_last_trace() {
        reset_last_search_debug();
        assert!(last_search_debug().is_none());
        let rec = TraceRecorder::new("q", vec![], serde_json::json!({}));
        set_last_search_debug(rec.finalize(InjectionRecord::default()));
        assert!(last_search_debug().is_some());
    }
}
