//! Optional rerank score integration
//!
//! Full overwrite of the similarity score with the rerank output is the
//! default, but a blend knob (`rerank_blend_alpha`) is exposed for callers
//! who want to retain some weight on the original similarity score.

use crate::types::ScoredChunk;

/// One `(index, score)` pair as returned by a rerank endpoint, positional
/// against the input batch.
#[derive(Debug, Clone, Copy)]
pub struct RerankResult {
    pub index: usize,
    pub score: f32,
}

/// Apply rerank results to `chunks` in place.
///
/// - `alpha = None` fully replaces `final_score` with the rerank score.
/// - `alpha = Some(a)` blends: `final_score = a * rerank + (1 - a) * previous`.
pub fn apply_rerank(chunks: &mut [ScoredChunk], results: &[RerankResult], alpha: Option<f32>) {
    for r in results {
        let Some(chunk) = chunks.get_mut(r.index) else {
            continue;
        };
        chunk.final_score = match alpha {
            None => r.score,
            Some(a) => a * r.score + (1.0 - a) * chunk.final_score,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, ChunkMetadata};

    fn chunk(score: f32) -> ScoredChunk {
        let c = Chunk {
            hash: 1,
            text: "t".into(),
            index: 0,
            metadata: ChunkMetadata::default(),
            score: Some(score),
        };
        let mut sc = ScoredChunk::new(c, "vh:chat:u1");
        sc.final_score = score;
        sc
    }

    #[test]
    fn full_overwrite_by_default() {
        let mut chunks = vec![chunk(0.3), chunk(0.9)];
        let results = vec![
            RerankResult { index: 0, score: 0.95 },
            RerankResult { index: 1, score: 0.10 },
        ];
        apply_rerank(&mut chunks, &results, None);
        assert_eq!(chunks[0].final_score, 0.95);
        assert_eq!(chunks[1].final_score, 0.10);
    }

    #[test]
    fn blend_combines_previous_and_rerank_scores() {
        let mut chunks = vec![chunk(0.4)];
        let results = vec![RerankResult { index: 0, score: 1.0 }];
        apply_rerank(&mut chunks, &results, Some(0.5));
        assert!((chunks[0].final_score - 0.7).abs() < 1e-6);
    }

    #[test]
    fn out_of_range_index_is_ignored() {
        let mut chunks = vec![chunk(0.4)];
        let results = vec![RerankResult { index: 5, score: 1.0 }];
        apply_rerank(&mut chunks, &results, None);
        assert_eq!(chunks[0].final_score, 0.4);
    }
}
