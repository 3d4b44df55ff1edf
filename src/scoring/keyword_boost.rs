//! Additive keyword boosting over overfetched vector results

use crate::types::{Keyword, ScoredChunk};

/// Overfetch multiplier applied to the requested top-K before boosting and
/// trimming back down.
pub fn overfetch_k(requested_k: usize) -> usize {
    (2 * requested_k).clamp(10, 100)
}

/// Apply keyword boosting to one chunk in place, recording the audit-trail
/// fields the debug trace needs.
///
/// `boost = 1 + sum((weight - 1) for each matched keyword)`; an empty match
/// set leaves `final_score == original_score`.
pub fn apply_keyword_boost(chunk: &mut ScoredChunk, query: &str) {
    let query_lower = query.to_lowercase();
    let keywords = &chunk.chunk.metadata.keywords;

    let matched: Vec<&Keyword> = keywords
    .iter()
    .filter(|k| query_lower.contains(&k.text.to_lowercase()))
    .collect();

    if matched.is_empty() {
        chunk.keyword_boost = 1.0;
        chunk.keyword_boosted = false;
        chunk.final_score = chunk.original_score;
        return;
    }

    let boost = 1.0 + matched.iter().map(|k| k.weight - 1.0).sum::<f32>();

    chunk.keyword_boost = boost;
    chunk.keyword_boosted = true;
    chunk.matched_keywords = matched.iter().map(|k| k.text.clone()).collect();
    chunk.matched_keywords_with_weights = matched.into_iter().cloned().collect();
    chunk.final_score = chunk.original_score * boost;
}

/// Re-sort a batch of boosted chunks by `final_score` descending and truncate to `k`.
pub fn rerank_and_trim(mut chunks: Vec<ScoredChunk>, k: usize) -> Vec<ScoredChunk> {
    chunks.sort_by(|a, b| {
            b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
        });
    chunks.truncate(k);
    chunks
}
