//! Property-based checks for boost composition and decay bounds.

use proptest::prelude::*;
use vecthare::scoring::decay::{decay_multiplier, DecayConfig, DecayMode};
use vecthare::scoring::keyword_boost::apply_keyword_boost;
use vecthare::types::{Chunk, ChunkMetadata, Keyword, ScoredChunk};

fn chunk_with_keywords(score: f32, keywords: Vec<Keyword>) -> ScoredChunk {
    let mut metadata = ChunkMetadata::default();
    metadata.keywords = keywords;
    let chunk = Chunk {
        hash: 1,
        text: "placeholder text".into(),
        index: 0,
        metadata,
        score: Some(score),
    };
    ScoredChunk::new(chunk, "vh:chat:u1")
}

proptest! {
    /// An empty keyword match always leaves the score untouched; any match
    /// set with positive weight never lowers it.
    #[test]
    fn boost_is_monotonic(score in 0.0f32..1.0, weight in 1.0f32..5.0) {
        let mut chunk = chunk_with_keywords(score, vec![Keyword { text: "dragon".into(), weight }]);
        apply_keyword_boost(&mut chunk, "a dragon appears suddenly");
        prop_assert!(chunk.final_score >= chunk.original_score - 1e-6);
    }

    /// Composition law: boost = 1 + sum(weight - 1) over matched keywords.
    #[test]
    fn boost_composes_additively(weights in prop::collection::vec(1.0f32..3.0, 1..6)) {
        let query: String = weights.iter().enumerate().map(|(i, _)| format!("kw{i}")).collect::<Vec<_>>().join(" ");
        let keywords: Vec<Keyword> = weights
        .iter()
        .enumerate()
        .map(|(i, &w)| Keyword { text: format!("kw{i}"), weight: w })
        .collect();
        let mut chunk = chunk_with_keywords(1.0, keywords);
        apply_keyword_boost(&mut chunk, &query);

        let expected: f32 = 1.0 + weights.iter().map(|w| w - 1.0).sum::<f32>();
        prop_assert!((chunk.keyword_boost - expected).abs() < 1e-4);
    }

    /// Decay never raises a score above its original and never drops it
    /// below the configured floor.
    #[test]
    fn decay_multiplier_stays_within_bounds(
        age in 0.0f32..1000.0,
        half_life in 1.0f32..100.0,
        min_relevance in 0.0f32..0.9,
    ) {
        let config = DecayConfig {
            enabled: true,
            mode: DecayMode::Exponential,
            half_life,
            linear_rate: 0.0,
            min_relevance,
            scene_aware: false,
        };
        let multiplier = decay_multiplier(&config, age);
        prop_assert!(multiplier >= min_relevance - 1e-6);
        prop_assert!(multiplier <= 1.0 + 1e-6);
    }

    /// Same law for the linear curve.
    #[test]
    fn linear_decay_multiplier_stays_within_bounds(
        age in 0.0f32..1000.0,
        linear_rate in 0.0f32..0.1,
        min_relevance in 0.0f32..0.9,
    ) {
        let config = DecayConfig {
            enabled: true,
            mode: DecayMode::Linear,
            half_life: 20.0,
            linear_rate,
            min_relevance,
            scene_aware: false,
        };
        let multiplier = decay_multiplier(&config, age);
        prop_assert!(multiplier >= min_relevance - 1e-6);
        prop_assert!(multiplier <= 1.0 + 1e-6);
    }
}
