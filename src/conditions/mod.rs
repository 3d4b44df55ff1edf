//! Condition evaluator — a composable rule tree matched against a
//! `SearchContext`, used by both the activation gate and the
//! per-chunk conditional filter.

pub mod evaluator;
pub mod rules;

pub use evaluator::{evaluate, ActiveChunkTag, ExpressionProvider, StaticExpressionProvider};
pub use rules::{
    ChunkActiveTarget, ConditionRule, ConditionSet, CountOperator, EmotionDetectionMethod,
    KeywordMatchMode, Logic, MatchType, TimeWindow,
};
