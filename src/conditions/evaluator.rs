//! AND/OR rule-tree evaluation against a `SearchContext`
//!
//! Emotion detection treats its collaborator as optional rather than
//! required: `ExpressionProvider` is a runtime capability checked with
//! `Option<&dyn _>`, not a cargo feature, since whether it's wired up is a
//! deployment decision, not a compile-time one.

use std::collections::HashMap;

use chrono::Timelike;

use crate::conditions::rules::{
    ChunkActiveTarget, ConditionRule, ConditionSet, CountOperator, KeywordMatchMode, Logic,
    MatchType,
};
use crate::types::{ContentHash, SearchContext};

/// Optional collaborator for the `emotion` rule. When absent, or when the
/// rule explicitly requests `detectionMethod: keywords`, evaluation falls
/// back to `EMOTION_LEXICON`.
pub trait ExpressionProvider: Send + Sync {
    /// The last cached expression label for `character`, if any.
    fn current_expression(&self, character: &str) -> Option<String>;
}

/// A currently-active chunk's section/topic tags, for `chunkActive` rules
/// that reference a chunk by something other than its hash.
#[derive(Debug, Clone)]
pub struct ActiveChunkTag {
    pub hash: ContentHash,
    pub section: Option<String>,
    pub topic: Option<String>,
}

/// A fixed ~30-label emotion lexicon used when no Expressions-style
/// collaborator is available. Each label maps to a handful of keyword
/// families that imply it.
pub const EMOTION_LEXICON: &[(&str, &[&str])] = &[
    ("joy", &["happy", "joy", "delighted", "glad", "cheerful"]),
    ("sadness", &["sad", "sorrow", "grief", "tearful", "miserable"]),
    ("anger", &["angry", "furious", "rage", "irritated", "mad"]),
    ("fear", &["afraid", "scared", "terrified", "frightened", "dread"]),
    ("surprise", &["surprised", "astonished", "startled", "shocked"]),
    ("disgust", &["disgusted", "revolted", "repulsed", "gross"]),
    ("trust", &["trust", "confident in", "reliant on"]),
    ("anticipation", &["anticipat", "eager", "looking forward"]),
    ("love", &["love", "adore", "cherish", "affection"]),
    ("guilt", &["guilty", "remorse", "regret"]),
    ("shame", &["ashamed", "humiliated", "mortified"]),
    ("pride", &["proud", "pride", "accomplished"]),
    ("jealousy", &["jealous", "covet"]),
    ("envy", &["envious", "envy"]),
    ("anxiety", &["anxious", "nervous", "worried", "uneasy"]),
    ("excitement", &["excited", "thrilled", "exhilarated"]),
    ("boredom", &["bored", "tedious", "monotonous"]),
    ("contempt", &["contempt", "disdain", "scorn"]),
    ("admiration", &["admire", "impressed", "in awe of"]),
    ("awe", &["awe", "awestruck", "wonder"]),
    ("confusion", &["confused", "bewildered", "puzzled"]),
    ("curiosity", &["curious", "intrigued", "wondering"]),
    ("relief", &["relieved", "relief"]),
    ("nostalgia", &["nostalgic", "reminisce", "wistful"]),
    ("hope", &["hopeful", "hope", "optimistic"]),
    ("despair", &["despair", "hopeless", "defeated"]),
    ("gratitude", &["grateful", "thankful", "appreciative"]),
    ("embarrassment", &["embarrassed", "flustered", "awkward"]),
    ("amusement", &["amused", "laughing", "chuckl"]),
    ("disappointment", &["disappointed", "letdown", "disheartened"]),
];

/// Classify `text` against the fixed emotion lexicon; returns the first
/// matching label families, lowercased-substring matched.
fn keyword_family_emotion(text: &str) -> Vec<&'static str> {
    let lower = text.to_lowercase();
    EMOTION_LEXICON
    .iter()
    .filter(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
    .map(|(label, _)| *label)
    .collect()
}

fn window_text(ctx: &SearchContext) -> String {
    ctx.recent_messages
    .iter()
    .map(|m| m.mes.as_str())
    .collect::<Vec<_>>()
    .join("\n")
}

fn word_boundary_match(haystack: &str, needle: &str) -> bool {
    haystack
    .split(|c: char| !c.is_alphanumeric())
    .any(|w| w == needle)
}

fn keyword_matches(haystack: &str, value: &str, mode: KeywordMatchMode, case_sensitive: bool) -> bool {
    if value.starts_with('/') && value.len() > 1 && value.ends_with('/') {
        let pattern = &value[1..value.len() - 1];
        let built = if case_sensitive {
            regex::Regex::new(pattern)
        } else {
            regex::RegexBuilder::new(pattern).case_insensitive(true).build()
        };
        return built.map(|re| re.is_match(haystack)).unwrap_or(false);
    }

    let (haystack, value) = if case_sensitive {
        (haystack.to_string(), value.to_string())
    } else {
        (haystack.to_lowercase(), value.to_lowercase())
    };

    match mode {
        KeywordMatchMode::Contains => haystack.contains(&value),
        KeywordMatchMode::StartsWith => haystack.starts_with(&value),
        KeywordMatchMode::EndsWith => haystack.ends_with(&value),
        KeywordMatchMode::Exact => word_boundary_match(&haystack, &value),
    }
}

fn count_matches(count: i64, operator: &CountOperator, actual: i64) -> bool {
    match operator {
        CountOperator::Eq(n) => actual == *n,
        CountOperator::Gte(n) => actual >= *n,
        CountOperator::Lte(n) => actual <= *n,
        CountOperator::Between(upper) => actual >= count && actual <= *upper,
    }
}

/// Evaluate one rule against `ctx`, without applying its `negate` flag
/// (the caller does that uniformly).
fn eval_rule(
    rule: &ConditionRule,
    ctx: &SearchContext,
    active_tags: &[ActiveChunkTag],
    expressions: Option<&dyn ExpressionProvider>,
) -> bool {
    match rule {
        ConditionRule::Keyword {
            values,
            match_mode,
            case_sensitive,
            ..
        } => {
            let haystack = window_text(ctx);
            values
            .iter()
            .any(|v| keyword_matches(&haystack, v, *match_mode, *case_sensitive))
        }
        ConditionRule::Speaker { values, match_type, ..} => {
            let speakers: Vec<&str> = match match_type {
                MatchType::Any => ctx.last_speaker.as_deref().into_iter().collect(),
                MatchType::All => ctx.message_speakers.iter().map(String::as_str()).collect(),
            };
            match match_type {
                MatchType::Any => values.iter().any(|v| speakers.contains(&v.as_str())),
                MatchType::All => values.iter().all(|v| speakers.contains(&v.as_str())),
            }
        }
        ConditionRule::CharacterPresent { name, ..} => {
            ctx.message_speakers.iter().any(|s| s == name)
        }
        ConditionRule::MessageCount { count, operator, ..} => {
            count_matches(*count, operator, ctx.message_count as i64)
        }
        ConditionRule::Emotion {
            values,
            detection_method,
            ..
        } => {
            let labels: Vec<String> = match (detection_method, expressions, &ctx.current_character) {
                (
                    crate::conditions::rules::EmotionDetectionMethod::Expressions,
                    Some(provider),
                    Some(character),
                ) => provider
                .current_expression(character)
                .into_iter()
                .collect(),
                _ => {
                    let text = window_text(ctx);
                    keyword_family_emotion(&text)
                    .into_iter()
                    .map(str::to_string)
                    .collect()
                }
            };
            values.iter().any(|v| labels.iter().any(|l| l.eq_ignore_ascii_case(v)))
        }
        ConditionRule::IsGroupChat { expected, ..} => ctx.is_group_chat == *expected,
        ConditionRule::GenerationType { values, ..} => {
            ctx.generation_type.map(|gt| values.contains(&gt)).unwrap_or(false)
        }
        ConditionRule::LorebookActive { values, match_type, ..} => {
            let entries = &ctx.active_lorebook_entries;
            let is_match = |v: &str| entries.iter().any(|e| e.key == v || e.uid == v);
            match match_type {
                MatchType::Any => values.iter().any(|v| is_match(v)),
                MatchType::All => values.iter().all(|v| is_match(v)),
            }
        }
        ConditionRule::SwipeCount { count, operator, ..} => {
            count_matches(*count, operator, ctx.swipe_count as i64)
        }
        ConditionRule::TimeOfDay { window, ..} => {
            let now = ctx.timestamp.unwrap_or_else(chrono::Utc::now());
            let minutes = now.hour * 60 + now.minute;
            window.contains(minutes)
        }
        ConditionRule::RandomChance { probability, ..} => {
            // Re-rolled every call; never memoized.
            rand::random::<f32>() * 100.0 < *probability
        }
        ConditionRule::ChunkActive { target, ..} => match target {
            ChunkActiveTarget::Hash(h) => ctx.active_chunks.contains(h),
            ChunkActiveTarget::Section(section) => {
                active_tags.iter().any(|t| t.section.as_deref() == Some(section.as_str()))
            }
            ChunkActiveTarget::Topic(topic) => {
                active_tags.iter().any(|t| t.topic.as_deref() == Some(topic.as_str()))
            }
        },
    }
}

/// Evaluate a full rule tree against `ctx`. An empty or disabled set
/// evaluates to `true` (nothing to gate on).
pub fn evaluate(
    set: &ConditionSet,
    ctx: &SearchContext,
    active_tags: &[ActiveChunkTag],
    expressions: Option<&dyn ExpressionProvider>,
) -> bool {
    if !set.enabled || set.rules.is_empty() {
        return true;
    }

    let results: Vec<bool> = set
    .rules
    .iter()
    .map(|rule| {
            let raw = eval_rule(rule, ctx, active_tags, expressions);
            if rule.negate() {
                !raw
            } else {
                raw
            }
        })
    .collect();

    match set.logic.unwrap_or(Logic::And) {
        Logic::And => results.into_iter().all(|r| r),
        Logic::Or => results.into_iter().any(|r| r),
    }
}

/// Deterministic test/mock implementation of `ExpressionProvider`.
#[derive(Debug, Default)]
pub struct StaticExpressionProvider(pub HashMap<String, String>);

impl ExpressionProvider for StaticExpressionProvider {
    fn current_expression(&self, character: &str) -> Option<String> {
        self.0.get(character).cloned()
    }
}
