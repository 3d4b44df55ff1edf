//! Condition rule tree — a closed sum type over the twelve rule kinds a
//! collection or chunk can be gated on.
//!
//! Each variant is a tagged struct carrying its own settings, matched
//! exhaustively by the evaluator, so adding a rule kind is a compile error
//! everywhere it isn't handled rather than a silent runtime skip.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VhError};

/// How a `keyword` rule's values are matched against the recent-message
/// window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeywordMatchMode {
    Contains,
    /// Whole-word match.
    Exact,
    StartsWith,
    EndsWith,
}

/// `any` = at least one value matches; `all` = every value must match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Any,
    All,
}

/// Comparison operator for count-shaped rules (`messageCount`, `swipeCount`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "operator", content = "upperBound")]
pub enum CountOperator {
    Eq(i64),
    Gte(i64),
    Lte(i64),
    /// Inclusive `[count, upper_bound]` range.
    Between(i64),
}

/// How emotion detection should be sourced, `emotion` rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EmotionDetectionMethod {
    /// Use the Expressions-style collaborator if present.
    Expressions,
    /// Always fall back to the fixed emotion-family keyword lexicon.
    Keywords,
}

/// One `[start, end]` wall-clock window, in minutes-since-midnight.
/// `start > end` denotes a midnight-crossing window (e.g. 22:00–06:00).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_minutes: u32,
    pub end_minutes: u32,
}

impl TimeWindow {
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Ok(Self {
                start_minutes: parse_hhmm(start)?,
                end_minutes: parse_hhmm(end)?,
            })
    }

    /// Whether `minutes_since_midnight` falls within this window, handling
    /// the midnight-crossing case.
    pub fn contains(&self, minutes_since_midnight: u32) -> bool {
        if self.start_minutes <= self.end_minutes {
            (self.start_minutes..=self.end_minutes).contains(&minutes_since_midnight)
        } else {
            minutes_since_midnight >= self.start_minutes || minutes_since_midnight <= self.end_minutes
        }
    }
}

fn parse_hhmm(s: &str) -> Result<u32> {
    let (h, m) = s
    .split_once(':')
    .ok_or_else(|| VhError::InvalidCondition(format!("unparseable time-of-day: {s}")))?;
    let h: u32 = h
    .parse()
    .map_err(|_| VhError::InvalidCondition(format!("unparseable time-of-day: {s}")))?;
    let m: u32 = m
    .parse()
    .map_err(|_| VhError::InvalidCondition(format!("unparseable time-of-day: {s}")))?;
    if h > 23 || m > 59 {
        return Err(VhError::InvalidCondition(format!(
                    "time-of-day out of range: {s}"
                )));
    }
    Ok(h * 60 + m)
}

/// How a `chunkActive` rule locates the other chunk it depends on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "by")]
pub enum ChunkActiveTarget {
    Hash(u32),
    Section(String),
    Topic(String),
}

/// The closed set of rule kinds, each carrying its own settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ConditionRule {
    #[serde(rename = "keyword")]
    Keyword {
        values: Vec<String>,
        match_mode: KeywordMatchMode,
        case_sensitive: bool,
        negate: bool,
    },
    #[serde(rename = "speaker")]
    Speaker {
        values: Vec<String>,
        match_type: MatchType,
        negate: bool,
    },
    #[serde(rename = "characterPresent")]
    CharacterPresent { name: String, negate: bool },
    #[serde(rename = "messageCount")]
    MessageCount {
        count: i64,
        operator: CountOperator,
        negate: bool,
    },
    #[serde(rename = "emotion")]
    Emotion {
        values: Vec<String>,
        detection_method: EmotionDetectionMethod,
        negate: bool,
    },
    #[serde(rename = "isGroupChat")]
    IsGroupChat { expected: bool, negate: bool },
    #[serde(rename = "generationType")]
    GenerationType {
        values: Vec<crate::types::GenerationType>,
        negate: bool,
    },
    #[serde(rename = "lorebookActive")]
    LorebookActive {
        values: Vec<String>,
        match_type: MatchType,
        negate: bool,
    },
    #[serde(rename = "swipeCount")]
    SwipeCount {
        count: i64,
        operator: CountOperator,
        negate: bool,
    },
    #[serde(rename = "timeOfDay")]
    TimeOfDay { window: TimeWindow, negate: bool },
    #[serde(rename = "randomChance")]
    RandomChance { probability: f32, negate: bool },
    #[serde(rename = "chunkActive")]
    ChunkActive {
        target: ChunkActiveTarget,
        negate: bool,
    },
}

impl ConditionRule {
    /// Whether this rule's `negate` flag is set.
    pub fn negate(&self) -> bool {
        match self {
            ConditionRule::Keyword { negate, ..}
            | ConditionRule::Speaker { negate, ..}
            | ConditionRule::CharacterPresent { negate, ..}
            | ConditionRule::MessageCount { negate, ..}
            | ConditionRule::Emotion { negate, ..}
            | ConditionRule::IsGroupChat { negate, ..}
            | ConditionRule::GenerationType { negate, ..}
            | ConditionRule::LorebookActive { negate, ..}
            | ConditionRule::SwipeCount { negate, ..}
            | ConditionRule::TimeOfDay { negate, ..}
            | ConditionRule::RandomChance { negate, ..}
            | ConditionRule::ChunkActive { negate, ..} => *negate,
        }
    }

    /// Reject nonsense early: invalid regex in a keyword rule, an
    /// out-of-range probability, an unparseable time window, an empty
    /// `between` range. Part of the rule's construction contract.
    pub fn validate(&self) -> Result<()> {
        match self {
            ConditionRule::Keyword { values, ..} => {
                for v in values {
                    if v.starts_with('/') && v.len() > 1 && v.ends_with('/') {
                        let pattern = &v[1..v.len() - 1];
                        regex::Regex::new(pattern).map_err(|e| {
                                VhError::InvalidCondition(format!("invalid regex '{pattern}': {e}"))
                        })?;
                    }
                }
                Ok(())
            }
            ConditionRule::RandomChance { probability, ..} => {
                if !(0.0..=100.0).contains(probability) {
                    return Err(VhError::InvalidCondition(format!(
                                "randomChance probability out of range [0,100]: {probability}"
                            )));
                }
                Ok(())
            }
            ConditionRule::MessageCount {
                operator: CountOperator::Between(upper),
                count,
                ..
            }
            | ConditionRule::SwipeCount {
                operator: CountOperator::Between(upper),
                count,
                ..
            } => {
                if upper < count {
                    return Err(VhError::InvalidCondition(format!(
                                "between range is empty: {count}..{upper}"
                            )));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Combinator for a rule tree's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Logic {
    And,
    Or,
}

/// A collection's or chunk's full condition set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConditionSet {
    pub enabled: bool,
    pub logic: Option<Logic>,
    pub rules: Vec<ConditionRule>,
}

impl ConditionSet {
    pub fn has_rules(&self) -> bool {
        self.enabled && !self.rules.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        for rule in &self.rules {
            rule.validate()?;
        }
        Ok(())
    }
}
