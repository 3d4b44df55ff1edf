//! Activation gate — decides whether a collection participates in a
//! query, in strict precedence order: disabled > alwaysActive > triggers >
//! conditions > auto.
//!
//! A collection's participation is decided per-query, so this is a pure function of the collection's current
//! metadata and the current `SearchContext` — there is no stored
//! activation state to go stale.

use regex::RegexBuilder;

use crate::conditions::{self, ActiveChunkTag, ExpressionProvider};
use crate::registry::collection::{CollectionMeta, TriggerMatchMode};
use crate::types::SearchContext;

/// Why a collection was (or wasn't) activated, for the debug trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationReason {
    Disabled,
    AlwaysActive,
    TriggerMatch,
    TriggerMiss,
    ConditionsPassed,
    ConditionsFailed,
    AutoActivate,
}

impl ActivationReason {
    pub fn activated(self) -> bool {
        matches!(
            self,
            ActivationReason::AlwaysActive
            | ActivationReason::TriggerMatch
            | ActivationReason::ConditionsPassed
            | ActivationReason::AutoActivate
        )
    }
}

fn trigger_matches(trigger: &str, window: &str, case_sensitive: bool) -> bool {
    if trigger.starts_with('/') && trigger.len() > 1 && trigger.ends_with('/') {
        let pattern = &trigger[1..trigger.len() - 1];
        return RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .build()
        .map(|re| re.is_match(window))
        .unwrap_or(false);
    }

    if case_sensitive {
        window.contains(trigger)
    } else {
        window.to_lowercase().contains(&trigger.to_lowercase())
    }
}

/// Decide whether `meta`'s collection participates in this query, per
/// five-step precedence.
pub fn is_active(
    meta: &CollectionMeta,
    ctx: &SearchContext,
    active_tags: &[ActiveChunkTag],
    expressions: Option<&dyn ExpressionProvider>,
) -> ActivationReason {
    if !meta.enabled {
        return ActivationReason::Disabled;
    }

    if meta.always_active {
        return ActivationReason::AlwaysActive;
    }

    if !meta.triggers.is_empty() {
        let depth = meta.trigger_scan_depth.max(1);
        let window = ctx
        .recent_messages
        .iter()
        .rev()
        .take(depth)
        .map(|m| m.mes.as_str())
        .collect::<Vec<_>>()
        .join("\n");

        let matched = match meta.trigger_match_mode {
            TriggerMatchMode::Any => meta
            .triggers
            .iter()
            .any(|t| trigger_matches(t, &window, meta.trigger_case_sensitive)),
            TriggerMatchMode::All => meta
            .triggers
            .iter()
            .all(|t| trigger_matches(t, &window, meta.trigger_case_sensitive)),
        };

        if matched {
            return ActivationReason::TriggerMatch;
        }

        if !meta.conditions.has_rules() {
            return ActivationReason::TriggerMiss;
        }
        // Trigger missed but conditions exist: fall through to step 4.
    }

    if meta.conditions.has_rules() {
        return if conditions::evaluate(&meta.conditions, ctx, active_tags, expressions) {
            ActivationReason::ConditionsPassed
        } else {
            ActivationReason::ConditionsFailed
        };
    }

    ActivationReason::AutoActivate
}
