//! Small, independently-testable helpers for query-building and
//! dedup steps.
//!
//! Kept as plain functions over typed inputs, unit-tested with literal
//! strings, rather than folded as methods onto the orchestrating struct.

use std::collections::HashSet;

use crate::hashing::splitter::hash_text;
use crate::types::{ChatMessage, ContentHash};

/// Build the query string from the last `depth` non-system messages, in
/// chronological order (reversed from most-recent-first), newline-joined
/// and trimmed.
pub fn build_query_text(messages: &[ChatMessage], depth: usize) -> String {
    let recent: Vec<&ChatMessage> = messages
    .iter()
    .rev()
    .filter(|m| !m.is_system)
    .take(depth)
    .collect();

    recent
    .into_iter()
    .rev()
    .map(|m| m.mes.as_str())
    .collect::<Vec<_>>()
    .join("\n")
    .trim()
    .to_string()
}

/// The hash set of the current chat's non-empty messages, using the same
/// hash-on-normalized-text rule chunks are hashed with.
pub fn live_context_hashes(messages: &[ChatMessage]) -> HashSet<ContentHash> {
    messages
    .iter()
    .filter(|m| !m.mes.trim().is_empty())
    .map(|m| hash_text(&m.mes))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::cache::reset_global_cache;

    fn msg(text: &str, is_system: bool) -> ChatMessage {
        ChatMessage {
            mes: text.to_string(),
            name: "Bot".into(),
            is_user: false,
            is_system,
            swipes: vec![],
            extra: Default::default(),
        }
    }

    #[test]
    fn query_text_skips_system_messages_and_preserves_order() {
        let messages = vec![
            msg("first", false),
            msg("ignored system note", true),
            msg("second", false),
            msg("third", false),
        ];
        assert_eq!(build_query_text(&messages, 2), "second\nthird");
    }

    #[test]
    fn query_text_empty_when_no_eligible_messages() {
        let messages = vec![msg("only system", true)];
        assert_eq!(build_query_text(&messages, 5), "");
    }

    #[test]
    fn live_context_hashes_skip_blank_messages() {
        reset_global_cache();
        let messages = vec![msg("hello world", false), msg(" ", false)];
        let hashes = live_context_hashes(&messages);
        assert_eq!(hashes.len(), 1);
        assert!(hashes.contains(&hash_text("hello world")));
    }
}
