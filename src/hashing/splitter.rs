//! Text normalization, hashing, and chunk splitting

use std::hash::Hasher;

use crate::hashing::cache::GLOBAL_HASH_CACHE;
use crate::types::{ChatMessage, ContentHash};

/// Delimiter priority for the recursive splitter, highest priority first.
const DELIMITERS: &[&str] = &["\n\n", "\n", " ", ""];

/// Chat ingestion splits any message combination whose normalized text
/// exceeds this many characters.
pub const SPLIT_THRESHOLD: usize = 2_000;

/// Normalize text before hashing: trim surrounding whitespace and collapse
/// internal whitespace runs to a single space, so "equality of text implies
/// equality of hash" is checkable without caring about incidental
/// whitespace differences between two otherwise-identical chunks.
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Deterministic, process-stable hash of normalized `text`.
///
/// The hash function must be deterministic across processes, so
/// `DefaultHasher` (whose output is explicitly unspecified across builds)
/// is unusable here. FNV-1a is used instead: simple, allocation-free, and
/// stable across Rust versions.
pub fn hash_text(text: &str) -> ContentHash {
    let normalized = normalize(text);

    if let Some(cached) = GLOBAL_HASH_CACHE.get(&normalized) {
        return cached;
    }

    let hash = fnv1a(normalized.as_bytes());
    GLOBAL_HASH_CACHE.put(normalized, hash);
    hash
}

fn fnv1a(bytes: &[u8]) -> u32 {
    struct Fnv1a(u32);
    impl Hasher for Fnv1a {
        fn finish(&self) -> u64 {
            self.0 as u64
        }
        fn write(&mut self, bytes: &[u8]) {
            for &b in bytes {
                self.0 ^= b as u32;
                self.0 = self.0.wrapping_mul(0x0100_0193);
            }
        }
    }
    let mut hasher = Fnv1a(0x811c_9dc5);
    hasher.write(bytes);
    hasher.0
}

/// Recursively split `text` into chunks no larger than `chunk_size`,
/// trying each delimiter in priority order and falling back to a
/// character-level split to guarantee termination.
///
/// `chunk_size <= 0` returns `text` unchunked.
pub fn split(text: &str, chunk_size: i64) -> Vec<String> {
    if chunk_size <= 0 || text.len() as i64 <= chunk_size {
        if text.is_empty() {
            return Vec::new();
        }
        return vec![text.to_string()];
    }

    split_with_delimiters(text, chunk_size as usize, DELIMITERS)
}

fn split_with_delimiters(text: &str, chunk_size: usize, delimiters: &[&str]) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    if text.len() <= chunk_size {
        return vec![text.to_string()];
    }

    let Some((&delim, rest)) = delimiters.split_first() else {
        return vec![text.to_string()];
    };

    // Character-level fallback: slice at char boundaries near chunk_size.
    if delim.is_empty() {
        let mut chunks = Vec::new();
        let mut remaining = text;
        while !remaining.is_empty() {
            let mut boundary = chunk_size.min(remaining.len());
            while !remaining.is_char_boundary(boundary) {
                boundary -= 1;
            }
            let (head, tail) = remaining.split_at(boundary);
            chunks.push(head.to_string());
            remaining = tail;
        }
        return chunks;
    }

    let pieces: Vec<&str> = text.split(delim).collect();
    if pieces.len() <= 1 {
        // Delimiter doesn't occur in this text; try the next one.
        return split_with_delimiters(text, chunk_size, rest);
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for piece in pieces {
        let candidate_len = if current.is_empty() {
            piece.len()
        } else {
            current.len() + delim.len() + piece.len()
        };

        if candidate_len <= chunk_size {
            if !current.is_empty() {
                current.push_str(delim);
            }
            current.push_str(piece);
        } else {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            if piece.len() > chunk_size {
                chunks.extend(split_with_delimiters(piece, chunk_size, rest));
            } else {
                current = piece.to_string();
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Strategy used by the sync engine to group messages into chunks before
/// hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum GroupingStrategy {
    #[default]
    PerMessage,
    ConversationTurns,
    /// Fixed-size consecutive groups; default size 4.
    MessageBatch(usize),
}

/// One grouped unit of text ready for hashing and (if oversize) splitting.
#[derive(Debug, Clone)]
pub struct MessageGroup {
    pub text: String,
    /// Hashes of the individual messages folded into this group, in order.
    pub message_hashes: Vec<ContentHash>,
    /// Index of this group's last message within the slice passed to
    /// `group_messages`, used as the chunk's `messageId` for temporal decay.
    pub message_index: usize,
}

/// Apply a grouping strategy to a sequence of non-system messages.
pub fn group_messages(messages: &[ChatMessage], strategy: GroupingStrategy) -> Vec<MessageGroup> {
    match strategy {
        GroupingStrategy::PerMessage => messages
        .iter()
        .enumerate()
        .map(|(idx, m)| MessageGroup {
                text: m.mes.clone(),
                message_hashes: vec![hash_text(&m.mes)],
                message_index: idx,
            })
        .collect(),
        GroupingStrategy::ConversationTurns => messages
        .chunks(2)
        .enumerate()
        .map(|(chunk_idx, pair)| {
                let mut text = String::new();
                let mut hashes = Vec::new();
                for m in pair {
                    let role = if m.is_user { "User" } else { "Character" };
                    if !text.is_empty() {
                        text.push('\n');
                    }
                    text.push_str(&format!("{role}: {}", m.mes));
                    hashes.push(hash_text(&m.mes));
                }
                MessageGroup {
                    text,
                    message_hashes: hashes,
                    message_index: chunk_idx * 2 + pair.len() - 1,
                }
            })
        .collect(),
        GroupingStrategy::MessageBatch(size) => {
            let size = size.max(1);
            messages
            .chunks(size)
            .enumerate()
            .map(|(chunk_idx, batch)| {
                    let text = batch
                    .iter()
                    .map(|m| m.mes.as_str())
                    .collect::<Vec<_>>()
                    .join("\n");
                    let hashes = batch.iter().map(|m| hash_text(&m.mes)).collect();
                    MessageGroup {
                        text,
                        message_hashes: hashes,
                        message_index: chunk_idx * size + batch.len() - 1,
                    }
                })
            .collect()
        }
    }
}
