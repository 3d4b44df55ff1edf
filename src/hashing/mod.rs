//! Hashing & chunking
//!
//! Stable content hashing with an LRU memoization cache, plus the recursive
//! text splitter and message-grouping strategies used by the sync engine.

pub mod cache;
pub mod splitter;

pub use cache::{reset_global_cache, HashCache};
pub use splitter::{group_messages, hash_text, normalize, split, GroupingStrategy, MessageGroup};
