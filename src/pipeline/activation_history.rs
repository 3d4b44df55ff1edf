//! Per-hash activation-history side table
//!
//! Tracks how often and how recently a chunk's per-chunk conditions have
//! passed, for frequency/cooldown semantics a condition rule (or a future
//! one) might key off. Process-wide and lazily initialized, with an
//! explicit `reset` for test isolation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::types::ContentHash;

#[derive(Debug, Clone, Copy)]
pub struct ActivationRecord {
    pub count: u64,
    pub last_activation: DateTime<Utc>,
}

static ACTIVATION_HISTORY: Lazy<Mutex<HashMap<ContentHash, ActivationRecord>>> =
Lazy::new(|| Mutex::new(HashMap::new()));

/// Record that `hash` just passed its per-chunk conditions.
pub fn record_activation(hash: ContentHash) {
    let mut table = ACTIVATION_HISTORY.lock();
    let entry = table.entry(hash).or_insert(ActivationRecord {
            count: 0,
            last_activation: Utc::now(),
        });
    entry.count += 1;
    entry.last_activation = Utc::now();
}

pub fn activation_record(hash: ContentHash) -> Option<ActivationRecord> {
    ACTIVATION_HISTORY.lock().get(&hash).copied()
}

/// Test-only reset.
pub fn reset() {
    ACTIVATION_HISTORY.lock().clear();
}
