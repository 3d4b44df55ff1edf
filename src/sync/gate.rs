//! Sync gate — the `IDLE → BUSY → IDLE` state machine guarding
//! sync runs.
//!
//! Rather than queuing a second entrant, a busy gate rejects it outright
//! with the `-1` sentinel, since a sync batch always re-reads the
//! backend's hash set as its source of truth — queuing a second run would
//! only duplicate the diff the first run is already doing.

use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Idle,
    Busy,
}

pub struct SyncGate {
    state: Mutex<GateState>,
}

impl Default for SyncGate {
    fn default() -> Self {
        Self {
            state: Mutex::new(GateState::Idle),
        }
    }
}

impl SyncGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the gate. `None` means a sync is already in progress — the
    /// caller should return the `-1` sentinel without touching the backend.
    pub async fn try_acquire(&self) -> Option<SyncGuard<'_>> {
        let mut state = self.state.lock().await;
        if *state == GateState::Busy {
            return None;
        }
        *state = GateState::Busy;
        Some(SyncGuard { gate: self })
    }
}

/// Held for the duration of one sync batch. Dropping it returns the gate
/// to `Idle`.
pub struct SyncGuard<'a> {
    gate: &'a SyncGate,
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.gate.state.try_lock() {
            *state = GateState::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn concurrent_entry_is_rejected() {
        let gate = SyncGate::new();
        let first = gate.try_acquire().await;
        assert!(first.is_some());
        assert!(gate.try_acquire().await.is_none());
    }

    #[tokio::test]
    async fn dropping_the_guard_returns_to_idle() {
        let gate = SyncGate::new();
        {
            let _guard = gate.try_acquire().await.unwrap();
            assert!(gate.try_acquire().await.is_none());
        }
        assert!(gate.try_acquire().await.is_some());
    }
}
