//! Chat-collection sync engine

pub mod engine;
pub mod gate;

pub use engine::{SyncEngine, SyncReport};
pub use gate::{SyncGate, SyncGuard};
