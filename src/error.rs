//! Error types for the retrieval pipeline and sync engine

use thiserror::Error;

/// Result type alias used throughout this crate
pub type Result<T> = std::result::Result<T, VhError>;

/// Error kinds surfaced by the retrieval pipeline, the sync engine, and the
/// collaborator traits (backend, host, metadata store).
///
/// The retrieval pipeline never lets one of these escape to the host.
/// Any error raised mid-pipeline is caught, logged, and turned into
/// "no injection this turn" instead.
#[derive(Error, Debug)]
pub enum VhError {
    /// API key, URL, or model absent for a provider. Retrieval aborts.
    #[error("configuration missing: {0}")]
    ConfigMissing(String),

    /// Backend health check failed. Retrieval aborts.
    #[error("vector backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Network/429/502/503/504/timeout — retried per policy before surfacing.
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// Backend returned malformed JSON; that collection's results are
    /// dropped but the pipeline continues.
    #[error("invalid payload from backend: {0}")]
    PayloadInvalid(String),

    /// Import vector dimension mismatch; user-facing warning, fallback to
    /// re-embed.
    #[error("embedding provider incompatible: {0}")]
    ProviderIncompatible(String),

    /// A single item in a sync batch failed; logged and counted, loop
    /// continues.
    #[error("sync item failed: {0}")]
    SyncItemFailed(String),

    /// Bulk sync aborted because the current chat changed mid-run.
    #[error("chat changed during sync")]
    ChatChanged,

    /// A collection's embedding provider/model differs from the current
    /// one; excluded from the query with a warning.
    #[error("activation mismatch: {0}")]
    ActivationMismatch(String),

    /// Collection id / registry key failed to parse against the grammar.
    #[error("invalid collection id: {0}")]
    InvalidCollectionId(String),

    /// A condition rule failed validation (bad regex, out-of-range
    /// probability, unparseable time-of-day, etc.).
    #[error("invalid condition rule: {0}")]
    InvalidCondition(String),

    /// Serialization/deserialization failure in settings or metadata.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Catch-all for conditions with no dedicated variant.
    #[error("internal error: {0}")]
    Internal(String),
}

impl VhError {
    /// Whether the caller should retry this operation per the backoff
    /// policy (base 1s, cap 10s, 3 attempts).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VhError::TransientNetwork(_) | VhError::BackendUnavailable(_)
        )
    }

    /// Whether this error should abort the current operation entirely
    /// (sync batch driver, retrieval run) rather than being recorded and
    /// skipped.
    pub fn is_abort_worthy(&self) -> bool {
        matches!(
            self,
            VhError::ConfigMissing(_) | VhError::BackendUnavailable(_) | VhError::ChatChanged
        )
    }

    /// Short, user-facing message suitable for a host-side toast.
    pub fn user_message(&self) -> String {
        match self {
            VhError::BackendUnavailable(b) => format!("Backend {b} unavailable"),
            VhError::ChatChanged => "Chat changed during vectorization".to_string(),
            VhError::ConfigMissing(what) => format!("Missing configuration: {what}"),
            other => other.to_string(),
        }
    }
}
