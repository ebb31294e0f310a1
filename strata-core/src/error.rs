//! Error types for Strata operations

use thiserror::Error;

/// Fingerprint generation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FingerprintError {
    #[error("Key has an empty path")]
    EmptyKeyPath,

    #[error("Query has no kind")]
    MissingKind,
}

/// Backing-store errors (cache dispatcher or set-capable store).
///
/// Transport failures are not retried by this layer; they propagate
/// to the caller unchanged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("No set-capable backing store configured")]
    NoBackingStore,

    #[error("Store operation {op} failed: {reason}")]
    OperationFailed { op: String, reason: String },

    #[error("Cached entry {fingerprint} could not be decoded: {reason}")]
    DecodeFailed { fingerprint: String, reason: String },

    #[error("Value for {fingerprint} could not be encoded: {reason}")]
    EncodeFailed { fingerprint: String, reason: String },

    #[error("Unexpected reply from set store for {op}")]
    UnexpectedReply { op: String },
}

/// Errors reported by a caller-supplied fetch operation.
///
/// `NotFound` is recognized by the keyed-entity orchestrator during
/// partial-hit reconciliation of a single missing key and converted
/// into a negative cache entry. Every other failure aborts the call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Entity not found")]
    NotFound,

    #[error("Fetch operation failed: {reason}")]
    Failed { reason: String },
}

impl FetchError {
    /// Build a `Failed` variant from any displayable cause.
    pub fn failed(reason: impl std::fmt::Display) -> Self {
        Self::Failed {
            reason: reason.to_string(),
        }
    }
}

/// Master error type for all Strata operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StrataError {
    #[error("Fingerprint error: {0}")]
    Fingerprint(#[from] FingerprintError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),
}

/// Result type alias for Strata operations.
pub type StrataResult<T> = Result<T, StrataError>;

// =============================================================================
// TESTS
// =============================================================================
