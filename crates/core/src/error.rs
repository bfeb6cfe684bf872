//! Error types shared by every layer of the store.
//!
//! The taxonomy here is closed and mirrors the error kinds an adapter is
//! expected to surface at the boundary: validation, not-found, conditional
//! failure, transaction cancellation/conflict, and an internal catch-all.
//! `TimestampConflict` never crosses the shard boundary on its own — the
//! coordinator retries it with a fresh timestamp, see [`Error::is_retryable`].

use crate::item::Item;
use crate::protocol::CancellationReason;
use std::io;
use thiserror::Error;

/// Result type alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input, missing required fields, limits exceeded, bad
    /// expression syntax. Never retryable.
    #[error("validation error: {0}")]
    Validation(String),

    /// Table or schema absent.
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    /// The evaluator rejected a condition expression during prepare.
    #[error("conditional check failed")]
    ConditionalCheckFailed { item: Option<Item> },

    /// One or more prepare responses were not `accepted`; carries a
    /// per-index reason for every item in the original request.
    #[error("transaction cancelled")]
    TransactionCancelled(Vec<CancellationReason>),

    /// Lock contention during prepare: a different transaction already
    /// holds the item. The coordinator aborts and the caller may retry.
    #[error("transaction conflict: {0}")]
    TransactionConflict(String),

    /// Stale timestamp at prepare. Internal only — the coordinator
    /// retries with a fresh timestamp rather than surfacing this.
    #[error("timestamp conflict: {0}")]
    TimestampConflict(String),

    /// Invariant violation or durable-storage failure. Operator-visible;
    /// may require manual recovery (e.g. a ledger entry stuck at
    /// `COMMITTING_FAILED`).
    #[error("internal error: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Condition or table lookup failed for reasons the caller controls.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// Lock contention during prepare; safe for the caller to retry.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::TransactionConflict(_))
    }

    /// Stale timestamp at prepare; the coordinator should mint a fresh
    /// timestamp and retry rather than propagate this to the caller.
    pub fn is_timestamp_conflict(&self) -> bool {
        matches!(self, Error::TimestampConflict(_))
    }

    /// Errors the coordinator itself may retry without caller involvement:
    /// timestamp conflicts at prepare, and I/O hiccups during commit.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::TimestampConflict(_) | Error::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_is_not_conflict_or_retryable() {
        let err = Error::Validation("bad input".into());
        assert!(err.is_validation());
        assert!(!err.is_conflict());
        assert!(!err.is_retryable());
    }

    #[test]
    fn transaction_conflict_is_conflict_not_retryable() {
        let err = Error::TransactionConflict("locked by tx_1".into());
        assert!(err.is_conflict());
        assert!(!err.is_retryable());
    }

    #[test]
    fn timestamp_conflict_is_retryable() {
        let err = Error::TimestampConflict("stale timestamp".into());
        assert!(err.is_timestamp_conflict());
        assert!(err.is_retryable());
    }

    #[test]
    fn io_error_is_retryable() {
        let err: Error = io::Error::new(io::ErrorKind::Other, "disk full").into();
        assert!(err.is_retryable());
    }

    #[test]
    fn display_messages_carry_detail() {
        let err = Error::ResourceNotFound("orders".into());
        assert!(err.to_string().contains("orders"));
    }
}
