//! Store operation errors.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Error surfaced by a store client.
///
/// The variants matter for retry classification: `Conflict` is transient
/// and safe to retry from scratch, `Timeout` leaves durability undetermined
/// and must never be retried blindly, everything else is terminal for the
/// attempted operation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A concurrent transaction modified overlapping data first. Nothing
    /// became durable; the whole workflow may be retried.
    #[error("write conflict: {0}")]
    Conflict(String),

    /// The required acknowledgment count was not reached within the
    /// durability policy's wait bound. The mutation may or may not have
    /// been applied; callers must re-read committed state to find out.
    #[error("commit not acknowledged within {0:?}; durability undetermined")]
    Timeout(Duration),

    /// The transaction is no longer active (aborted by the store, expired,
    /// or already finished).
    #[error("transaction aborted: {0}")]
    Aborted(String),

    /// Unique-key violation on insert.
    #[error("duplicate key {key} in collection '{collection}'")]
    DuplicateKey { collection: String, key: Uuid },

    /// Update target does not exist.
    #[error("document {key} missing from collection '{collection}'")]
    DocumentMissing { collection: String, key: Uuid },

    /// Document body could not be encoded or decoded.
    #[error("document serialization failed: {0}")]
    Serialization(String),

    /// Internal store failure (e.g. poisoned lock).
    #[error("internal store failure: {0}")]
    Internal(String),
}
