//! Composite workflow: email update + borrow in a single transaction.
//!
//! Either both the email change and the loan (with its stock decrement)
//! become durable, or neither does. The historical non-transactional
//! variant of this combination is deliberately not offered.

use thiserror::Error;

use circulib_members::EmailAddress;
use circulib_store::{StoreClient, StoreError, TxnHandle};

use crate::borrow::{self, BorrowError, BorrowOutcome, BorrowRequest};
use crate::coordinator::{TxnError, WorkError};
use crate::member_update::{self, UpdateError};

/// Failure surface of
/// [`crate::service::LendingService::update_email_and_borrow`].
#[derive(Debug, Error)]
pub enum CompositeBorrowError {
    #[error("member not found")]
    MemberNotFound,

    #[error("invalid email: {0}")]
    InvalidEmail(String),

    #[error("book not found")]
    BookNotFound,

    #[error("no copies of the book are in stock")]
    OutOfStock,

    #[error("invalid due date: {0}")]
    InvalidDueDate(String),

    #[error("composite update conflicted with a concurrent transaction: {0}")]
    Conflict(String),

    #[error("commit not acknowledged within {0:?}; durability undetermined")]
    Timeout(std::time::Duration),

    #[error("transaction aborted by the store: {0}")]
    Aborted(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<UpdateError> for CompositeBorrowError {
    fn from(value: UpdateError) -> Self {
        match value {
            UpdateError::MemberNotFound => CompositeBorrowError::MemberNotFound,
            UpdateError::InvalidEmail(msg) => CompositeBorrowError::InvalidEmail(msg),
            UpdateError::Conflict(msg) => CompositeBorrowError::Conflict(msg),
            UpdateError::Timeout(waited) => CompositeBorrowError::Timeout(waited),
            UpdateError::Aborted(msg) => CompositeBorrowError::Aborted(msg),
            UpdateError::Store(error) => CompositeBorrowError::Store(error),
        }
    }
}

impl From<BorrowError> for CompositeBorrowError {
    fn from(value: BorrowError) -> Self {
        match value {
            BorrowError::BookNotFound => CompositeBorrowError::BookNotFound,
            BorrowError::OutOfStock => CompositeBorrowError::OutOfStock,
            BorrowError::InvalidDueDate(msg) => CompositeBorrowError::InvalidDueDate(msg),
            BorrowError::Conflict(msg) => CompositeBorrowError::Conflict(msg),
            BorrowError::Timeout(waited) => CompositeBorrowError::Timeout(waited),
            BorrowError::Aborted(msg) => CompositeBorrowError::Aborted(msg),
            BorrowError::Store(error) => CompositeBorrowError::Store(error),
        }
    }
}

impl From<TxnError<CompositeBorrowError>> for CompositeBorrowError {
    fn from(value: TxnError<CompositeBorrowError>) -> Self {
        match value {
            TxnError::Domain(error) => error,
            TxnError::Conflict(msg) => CompositeBorrowError::Conflict(msg),
            TxnError::Timeout(waited) => CompositeBorrowError::Timeout(waited),
            TxnError::Aborted(msg) => CompositeBorrowError::Aborted(msg),
            TxnError::Store(error) => CompositeBorrowError::Store(error),
        }
    }
}

/// The composite unit of work: both member and borrow units run against
/// the same transaction handle.
pub fn execute<S: StoreClient>(
    store: &S,
    txn: &TxnHandle,
    request: &BorrowRequest,
    email: &EmailAddress,
) -> Result<BorrowOutcome, WorkError<CompositeBorrowError>> {
    member_update::execute(store, txn, request.member_id, email)
        .map_err(|e| e.map_domain(CompositeBorrowError::from))?;
    borrow::execute(store, txn, request).map_err(|e| e.map_domain(CompositeBorrowError::from))
}
