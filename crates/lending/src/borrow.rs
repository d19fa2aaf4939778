//! The atomic "borrow a book" workflow.

use chrono::{DateTime, Utc};
use thiserror::Error;

use circulib_catalog::{Book, BOOKS_COLLECTION};
use circulib_core::{BookId, LoanId, MemberId};
use circulib_loans::{Loan, LOANS_COLLECTION};
use circulib_store::{Document, StoreClient, StoreError, TxnHandle};

use crate::coordinator::{TxnError, WorkError};

/// Inputs of the atomic borrow operation.
///
/// The caller supplies `loan_id`: a retried request carries the same
/// identity, so contention-retry can never record the same loan twice.
#[derive(Debug, Clone)]
pub struct BorrowRequest {
    pub member_id: MemberId,
    pub book_id: BookId,
    pub loan_id: LoanId,
    pub borrow_date: DateTime<Utc>,
    /// Defaults to the standard lending period when absent.
    pub due_date: Option<DateTime<Utc>>,
}

/// Failure surface of [`crate::service::LendingService::borrow_book`].
#[derive(Debug, Error)]
pub enum BorrowError {
    #[error("book not found")]
    BookNotFound,

    #[error("no copies of the book are in stock")]
    OutOfStock,

    #[error("invalid due date: {0}")]
    InvalidDueDate(String),

    /// Surfaced only after the retry budget is exhausted; nothing became
    /// durable.
    #[error("borrow conflicted with a concurrent transaction: {0}")]
    Conflict(String),

    /// Durability undetermined; re-check committed state (e.g. via
    /// [`crate::service::LendingService::loan_recorded`]) before any
    /// compensating action.
    #[error("commit not acknowledged within {0:?}; durability undetermined")]
    Timeout(std::time::Duration),

    #[error("transaction aborted by the store: {0}")]
    Aborted(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<TxnError<BorrowError>> for BorrowError {
    fn from(value: TxnError<BorrowError>) -> Self {
        match value {
            TxnError::Domain(error) => error,
            TxnError::Conflict(msg) => BorrowError::Conflict(msg),
            TxnError::Timeout(waited) => BorrowError::Timeout(waited),
            TxnError::Aborted(msg) => BorrowError::Aborted(msg),
            TxnError::Store(error) => BorrowError::Store(error),
        }
    }
}

/// What the borrow unit of work produced.
#[derive(Debug, Clone)]
pub struct BorrowOutcome {
    pub loan: Loan,
    pub remaining_stock: i64,
}

/// The borrow unit of work: check stock, decrement it, insert the loan.
///
/// Check-then-act: the stock check and both writes happen against the same
/// transaction handle, so two concurrent borrowers cannot both observe the
/// last copy and both succeed; the store's conflict detection fails one
/// of them at commit.
pub fn execute<S: StoreClient>(
    store: &S,
    txn: &TxnHandle,
    request: &BorrowRequest,
) -> Result<BorrowOutcome, WorkError<BorrowError>> {
    let document = store
        .read_one(txn, BOOKS_COLLECTION, request.book_id.into())?
        .ok_or(WorkError::Domain(BorrowError::BookNotFound))?;
    let mut book: Book = document.to_typed()?;

    book.checkout_one()
        .map_err(|_| WorkError::Domain(BorrowError::OutOfStock))?;

    let loan = Loan::open(
        request.loan_id,
        request.member_id,
        request.book_id,
        request.borrow_date,
        request.due_date,
    )
    .map_err(|e| WorkError::Domain(BorrowError::InvalidDueDate(e.to_string())))?;

    store.update_one(
        txn,
        BOOKS_COLLECTION,
        Document::from_typed(book.book_id().into(), &book)?,
    )?;
    store.insert_one(
        txn,
        LOANS_COLLECTION,
        Document::from_typed(loan.loan_id().into(), &loan)?,
    )?;

    Ok(BorrowOutcome {
        remaining_stock: book.stock(),
        loan,
    })
}
