//! The symmetric "return a book" workflow.

use thiserror::Error;

use circulib_catalog::{Book, BOOKS_COLLECTION};
use circulib_core::LoanId;
use circulib_loans::{Loan, LOANS_COLLECTION};
use circulib_store::{Document, StoreClient, StoreError, TxnHandle};

use crate::coordinator::{TxnError, WorkError};

/// Failure surface of [`crate::service::LendingService::return_book`].
#[derive(Debug, Error)]
pub enum ReturnError {
    #[error("loan not found")]
    LoanNotFound,

    #[error("loan is not outstanding")]
    LoanNotOutstanding,

    #[error("book referenced by the loan was not found")]
    BookMissing,

    #[error("return conflicted with a concurrent transaction: {0}")]
    Conflict(String),

    #[error("commit not acknowledged within {0:?}; durability undetermined")]
    Timeout(std::time::Duration),

    #[error("transaction aborted by the store: {0}")]
    Aborted(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<TxnError<ReturnError>> for ReturnError {
    fn from(value: TxnError<ReturnError>) -> Self {
        match value {
            TxnError::Domain(error) => error,
            TxnError::Conflict(msg) => ReturnError::Conflict(msg),
            TxnError::Timeout(waited) => ReturnError::Timeout(waited),
            TxnError::Aborted(msg) => ReturnError::Aborted(msg),
            TxnError::Store(error) => ReturnError::Store(error),
        }
    }
}

/// The return unit of work: close the loan, put the copy back on the
/// shelf. Same atomicity pattern as borrow: both writes or neither.
pub fn execute<S: StoreClient>(
    store: &S,
    txn: &TxnHandle,
    loan_id: LoanId,
) -> Result<Loan, WorkError<ReturnError>> {
    let document = store
        .read_one(txn, LOANS_COLLECTION, loan_id.into())?
        .ok_or(WorkError::Domain(ReturnError::LoanNotFound))?;
    let mut loan: Loan = document.to_typed()?;

    loan.mark_returned()
        .map_err(|_| WorkError::Domain(ReturnError::LoanNotOutstanding))?;

    let document = store
        .read_one(txn, BOOKS_COLLECTION, loan.book_id().into())?
        .ok_or(WorkError::Domain(ReturnError::BookMissing))?;
    let mut book: Book = document.to_typed()?;
    book.return_one();

    store.update_one(
        txn,
        BOOKS_COLLECTION,
        Document::from_typed(book.book_id().into(), &book)?,
    )?;
    store.update_one(
        txn,
        LOANS_COLLECTION,
        Document::from_typed(loan.loan_id().into(), &loan)?,
    )?;

    Ok(loan)
}
