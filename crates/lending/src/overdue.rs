//! Overdue sweep: flag ACTIVE loans past their due date.

use chrono::{DateTime, Utc};
use thiserror::Error;

use circulib_core::LoanId;
use circulib_loans::{Loan, LOANS_COLLECTION};
use circulib_store::{Document, StoreClient, StoreError, TxnHandle};

use crate::coordinator::{TxnError, WorkError};

/// Failure surface of [`crate::service::LendingService::sweep_overdue`].
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("sweep conflicted with a concurrent transaction: {0}")]
    Conflict(String),

    #[error("commit not acknowledged within {0:?}; durability undetermined")]
    Timeout(std::time::Duration),

    #[error("transaction aborted by the store: {0}")]
    Aborted(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<TxnError<SweepError>> for SweepError {
    fn from(value: TxnError<SweepError>) -> Self {
        match value {
            TxnError::Domain(error) => error,
            TxnError::Conflict(msg) => SweepError::Conflict(msg),
            TxnError::Timeout(waited) => SweepError::Timeout(waited),
            TxnError::Aborted(msg) => SweepError::Aborted(msg),
            TxnError::Store(error) => SweepError::Store(error),
        }
    }
}

/// The sweep unit of work: one scan, one update per newly-overdue loan.
///
/// Loans that are not ACTIVE or not yet past due are left untouched;
/// `mark_overdue` is the single authority on eligibility.
pub fn execute<S: StoreClient>(
    store: &S,
    txn: &TxnHandle,
    now: DateTime<Utc>,
) -> Result<Vec<LoanId>, WorkError<SweepError>> {
    let mut flagged = Vec::new();

    for document in store.scan(txn, LOANS_COLLECTION)? {
        let mut loan: Loan = document.to_typed()?;
        if loan.mark_overdue(now).is_ok() {
            store.update_one(
                txn,
                LOANS_COLLECTION,
                Document::from_typed(loan.loan_id().into(), &loan)?,
            )?;
            flagged.push(loan.loan_id());
        }
    }

    Ok(flagged)
}
