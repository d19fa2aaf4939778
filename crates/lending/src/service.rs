//! Application facade over the lending workflows.

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use circulib_core::{LoanId, MemberId};
use circulib_feed::ChangeFeed;
use circulib_loans::{Loan, LOANS_COLLECTION};
use circulib_members::EmailAddress;
use circulib_store::{StoreClient, StoreError, TxnOptions};

use crate::borrow::{self, BorrowError, BorrowRequest};
use crate::composite::{self, CompositeBorrowError};
use crate::coordinator::TxnCoordinator;
use crate::events::{LendingEvent, LOW_STOCK_THRESHOLD};
use crate::member_update::{self, UpdateError};
use crate::overdue::{self, SweepError};
use crate::retry::RetryPolicy;
use crate::returns::{self, ReturnError};

/// Entry point for lending operations.
///
/// Every mutating method runs its workflow through the coordinator with
/// the configured retry policy, then publishes change-feed notifications
/// for what committed. Publishing is best-effort: a feed failure is logged
/// and never fails the already-durable workflow.
#[derive(Debug)]
pub struct LendingService<S, F> {
    coordinator: TxnCoordinator<S>,
    retry: RetryPolicy,
    feed: F,
}

impl<S, F> LendingService<S, F> {
    pub fn new(store: S, feed: F) -> Self {
        Self {
            coordinator: TxnCoordinator::new(store),
            retry: RetryPolicy::default(),
            feed,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &S {
        self.coordinator.store()
    }
}

impl<S, F> LendingService<S, F>
where
    S: StoreClient,
    F: ChangeFeed<LendingEvent>,
{
    /// Borrow one copy of a book: atomically checks availability,
    /// decrements stock, and records an ACTIVE loan.
    ///
    /// Runs under snapshot isolation with majority acknowledgment.
    /// Conflicts with concurrent borrowers are retried transparently; a
    /// retry that finds the stock depleted fails with `OutOfStock`.
    #[instrument(
        skip_all,
        fields(
            member_id = %request.member_id,
            book_id = %request.book_id,
            loan_id = %request.loan_id,
        )
    )]
    pub fn borrow_book(&self, request: BorrowRequest) -> Result<Loan, BorrowError> {
        let outcome = self
            .retry
            .run(|| {
                self.coordinator.run(TxnOptions::snapshot(), |store, txn| {
                    borrow::execute(store, txn, &request)
                })
            })
            .map_err(BorrowError::from)?;

        info!(remaining_stock = outcome.remaining_stock, "book borrowed");

        self.publish(LendingEvent::LoanOpened {
            loan_id: outcome.loan.loan_id(),
            member_id: outcome.loan.member_id(),
            book_id: outcome.loan.book_id(),
            occurred_at: outcome.loan.borrow_date(),
        });
        if outcome.remaining_stock < LOW_STOCK_THRESHOLD {
            self.publish(LendingEvent::StockLow {
                book_id: outcome.loan.book_id(),
                stock: outcome.remaining_stock,
                occurred_at: outcome.loan.borrow_date(),
            });
        }

        Ok(outcome.loan)
    }

    /// Return a borrowed copy: closes the loan and restores stock, as one
    /// transaction.
    #[instrument(skip_all, fields(loan_id = %loan_id))]
    pub fn return_book(&self, loan_id: LoanId) -> Result<Loan, ReturnError> {
        let loan = self
            .retry
            .run(|| {
                self.coordinator.run(TxnOptions::snapshot(), |store, txn| {
                    returns::execute(store, txn, loan_id)
                })
            })
            .map_err(ReturnError::from)?;

        info!("book returned");

        self.publish(LendingEvent::LoanReturned {
            loan_id: loan.loan_id(),
            book_id: loan.book_id(),
            occurred_at: Utc::now(),
        });

        Ok(loan)
    }

    /// Update a member's contact email.
    ///
    /// A single-document write: snapshot isolation is unnecessary, so this
    /// runs at the store's default read level.
    #[instrument(skip_all, fields(member_id = %member_id))]
    pub fn update_member_email(
        &self,
        member_id: MemberId,
        new_email: &str,
    ) -> Result<(), UpdateError> {
        let email = EmailAddress::parse(new_email)
            .map_err(|e| UpdateError::InvalidEmail(e.to_string()))?;

        self.retry
            .run(|| {
                self.coordinator.run(TxnOptions::committed(), |store, txn| {
                    member_update::execute(store, txn, member_id, &email)
                })
            })
            .map_err(UpdateError::from)?;

        self.publish(LendingEvent::EmailChanged {
            member_id,
            occurred_at: Utc::now(),
        });

        Ok(())
    }

    /// Email update + borrow as one atomic transaction: either both the
    /// email change and the loan insertion are durable, or neither is.
    #[instrument(
        skip_all,
        fields(
            member_id = %request.member_id,
            book_id = %request.book_id,
            loan_id = %request.loan_id,
        )
    )]
    pub fn update_email_and_borrow(
        &self,
        request: BorrowRequest,
        new_email: &str,
    ) -> Result<Loan, CompositeBorrowError> {
        let email = EmailAddress::parse(new_email)
            .map_err(|e| CompositeBorrowError::InvalidEmail(e.to_string()))?;

        let outcome = self
            .retry
            .run(|| {
                self.coordinator.run(TxnOptions::snapshot(), |store, txn| {
                    composite::execute(store, txn, &request, &email)
                })
            })
            .map_err(CompositeBorrowError::from)?;

        info!(remaining_stock = outcome.remaining_stock, "email updated and book borrowed");

        self.publish(LendingEvent::EmailChanged {
            member_id: outcome.loan.member_id(),
            occurred_at: outcome.loan.borrow_date(),
        });
        self.publish(LendingEvent::LoanOpened {
            loan_id: outcome.loan.loan_id(),
            member_id: outcome.loan.member_id(),
            book_id: outcome.loan.book_id(),
            occurred_at: outcome.loan.borrow_date(),
        });
        if outcome.remaining_stock < LOW_STOCK_THRESHOLD {
            self.publish(LendingEvent::StockLow {
                book_id: outcome.loan.book_id(),
                stock: outcome.remaining_stock,
                occurred_at: outcome.loan.borrow_date(),
            });
        }

        Ok(outcome.loan)
    }

    /// Flag every ACTIVE loan past its due date as OVERDUE, in one
    /// transaction. Returns the ids of the loans that were flagged.
    #[instrument(skip_all)]
    pub fn sweep_overdue(&self, now: DateTime<Utc>) -> Result<Vec<LoanId>, SweepError> {
        let flagged = self
            .retry
            .run(|| {
                self.coordinator
                    .run(TxnOptions::snapshot(), |store, txn| overdue::execute(store, txn, now))
            })
            .map_err(SweepError::from)?;

        if !flagged.is_empty() {
            info!(count = flagged.len(), "loans flagged overdue");
        }
        Ok(flagged)
    }

    /// Whether a loan is present in committed state.
    ///
    /// The re-check path after an ambiguous `Timeout` outcome: callers
    /// must consult actual state rather than blindly retry.
    pub fn loan_recorded(&self, loan_id: LoanId) -> Result<bool, StoreError> {
        Ok(self
            .store()
            .find_one(LOANS_COLLECTION, loan_id.into())?
            .is_some())
    }

    fn publish(&self, event: LendingEvent) {
        if let Err(error) = self.feed.publish(event) {
            warn!(?error, "change feed publish failed");
        }
    }
}
