use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use circulib_core::{BookId, DomainError, DomainResult, Entity, LoanId, MemberId};

/// Collection holding loan documents.
pub const LOANS_COLLECTION: &str = "loans";

/// Standard lending period applied when no explicit due date is given.
pub const LOAN_PERIOD_DAYS: i64 = 14;

/// Due date implied by the standard lending period.
pub fn default_due_date(borrow_date: DateTime<Utc>) -> DateTime<Utc> {
    borrow_date + Duration::days(LOAN_PERIOD_DAYS)
}

/// Lifecycle status of a loan, stored in SCREAMING_SNAKE_CASE on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    Active,
    Returned,
    Overdue,
}

/// A loan of one copy of a book to a member.
///
/// A loan comes into existence only inside the atomic borrow transaction,
/// jointly with the stock decrement on the referenced book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    loan_id: LoanId,
    member_id: MemberId,
    book_id: BookId,
    borrow_date: DateTime<Utc>,
    due_date: DateTime<Utc>,
    status: LoanStatus,
}

impl Loan {
    /// Open a new ACTIVE loan.
    ///
    /// When `due_date` is `None` the standard lending period applies.
    /// A due date at or before the borrow date is rejected.
    pub fn open(
        loan_id: LoanId,
        member_id: MemberId,
        book_id: BookId,
        borrow_date: DateTime<Utc>,
        due_date: Option<DateTime<Utc>>,
    ) -> DomainResult<Self> {
        let due_date = due_date.unwrap_or_else(|| default_due_date(borrow_date));
        if due_date <= borrow_date {
            return Err(DomainError::validation(format!(
                "due date {due_date} must be after borrow date {borrow_date}"
            )));
        }
        Ok(Self {
            loan_id,
            member_id,
            book_id,
            borrow_date,
            due_date,
            status: LoanStatus::Active,
        })
    }

    pub fn loan_id(&self) -> LoanId {
        self.loan_id
    }

    pub fn member_id(&self) -> MemberId {
        self.member_id
    }

    pub fn book_id(&self) -> BookId {
        self.book_id
    }

    pub fn borrow_date(&self) -> DateTime<Utc> {
        self.borrow_date
    }

    pub fn due_date(&self) -> DateTime<Utc> {
        self.due_date
    }

    pub fn status(&self) -> LoanStatus {
        self.status
    }

    /// Whether the copy is still out (ACTIVE or flagged OVERDUE).
    pub fn is_outstanding(&self) -> bool {
        matches!(self.status, LoanStatus::Active | LoanStatus::Overdue)
    }

    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        now > self.due_date
    }

    /// Close the loan as returned.
    ///
    /// Valid from ACTIVE or OVERDUE; returning a returned loan is rejected.
    pub fn mark_returned(&mut self) -> DomainResult<()> {
        if !self.is_outstanding() {
            return Err(DomainError::invariant("loan is not outstanding"));
        }
        self.status = LoanStatus::Returned;
        Ok(())
    }

    /// Flag an ACTIVE loan whose due date has passed.
    pub fn mark_overdue(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != LoanStatus::Active {
            return Err(DomainError::invariant("only active loans can become overdue"));
        }
        if !self.is_past_due(now) {
            return Err(DomainError::invariant("loan is not past its due date"));
        }
        self.status = LoanStatus::Overdue;
        Ok(())
    }
}

impl Entity for Loan {
    type Id = LoanId;

    fn id(&self) -> &Self::Id {
        &self.loan_id
    }
}
