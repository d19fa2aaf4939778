//! `circulib-loans` — loan records and their lifecycle.

pub mod loan;

pub use loan::{default_due_date, Loan, LoanStatus, LOANS_COLLECTION, LOAN_PERIOD_DAYS};
