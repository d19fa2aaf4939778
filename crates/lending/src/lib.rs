//! `circulib-lending` — transaction orchestration for the lending domain.
//!
//! The pieces compose as: a workflow (borrow, return, member update) is a
//! unit of work submitted to the [`coordinator::TxnCoordinator`], which owns
//! the transaction lifecycle against a [`circulib_store::StoreClient`]; the
//! [`retry::RetryPolicy`] decides which failures are worth re-running the
//! whole workflow for; the [`service::LendingService`] facade wires all of
//! it together and emits change-feed notifications after commit.

pub mod borrow;
pub mod composite;
pub mod coordinator;
pub mod events;
pub mod member_update;
pub mod overdue;
pub mod retry;
pub mod returns;
pub mod service;


pub use borrow::{BorrowError, BorrowOutcome, BorrowRequest};
pub use composite::CompositeBorrowError;
pub use coordinator::{TxnCoordinator, TxnError, WorkError};
pub use events::{LendingEvent, LOW_STOCK_THRESHOLD};
pub use member_update::UpdateError;
pub use overdue::SweepError;
pub use retry::RetryPolicy;
pub use returns::ReturnError;
pub use service::LendingService;
