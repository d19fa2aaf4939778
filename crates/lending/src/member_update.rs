//! Member profile updates.

use thiserror::Error;

use circulib_core::MemberId;
use circulib_members::{EmailAddress, Member, MEMBERS_COLLECTION};
use circulib_store::{Document, StoreClient, StoreError, TxnHandle};

use crate::coordinator::{TxnError, WorkError};

/// Failure surface of [`crate::service::LendingService::update_member_email`].
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("member not found")]
    MemberNotFound,

    #[error("invalid email: {0}")]
    InvalidEmail(String),

    #[error("update conflicted with a concurrent transaction: {0}")]
    Conflict(String),

    #[error("commit not acknowledged within {0:?}; durability undetermined")]
    Timeout(std::time::Duration),

    #[error("transaction aborted by the store: {0}")]
    Aborted(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<TxnError<UpdateError>> for UpdateError {
    fn from(value: TxnError<UpdateError>) -> Self {
        match value {
            TxnError::Domain(error) => error,
            TxnError::Conflict(msg) => UpdateError::Conflict(msg),
            TxnError::Timeout(waited) => UpdateError::Timeout(waited),
            TxnError::Aborted(msg) => UpdateError::Aborted(msg),
            TxnError::Store(error) => UpdateError::Store(error),
        }
    }
}

/// The email-update unit of work: a single-document write.
///
/// Not check-then-act on its own, but it still runs inside a transaction
/// so that composing it with other writes (see [`crate::composite`])
/// inherits all-or-nothing semantics.
pub fn execute<S: StoreClient>(
    store: &S,
    txn: &TxnHandle,
    member_id: MemberId,
    email: &EmailAddress,
) -> Result<Member, WorkError<UpdateError>> {
    let document = store
        .read_one(txn, MEMBERS_COLLECTION, member_id.into())?
        .ok_or(WorkError::Domain(UpdateError::MemberNotFound))?;
    let mut member: Member = document.to_typed()?;

    member.change_email(email.clone());

    store.update_one(
        txn,
        MEMBERS_COLLECTION,
        Document::from_typed(member.member_id().into(), &member)?,
    )?;

    Ok(member)
}
