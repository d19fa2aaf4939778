//! Change-feed notifications emitted after committed lending transactions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use circulib_core::{BookId, LoanId, MemberId};

/// Stock level at which a `StockLow` warning accompanies a borrow.
pub const LOW_STOCK_THRESHOLD: i64 = 2;

/// A committed change worth telling subscribers about.
///
/// Events are emitted only after the originating transaction committed;
/// an aborted workflow is invisible on the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LendingEvent {
    LoanOpened {
        loan_id: LoanId,
        member_id: MemberId,
        book_id: BookId,
        occurred_at: DateTime<Utc>,
    },
    LoanReturned {
        loan_id: LoanId,
        book_id: BookId,
        occurred_at: DateTime<Utc>,
    },
    StockLow {
        book_id: BookId,
        stock: i64,
        occurred_at: DateTime<Utc>,
    },
    EmailChanged {
        member_id: MemberId,
        occurred_at: DateTime<Utc>,
    },
}

impl LendingEvent {
    /// Stable event name/type identifier.
    pub fn event_type(&self) -> &'static str {
        match self {
            LendingEvent::LoanOpened { .. } => "loan.opened",
            LendingEvent::LoanReturned { .. } => "loan.returned",
            LendingEvent::StockLow { .. } => "book.stock_low",
            LendingEvent::EmailChanged { .. } => "member.email_changed",
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LendingEvent::LoanOpened { occurred_at, .. }
            | LendingEvent::LoanReturned { occurred_at, .. }
            | LendingEvent::StockLow { occurred_at, .. }
            | LendingEvent::EmailChanged { occurred_at, .. } => *occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_carry_a_snake_case_type_tag() {
        let event = LendingEvent::StockLow {
            book_id: BookId::new(),
            stock: 1,
            occurred_at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "stock_low");
        assert_eq!(event.event_type(), "book.stock_low");
    }
}
