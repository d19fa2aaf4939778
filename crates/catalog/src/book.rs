use serde::{Deserialize, Serialize};

use circulib_core::{BookId, DomainError, DomainResult, Entity};

/// Collection holding book documents.
pub const BOOKS_COLLECTION: &str = "books";

/// A book in the catalog with a count of copies available for lending.
///
/// Invariant: `stock >= 0` at every committed state. Stock is mutated only
/// by loan creation (`checkout_one`) and return processing (`return_one`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    book_id: BookId,
    title: String,
    author: String,
    stock: i64,
}

impl Book {
    /// Create a catalog entry.
    pub fn new(
        book_id: BookId,
        title: impl Into<String>,
        author: impl Into<String>,
        stock: i64,
    ) -> DomainResult<Self> {
        let title = title.into();
        let author = author.into();
        if title.trim().is_empty() {
            return Err(DomainError::validation("title cannot be empty"));
        }
        if author.trim().is_empty() {
            return Err(DomainError::validation("author cannot be empty"));
        }
        if stock < 0 {
            return Err(DomainError::invariant("stock cannot be negative"));
        }
        Ok(Self {
            book_id,
            title,
            author,
            stock,
        })
    }

    pub fn book_id(&self) -> BookId {
        self.book_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn stock(&self) -> i64 {
        self.stock
    }

    /// Whether at least one copy is available for lending.
    pub fn available(&self) -> bool {
        self.stock > 0
    }

    /// Take one copy off the shelf for a new loan.
    ///
    /// This is the check-then-act half of the borrow operation; it must run
    /// inside the same transaction as the loan insert.
    pub fn checkout_one(&mut self) -> DomainResult<()> {
        if self.stock <= 0 {
            return Err(DomainError::invariant("no copies in stock"));
        }
        self.stock -= 1;
        Ok(())
    }

    /// Put a returned copy back on the shelf.
    pub fn return_one(&mut self) {
        self.stock += 1;
    }
}

impl Entity for Book {
    type Id = BookId;

    fn id(&self) -> &Self::Id {
        &self.book_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_book(stock: i64) -> Book {
        Book::new(BookId::new(), "Dune", "Frank Herbert", stock).unwrap()
    }

    #[test]
    fn checkout_decrements_stock() {
        let mut book = test_book(5);
        book.checkout_one().unwrap();
        assert_eq!(book.stock(), 4);
    }

    #[test]
    fn checkout_of_depleted_stock_is_rejected() {
        let mut book = test_book(0);
        let err = book.checkout_one().unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(book.stock(), 0);
    }

    #[test]
    fn return_increments_stock() {
        let mut book = test_book(0);
        book.return_one();
        assert_eq!(book.stock(), 1);
    }

    #[test]
    fn empty_title_is_rejected() {
        let err = Book::new(BookId::new(), "  ", "Frank Herbert", 1).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn negative_initial_stock_is_rejected() {
        let err = Book::new(BookId::new(), "Dune", "Frank Herbert", -1).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let book = test_book(5);
        let json = serde_json::to_value(&book).unwrap();
        assert_eq!(json["stock"], 5);
        assert_eq!(json["title"], "Dune");
        assert!(json.get("book_id").is_some());
    }

    proptest! {
        /// Stock never goes negative, whatever sequence of checkouts and
        /// returns is attempted.
        #[test]
        fn stock_is_never_negative(initial in 0i64..20, ops in proptest::collection::vec(any::<bool>(), 0..40)) {
            let mut book = test_book(initial);
            for checkout in ops {
                if checkout {
                    let _ = book.checkout_one();
                } else {
                    book.return_one();
                }
                prop_assert!(book.stock() >= 0);
            }
        }
    }
}
