//! Throughput of the borrow workflow over the in-memory store.

use std::sync::Arc;

use chrono::Utc;
use criterion::{criterion_group, criterion_main, Criterion};

use circulib_catalog::{Book, BOOKS_COLLECTION};
use circulib_core::{BookId, LoanId, MemberId};
use circulib_feed::InMemoryFeed;
use circulib_lending::{BorrowRequest, LendingService};
use circulib_store::{Document, InMemoryDocumentStore};

fn borrow_flow(c: &mut Criterion) {
    let store = Arc::new(InMemoryDocumentStore::new());
    let feed = Arc::new(InMemoryFeed::new());
    let service = LendingService::new(store.clone(), feed);

    let book = Book::new(BookId::new(), "Dune", "Frank Herbert", i64::MAX).unwrap();
    let book_id = book.book_id();
    store
        .seed(
            BOOKS_COLLECTION,
            Document::from_typed(book_id.into(), &book).unwrap(),
        )
        .unwrap();
    let member_id = MemberId::new();

    c.bench_function("borrow_book", |b| {
        b.iter(|| {
            let request = BorrowRequest {
                member_id,
                book_id,
                loan_id: LoanId::new(),
                borrow_date: Utc::now(),
                due_date: None,
            };
            service.borrow_book(request).unwrap()
        })
    });
}

criterion_group!(benches, borrow_flow);
criterion_main!(benches);
