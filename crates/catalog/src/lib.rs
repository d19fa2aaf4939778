//! `circulib-catalog` — the book catalog domain.

pub mod book;

pub use book::{Book, BOOKS_COLLECTION};
