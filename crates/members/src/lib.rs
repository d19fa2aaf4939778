//! `circulib-members` — the library membership domain.

pub mod member;

pub use member::{EmailAddress, Member, MEMBERS_COLLECTION};
