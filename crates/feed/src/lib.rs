//! `circulib-feed` — change-feed mechanics (transport only, no domain rules).
//!
//! Consumers subscribe to notifications emitted after committed lending
//! transactions (new loans, low stock). Delivery is best-effort,
//! at-least-once: subscribers must be idempotent, and the store remains the
//! source of truth.

pub mod feed;
pub mod memory;

pub use feed::{ChangeFeed, Subscription};
pub use memory::{InMemoryFeed, InMemoryFeedError};
