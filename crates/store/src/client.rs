//! The store client boundary consumed by the lending core.

use std::sync::Arc;

use uuid::Uuid;

use crate::document::Document;
use crate::error::StoreError;
use crate::options::TxnOptions;

/// Opaque handle of an in-flight transaction.
///
/// All reads and writes that should commit atomically must be issued
/// against the same handle. Handles are store-scoped; presenting a handle
/// to a different store instance is an error.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TxnHandle(u64);

impl TxnHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Collection-style document store with transaction lifecycle control.
///
/// This is the full surface the lending core consumes; engine internals
/// (storage, replication, consensus) stay behind it.
///
/// ## Transaction contract
///
/// - `begin` opens a transaction with an isolation level and a durability
///   policy; both are fixed for the transaction's lifetime.
/// - Reads under snapshot isolation observe a consistent point-in-time
///   view taken at `begin`, plus the transaction's own buffered writes.
/// - `commit` either makes every buffered write durable or none of them.
///   A commit-time write conflict means nothing became durable. An
///   acknowledgment timeout means durability is undetermined.
/// - `abort` discards every buffered write.
///
/// Implementations must be shareable across threads; a blanket impl lifts
/// any client through `Arc`.
pub trait StoreClient: Send + Sync {
    /// Open a transaction.
    fn begin(&self, options: TxnOptions) -> Result<TxnHandle, StoreError>;

    /// Read one document by key within the transaction.
    fn read_one(
        &self,
        txn: &TxnHandle,
        collection: &str,
        key: Uuid,
    ) -> Result<Option<Document>, StoreError>;

    /// Read all documents of a collection within the transaction.
    fn scan(&self, txn: &TxnHandle, collection: &str) -> Result<Vec<Document>, StoreError>;

    /// Buffer an insert. Fails with `DuplicateKey` if the key is already
    /// present in the transaction's view of the collection.
    fn insert_one(
        &self,
        txn: &TxnHandle,
        collection: &str,
        document: Document,
    ) -> Result<(), StoreError>;

    /// Buffer a full-document update. Fails with `DocumentMissing` if the
    /// key is absent from the transaction's view of the collection.
    fn update_one(
        &self,
        txn: &TxnHandle,
        collection: &str,
        document: Document,
    ) -> Result<(), StoreError>;

    /// Commit the transaction, consuming the handle.
    fn commit(&self, txn: TxnHandle) -> Result<(), StoreError>;

    /// Abort the transaction, consuming the handle and discarding its
    /// buffered writes.
    fn abort(&self, txn: TxnHandle) -> Result<(), StoreError>;

    /// Non-transactional read of the latest committed state.
    ///
    /// This is the re-check path after an ambiguous commit outcome.
    fn find_one(&self, collection: &str, key: Uuid) -> Result<Option<Document>, StoreError>;
}

impl<S> StoreClient for Arc<S>
where
    S: StoreClient + ?Sized,
{
    fn begin(&self, options: TxnOptions) -> Result<TxnHandle, StoreError> {
        (**self).begin(options)
    }

    fn read_one(
        &self,
        txn: &TxnHandle,
        collection: &str,
        key: Uuid,
    ) -> Result<Option<Document>, StoreError> {
        (**self).read_one(txn, collection, key)
    }

    fn scan(&self, txn: &TxnHandle, collection: &str) -> Result<Vec<Document>, StoreError> {
        (**self).scan(txn, collection)
    }

    fn insert_one(
        &self,
        txn: &TxnHandle,
        collection: &str,
        document: Document,
    ) -> Result<(), StoreError> {
        (**self).insert_one(txn, collection, document)
    }

    fn update_one(
        &self,
        txn: &TxnHandle,
        collection: &str,
        document: Document,
    ) -> Result<(), StoreError> {
        (**self).update_one(txn, collection, document)
    }

    fn commit(&self, txn: TxnHandle) -> Result<(), StoreError> {
        (**self).commit(txn)
    }

    fn abort(&self, txn: TxnHandle) -> Result<(), StoreError> {
        (**self).abort(txn)
    }

    fn find_one(&self, collection: &str, key: Uuid) -> Result<Option<Document>, StoreError> {
        (**self).find_one(collection, key)
    }
}
