//! In-memory transactional document store.
//!
//! Intended for tests/dev. Not optimized for performance: snapshot
//! isolation is implemented by cloning the committed state at `begin`.
//!
//! Concurrency control is first-committer-wins: every buffered write
//! remembers the document version it was based on, and commit validates
//! those versions against the committed state before applying anything.
//! Durability is modeled with a configurable replica count: when the
//! required acknowledgment exceeds the reachable replicas, the commit
//! applies locally and reports a timeout, reproducing the "applied but
//! unacknowledged" ambiguity of a real replicated store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use serde_json::Value as JsonValue;
use tracing::debug;
use uuid::Uuid;

use crate::client::{StoreClient, TxnHandle};
use crate::document::Document;
use crate::error::StoreError;
use crate::options::{Acknowledgment, DurabilityPolicy, IsolationLevel, TxnOptions};

type Collections = HashMap<String, HashMap<Uuid, VersionedDocument>>;

#[derive(Debug, Clone)]
struct VersionedDocument {
    version: u64,
    body: JsonValue,
}

#[derive(Debug, Clone)]
enum PendingWrite {
    Insert { body: JsonValue },
    Update { base_version: u64, body: JsonValue },
}

impl PendingWrite {
    fn body(&self) -> &JsonValue {
        match self {
            PendingWrite::Insert { body } => body,
            PendingWrite::Update { body, .. } => body,
        }
    }
}

#[derive(Debug)]
struct TxnState {
    isolation: IsolationLevel,
    durability: DurabilityPolicy,
    /// Point-in-time view taken at `begin` (snapshot isolation only).
    snapshot: Collections,
    /// Buffered writes, keyed by (collection, document key).
    writes: HashMap<(String, Uuid), PendingWrite>,
}

/// In-memory document store with transactions.
#[derive(Debug)]
pub struct InMemoryDocumentStore {
    committed: RwLock<Collections>,
    txns: Mutex<HashMap<u64, TxnState>>,
    next_txn: AtomicU64,
    replica_total: u32,
    replica_reachable: u32,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentStore {
    /// Single-node store: every acknowledgment level is satisfiable.
    pub fn new() -> Self {
        Self::with_replicas(1, 1)
    }

    /// Store that models a replica set of `total` nodes of which only
    /// `reachable` respond to acknowledgment requests.
    pub fn with_replicas(total: u32, reachable: u32) -> Self {
        debug_assert!(reachable <= total);
        Self {
            committed: RwLock::new(HashMap::new()),
            txns: Mutex::new(HashMap::new()),
            next_txn: AtomicU64::new(1),
            replica_total: total.max(1),
            replica_reachable: reachable,
        }
    }

    /// Insert a document directly into committed state, bypassing the
    /// transaction machinery. Test/dev convenience.
    pub fn seed(&self, collection: &str, document: Document) -> Result<(), StoreError> {
        let mut committed = self.committed.write().map_err(poisoned)?;
        committed
            .entry(collection.to_string())
            .or_default()
            .insert(
                document.id,
                VersionedDocument {
                    version: 1,
                    body: document.body,
                },
            );
        Ok(())
    }

    fn required_acks(&self, ack: Acknowledgment) -> u32 {
        match ack {
            Acknowledgment::Majority => self.replica_total / 2 + 1,
            Acknowledgment::Count(n) => n,
        }
    }

    /// The document as the transaction would see it, ignoring its own
    /// buffered writes.
    fn view(
        &self,
        state: &TxnState,
        collection: &str,
        key: Uuid,
    ) -> Result<Option<VersionedDocument>, StoreError> {
        match state.isolation {
            IsolationLevel::Snapshot => Ok(state
                .snapshot
                .get(collection)
                .and_then(|c| c.get(&key))
                .cloned()),
            IsolationLevel::Committed => {
                let committed = self.committed.read().map_err(poisoned)?;
                Ok(committed.get(collection).and_then(|c| c.get(&key)).cloned())
            }
        }
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Internal("lock poisoned".to_string())
}

fn inactive(txn: &TxnHandle) -> StoreError {
    StoreError::Aborted(format!("transaction {} is not active", txn.raw()))
}

impl StoreClient for InMemoryDocumentStore {
    fn begin(&self, options: TxnOptions) -> Result<TxnHandle, StoreError> {
        let id = self.next_txn.fetch_add(1, Ordering::SeqCst);

        let snapshot = match options.isolation {
            IsolationLevel::Snapshot => self.committed.read().map_err(poisoned)?.clone(),
            IsolationLevel::Committed => HashMap::new(),
        };

        self.txns.lock().map_err(poisoned)?.insert(
            id,
            TxnState {
                isolation: options.isolation,
                durability: options.durability,
                snapshot,
                writes: HashMap::new(),
            },
        );

        debug!(txn = id, isolation = ?options.isolation, "transaction begun");
        Ok(TxnHandle::from_raw(id))
    }

    fn read_one(
        &self,
        txn: &TxnHandle,
        collection: &str,
        key: Uuid,
    ) -> Result<Option<Document>, StoreError> {
        let txns = self.txns.lock().map_err(poisoned)?;
        let state = txns.get(&txn.raw()).ok_or_else(|| inactive(txn))?;

        // Read-your-own-writes inside the transaction.
        if let Some(write) = state.writes.get(&(collection.to_string(), key)) {
            return Ok(Some(Document::new(key, write.body().clone())));
        }

        Ok(self
            .view(state, collection, key)?
            .map(|doc| Document::new(key, doc.body)))
    }

    fn scan(&self, txn: &TxnHandle, collection: &str) -> Result<Vec<Document>, StoreError> {
        let txns = self.txns.lock().map_err(poisoned)?;
        let state = txns.get(&txn.raw()).ok_or_else(|| inactive(txn))?;

        let mut merged: HashMap<Uuid, JsonValue> = match state.isolation {
            IsolationLevel::Snapshot => state
                .snapshot
                .get(collection)
                .map(|c| c.iter().map(|(k, v)| (*k, v.body.clone())).collect())
                .unwrap_or_default(),
            IsolationLevel::Committed => {
                let committed = self.committed.read().map_err(poisoned)?;
                committed
                    .get(collection)
                    .map(|c| c.iter().map(|(k, v)| (*k, v.body.clone())).collect())
                    .unwrap_or_default()
            }
        };

        for ((coll, key), write) in &state.writes {
            if coll == collection {
                merged.insert(*key, write.body().clone());
            }
        }

        let mut documents: Vec<Document> = merged
            .into_iter()
            .map(|(id, body)| Document::new(id, body))
            .collect();
        documents.sort_by_key(|d| d.id);
        Ok(documents)
    }

    fn insert_one(
        &self,
        txn: &TxnHandle,
        collection: &str,
        document: Document,
    ) -> Result<(), StoreError> {
        let mut txns = self.txns.lock().map_err(poisoned)?;
        let state = txns.get_mut(&txn.raw()).ok_or_else(|| inactive(txn))?;

        let entry = (collection.to_string(), document.id);
        let duplicate = state.writes.contains_key(&entry)
            || self.view(state, collection, document.id)?.is_some();
        if duplicate {
            return Err(StoreError::DuplicateKey {
                collection: collection.to_string(),
                key: document.id,
            });
        }

        state.writes.insert(
            entry,
            PendingWrite::Insert {
                body: document.body,
            },
        );
        Ok(())
    }

    fn update_one(
        &self,
        txn: &TxnHandle,
        collection: &str,
        document: Document,
    ) -> Result<(), StoreError> {
        let mut txns = self.txns.lock().map_err(poisoned)?;
        let state = txns.get_mut(&txn.raw()).ok_or_else(|| inactive(txn))?;

        let entry = (collection.to_string(), document.id);
        if let Some(existing) = state.writes.get_mut(&entry) {
            // Second write to the same document within the transaction:
            // replace the buffered body, keep the original base version.
            match existing {
                PendingWrite::Insert { body } | PendingWrite::Update { body, .. } => {
                    *body = document.body;
                }
            }
            return Ok(());
        }

        match self.view(state, collection, document.id)? {
            Some(current) => {
                state.writes.insert(
                    entry,
                    PendingWrite::Update {
                        base_version: current.version,
                        body: document.body,
                    },
                );
                Ok(())
            }
            None => Err(StoreError::DocumentMissing {
                collection: collection.to_string(),
                key: document.id,
            }),
        }
    }

    fn commit(&self, txn: TxnHandle) -> Result<(), StoreError> {
        let state = self
            .txns
            .lock()
            .map_err(poisoned)?
            .remove(&txn.raw())
            .ok_or_else(|| inactive(&txn))?;

        let mut committed = self.committed.write().map_err(poisoned)?;

        // First-committer-wins: validate every buffered write against the
        // committed state before applying anything.
        for ((coll, key), write) in &state.writes {
            let current = committed.get(coll).and_then(|c| c.get(key));
            match write {
                PendingWrite::Insert { .. } => {
                    if current.is_some() {
                        debug!(txn = txn.raw(), %key, collection = %coll, "commit conflict");
                        return Err(StoreError::Conflict(format!(
                            "concurrent insert of {key} into '{coll}'"
                        )));
                    }
                }
                PendingWrite::Update { base_version, .. } => match current {
                    Some(v) if v.version == *base_version => {}
                    Some(v) => {
                        debug!(txn = txn.raw(), %key, collection = %coll, "commit conflict");
                        return Err(StoreError::Conflict(format!(
                            "document {key} in '{coll}' was modified by a concurrent \
                             transaction (version {}, expected {base_version})",
                            v.version
                        )));
                    }
                    None => {
                        return Err(StoreError::Conflict(format!(
                            "document {key} in '{coll}' disappeared under the transaction"
                        )));
                    }
                },
            }
        }

        for ((coll, key), write) in state.writes.iter() {
            let collection = committed.entry(coll.clone()).or_default();
            match write {
                PendingWrite::Insert { body } => {
                    collection.insert(
                        *key,
                        VersionedDocument {
                            version: 1,
                            body: body.clone(),
                        },
                    );
                }
                PendingWrite::Update { base_version, body } => {
                    collection.insert(
                        *key,
                        VersionedDocument {
                            version: base_version + 1,
                            body: body.clone(),
                        },
                    );
                }
            }
        }

        // Durability: writes are applied locally either way; whether the
        // commit counts as acknowledged depends on reachable replicas.
        if !state.writes.is_empty() {
            let required = self.required_acks(state.durability.ack);
            if required > self.replica_reachable {
                debug!(
                    txn = txn.raw(),
                    required,
                    reachable = self.replica_reachable,
                    "commit applied but unacknowledged"
                );
                return Err(StoreError::Timeout(state.durability.max_wait));
            }
        }

        debug!(txn = txn.raw(), writes = state.writes.len(), "transaction committed");
        Ok(())
    }

    fn abort(&self, txn: TxnHandle) -> Result<(), StoreError> {
        self.txns
            .lock()
            .map_err(poisoned)?
            .remove(&txn.raw())
            .ok_or_else(|| inactive(&txn))?;
        debug!(txn = txn.raw(), "transaction aborted");
        Ok(())
    }

    fn find_one(&self, collection: &str, key: Uuid) -> Result<Option<Document>, StoreError> {
        let committed = self.committed.read().map_err(poisoned)?;
        Ok(committed
            .get(collection)
            .and_then(|c| c.get(&key))
            .map(|doc| Document::new(key, doc.body.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BOOKS: &str = "books";

    fn doc(key: Uuid, stock: i64) -> Document {
        Document::new(key, json!({ "stock": stock }))
    }

    #[test]
    fn committed_insert_is_visible_to_later_reads() {
        let store = InMemoryDocumentStore::new();
        let key = Uuid::now_v7();

        let txn = store.begin(TxnOptions::snapshot()).unwrap();
        store.insert_one(&txn, BOOKS, doc(key, 5)).unwrap();
        store.commit(txn).unwrap();

        let found = store.find_one(BOOKS, key).unwrap().unwrap();
        assert_eq!(found.body["stock"], 5);
    }

    #[test]
    fn transaction_reads_its_own_buffered_writes() {
        let store = InMemoryDocumentStore::new();
        let key = Uuid::now_v7();

        let txn = store.begin(TxnOptions::snapshot()).unwrap();
        store.insert_one(&txn, BOOKS, doc(key, 5)).unwrap();

        let seen = store.read_one(&txn, BOOKS, key).unwrap().unwrap();
        assert_eq!(seen.body["stock"], 5);

        // Nothing is durable before commit.
        assert!(store.find_one(BOOKS, key).unwrap().is_none());
        store.abort(txn).unwrap();
    }

    #[test]
    fn snapshot_reads_are_unaffected_by_concurrent_commits() {
        let store = InMemoryDocumentStore::new();
        let key = Uuid::now_v7();
        store.seed(BOOKS, doc(key, 5)).unwrap();

        let reader = store.begin(TxnOptions::snapshot()).unwrap();

        let writer = store.begin(TxnOptions::snapshot()).unwrap();
        store.update_one(&writer, BOOKS, doc(key, 4)).unwrap();
        store.commit(writer).unwrap();

        let seen = store.read_one(&reader, BOOKS, key).unwrap().unwrap();
        assert_eq!(seen.body["stock"], 5);
        store.abort(reader).unwrap();
    }

    #[test]
    fn committed_isolation_reads_the_latest_state() {
        let store = InMemoryDocumentStore::new();
        let key = Uuid::now_v7();
        store.seed(BOOKS, doc(key, 5)).unwrap();

        let reader = store.begin(TxnOptions::committed()).unwrap();

        let writer = store.begin(TxnOptions::snapshot()).unwrap();
        store.update_one(&writer, BOOKS, doc(key, 4)).unwrap();
        store.commit(writer).unwrap();

        let seen = store.read_one(&reader, BOOKS, key).unwrap().unwrap();
        assert_eq!(seen.body["stock"], 4);
        store.abort(reader).unwrap();
    }

    #[test]
    fn second_committer_of_overlapping_update_conflicts() {
        let store = InMemoryDocumentStore::new();
        let key = Uuid::now_v7();
        store.seed(BOOKS, doc(key, 1)).unwrap();

        let first = store.begin(TxnOptions::snapshot()).unwrap();
        let second = store.begin(TxnOptions::snapshot()).unwrap();

        store.update_one(&first, BOOKS, doc(key, 0)).unwrap();
        store.update_one(&second, BOOKS, doc(key, 0)).unwrap();

        store.commit(first).unwrap();
        let err = store.commit(second).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // The losing transaction left no trace.
        let found = store.find_one(BOOKS, key).unwrap().unwrap();
        assert_eq!(found.body["stock"], 0);
    }

    #[test]
    fn concurrent_inserts_of_the_same_key_conflict() {
        let store = InMemoryDocumentStore::new();
        let key = Uuid::now_v7();

        let first = store.begin(TxnOptions::snapshot()).unwrap();
        let second = store.begin(TxnOptions::snapshot()).unwrap();

        store.insert_one(&first, BOOKS, doc(key, 1)).unwrap();
        store.insert_one(&second, BOOKS, doc(key, 1)).unwrap();

        store.commit(first).unwrap();
        assert!(matches!(
            store.commit(second).unwrap_err(),
            StoreError::Conflict(_)
        ));
    }

    #[test]
    fn insert_of_existing_key_is_a_duplicate() {
        let store = InMemoryDocumentStore::new();
        let key = Uuid::now_v7();
        store.seed(BOOKS, doc(key, 1)).unwrap();

        let txn = store.begin(TxnOptions::snapshot()).unwrap();
        let err = store.insert_one(&txn, BOOKS, doc(key, 1)).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));
        store.abort(txn).unwrap();
    }

    #[test]
    fn update_of_missing_document_is_rejected() {
        let store = InMemoryDocumentStore::new();
        let txn = store.begin(TxnOptions::snapshot()).unwrap();
        let err = store
            .update_one(&txn, BOOKS, doc(Uuid::now_v7(), 1))
            .unwrap_err();
        assert!(matches!(err, StoreError::DocumentMissing { .. }));
        store.abort(txn).unwrap();
    }

    #[test]
    fn abort_discards_buffered_writes() {
        let store = InMemoryDocumentStore::new();
        let key = Uuid::now_v7();
        store.seed(BOOKS, doc(key, 5)).unwrap();

        let txn = store.begin(TxnOptions::snapshot()).unwrap();
        store.update_one(&txn, BOOKS, doc(key, 4)).unwrap();
        store.abort(txn).unwrap();

        let found = store.find_one(BOOKS, key).unwrap().unwrap();
        assert_eq!(found.body["stock"], 5);
    }

    #[test]
    fn operations_on_finished_transactions_are_rejected() {
        let store = InMemoryDocumentStore::new();
        let txn = store.begin(TxnOptions::snapshot()).unwrap();
        store.commit(txn).unwrap();

        assert!(matches!(
            store.read_one(&txn, BOOKS, Uuid::now_v7()).unwrap_err(),
            StoreError::Aborted(_)
        ));
        assert!(matches!(store.abort(txn).unwrap_err(), StoreError::Aborted(_)));
    }

    #[test]
    fn unacknowledged_majority_times_out_but_applies() {
        // Three replicas, only one reachable: majority (2) cannot ack.
        let store = InMemoryDocumentStore::with_replicas(3, 1);
        let key = Uuid::now_v7();

        let txn = store.begin(TxnOptions::snapshot()).unwrap();
        store.insert_one(&txn, BOOKS, doc(key, 5)).unwrap();
        let err = store.commit(txn).unwrap_err();
        assert!(matches!(err, StoreError::Timeout(_)));

        // Durability undetermined from the caller's view; this store's
        // behavior is "applied locally", so a re-read observes the write.
        assert!(store.find_one(BOOKS, key).unwrap().is_some());
    }

    #[test]
    fn fire_and_forget_commit_never_times_out() {
        let store = InMemoryDocumentStore::with_replicas(3, 0);
        let key = Uuid::now_v7();

        let txn = store
            .begin(TxnOptions::snapshot().with_durability(DurabilityPolicy::count(
                0,
                std::time::Duration::from_secs(1),
            )))
            .unwrap();
        store.insert_one(&txn, BOOKS, doc(key, 5)).unwrap();
        store.commit(txn).unwrap();
    }

    #[test]
    fn read_only_commit_needs_no_acknowledgment() {
        let store = InMemoryDocumentStore::with_replicas(3, 1);
        let txn = store.begin(TxnOptions::snapshot()).unwrap();
        store.commit(txn).unwrap();
    }

    #[test]
    fn scan_merges_snapshot_and_buffered_writes() {
        let store = InMemoryDocumentStore::new();
        let seeded = Uuid::now_v7();
        store.seed(BOOKS, doc(seeded, 5)).unwrap();

        let txn = store.begin(TxnOptions::snapshot()).unwrap();
        store.update_one(&txn, BOOKS, doc(seeded, 4)).unwrap();
        let inserted = Uuid::now_v7();
        store.insert_one(&txn, BOOKS, doc(inserted, 1)).unwrap();

        let documents = store.scan(&txn, BOOKS).unwrap();
        assert_eq!(documents.len(), 2);
        let by_id = |id| {
            documents
                .iter()
                .find(|d| d.id == id)
                .map(|d| d.body["stock"].clone())
        };
        assert_eq!(by_id(seeded).unwrap(), 4);
        assert_eq!(by_id(inserted).unwrap(), 1);
        store.abort(txn).unwrap();
    }
}
