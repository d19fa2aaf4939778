//! Transaction execution pipeline (application-level orchestration).
//!
//! The coordinator owns the transaction lifecycle around a unit of work:
//!
//! ```text
//! begin(options)
//!   ↓
//! unit_of_work(store, txn)      reads/writes against the handle
//!   ↓ domain failure            → abort, propagate, never retried
//!   ↓ success                   → commit
//!       commit conflict         → nothing durable, safe to retry
//!       commit ack timeout      → durability undetermined, re-check required
//! ```
//!
//! A scoped guard guarantees `abort` runs on every non-commit exit path,
//! including a panic unwinding out of the unit of work.

use circulib_store::{StoreClient, StoreError, TxnHandle, TxnOptions};
use tracing::{debug, warn};

/// Failure inside a unit of work.
#[derive(Debug)]
pub enum WorkError<E> {
    /// Deterministic domain failure. The transaction is aborted and the
    /// failure propagates as-is; retrying would fail the same way.
    Domain(E),
    /// A store operation failed mid-work.
    Store(StoreError),
}

impl<E> From<StoreError> for WorkError<E> {
    fn from(value: StoreError) -> Self {
        WorkError::Store(value)
    }
}

impl<E> WorkError<E> {
    /// Shorthand for rejecting the unit of work with a domain failure.
    pub fn domain(error: E) -> Self {
        WorkError::Domain(error)
    }

    /// Re-wrap the domain failure type, e.g. when composing units of work
    /// with different error enums inside one transaction.
    pub fn map_domain<F>(self, f: impl FnOnce(E) -> F) -> WorkError<F> {
        match self {
            WorkError::Domain(e) => WorkError::Domain(f(e)),
            WorkError::Store(e) => WorkError::Store(e),
        }
    }
}

/// Classified outcome of one transactional workflow execution.
#[derive(Debug)]
pub enum TxnError<E> {
    /// The unit of work rejected the operation. Zero durable effects.
    Domain(E),
    /// A concurrent transaction won a write-write race. Zero durable
    /// effects, so the whole workflow is safe to retry from scratch.
    Conflict(String),
    /// Commit acknowledgment timed out; the mutation may or may not have
    /// been applied. Never retried automatically; the caller must re-read
    /// committed state to learn the actual outcome.
    Timeout(std::time::Duration),
    /// The store aborted the transaction (expired handle, infrastructure
    /// abort).
    Aborted(String),
    /// Any other store failure.
    Store(StoreError),
}

impl<E> TxnError<E> {
    fn from_store(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => TxnError::Conflict(msg),
            StoreError::Timeout(waited) => TxnError::Timeout(waited),
            StoreError::Aborted(msg) => TxnError::Aborted(msg),
            other => TxnError::Store(other),
        }
    }
}

/// Runs units of work inside store transactions.
///
/// Exactly one durable state change happens per successful `run`; zero on
/// any abort path. The coordinator never retries; classification of what
/// is retryable lives in [`crate::retry::RetryPolicy`].
#[derive(Debug)]
pub struct TxnCoordinator<S> {
    store: S,
}

impl<S> TxnCoordinator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S: StoreClient> TxnCoordinator<S> {
    /// Execute `unit_of_work` inside a transaction begun with `options`.
    ///
    /// The unit of work must issue every read and write against the handle
    /// it is given, and must not commit or abort itself.
    pub fn run<T, E, F>(&self, options: TxnOptions, unit_of_work: F) -> Result<T, TxnError<E>>
    where
        F: FnOnce(&S, &TxnHandle) -> Result<T, WorkError<E>>,
    {
        let handle = self.store.begin(options).map_err(TxnError::from_store)?;
        let mut scope = TxnScope {
            store: &self.store,
            handle: Some(handle),
        };

        match unit_of_work(&self.store, &handle) {
            Ok(value) => {
                // The commit consumes the handle whatever its outcome; the
                // guard must not abort after this point.
                scope.disarm();
                self.store.commit(handle).map_err(TxnError::from_store)?;
                debug!(txn = handle.raw(), "unit of work committed");
                Ok(value)
            }
            Err(WorkError::Domain(error)) => Err(TxnError::Domain(error)),
            Err(WorkError::Store(error)) => Err(TxnError::from_store(error)),
        }
    }
}

/// Scoped transaction guard: aborts on drop unless disarmed.
struct TxnScope<'a, S: StoreClient> {
    store: &'a S,
    handle: Option<TxnHandle>,
}

impl<S: StoreClient> TxnScope<'_, S> {
    fn disarm(&mut self) {
        self.handle = None;
    }
}

impl<S: StoreClient> Drop for TxnScope<'_, S> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(error) = self.store.abort(handle) {
                warn!(txn = handle.raw(), %error, "abort on scope exit failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::Mutex;

    use circulib_store::{Document, InMemoryDocumentStore};
    use serde_json::json;
    use uuid::Uuid;

    fn seeded_store(key: Uuid) -> InMemoryDocumentStore {
        let store = InMemoryDocumentStore::new();
        store
            .seed("books", Document::new(key, json!({ "stock": 5 })))
            .unwrap();
        store
    }

    #[test]
    fn success_commits_the_units_writes() {
        let key = Uuid::now_v7();
        let coordinator = TxnCoordinator::new(seeded_store(key));

        let result: Result<(), TxnError<String>> =
            coordinator.run(TxnOptions::snapshot(), |store, txn| {
                store.update_one(txn, "books", Document::new(key, json!({ "stock": 4 })))?;
                Ok(())
            });

        assert!(result.is_ok());
        let doc = coordinator.store().find_one("books", key).unwrap().unwrap();
        assert_eq!(doc.body["stock"], 4);
    }

    #[test]
    fn domain_failure_aborts_without_durable_effects() {
        let key = Uuid::now_v7();
        let coordinator = TxnCoordinator::new(seeded_store(key));

        let result: Result<(), TxnError<&str>> =
            coordinator.run(TxnOptions::snapshot(), |store, txn| {
                store.update_one(txn, "books", Document::new(key, json!({ "stock": 4 })))?;
                Err(WorkError::domain("rejected"))
            });

        assert!(matches!(result, Err(TxnError::Domain("rejected"))));
        let doc = coordinator.store().find_one("books", key).unwrap().unwrap();
        assert_eq!(doc.body["stock"], 5);
    }

    #[test]
    fn commit_conflict_is_classified_as_retryable_conflict() {
        let key = Uuid::now_v7();
        let coordinator = TxnCoordinator::new(seeded_store(key));

        let result: Result<(), TxnError<String>> =
            coordinator.run(TxnOptions::snapshot(), |store, txn| {
                store.update_one(txn, "books", Document::new(key, json!({ "stock": 4 })))?;

                // A rival transaction commits the same document first.
                let rival = store.begin(TxnOptions::snapshot())?;
                store.update_one(&rival, "books", Document::new(key, json!({ "stock": 0 })))?;
                store.commit(rival)?;
                Ok(())
            });

        assert!(matches!(result, Err(TxnError::Conflict(_))));
        let doc = coordinator.store().find_one("books", key).unwrap().unwrap();
        assert_eq!(doc.body["stock"], 0);
    }

    #[test]
    fn ack_timeout_is_surfaced_distinctly() {
        let store = InMemoryDocumentStore::with_replicas(3, 1);
        let key = Uuid::now_v7();
        store
            .seed("books", Document::new(key, json!({ "stock": 5 })))
            .unwrap();
        let coordinator = TxnCoordinator::new(store);

        let result: Result<(), TxnError<String>> =
            coordinator.run(TxnOptions::snapshot(), |store, txn| {
                store.update_one(txn, "books", Document::new(key, json!({ "stock": 4 })))?;
                Ok(())
            });

        assert!(matches!(result, Err(TxnError::Timeout(_))));
    }

    #[test]
    fn panic_in_unit_of_work_still_aborts_the_transaction() {
        let key = Uuid::now_v7();
        let coordinator = TxnCoordinator::new(seeded_store(key));
        let observed = Mutex::new(None);

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let _: Result<(), TxnError<String>> =
                coordinator.run(TxnOptions::snapshot(), |store, txn| {
                    store.update_one(txn, "books", Document::new(key, json!({ "stock": 4 })))?;
                    *observed.lock().unwrap() = Some(*txn);
                    panic!("unit of work blew up");
                });
        }));
        assert!(outcome.is_err());

        // The guard aborted the transaction during unwinding: the handle is
        // dead and nothing became durable.
        let handle = observed.lock().unwrap().take().unwrap();
        assert!(matches!(
            coordinator.store().read_one(&handle, "books", key).unwrap_err(),
            circulib_store::StoreError::Aborted(_)
        ));
        let doc = coordinator.store().find_one("books", key).unwrap().unwrap();
        assert_eq!(doc.body["stock"], 5);
    }
}
