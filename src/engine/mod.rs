mod conflict;
mod error;
mod mutations;
mod queries;

pub use error::AdmissionError;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::model::SlotKey;
use crate::store::{ReservationStore, StoreError};

pub type SlotLocks = Arc<DashMap<SlotKey, Arc<Mutex<()>>>>;

/// Admission controller over an injected store.
///
/// Holds no booking state of its own; every decision reads a fresh snapshot
/// of the candidate's `(room, date)` while holding that key's lock, so two
/// overlapping candidates can never both pass the clash check.
pub struct Engine {
    pub(super) store: Arc<dyn ReservationStore>,
    pub(super) slot_locks: SlotLocks,
    pub(super) store_timeout: Duration,
}

impl Engine {
    pub fn new(store: Arc<dyn ReservationStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            slot_locks: Arc::new(DashMap::new()),
            store_timeout,
        }
    }

    /// Run a store operation on its own task, bounded by `store_timeout`.
    ///
    /// On expiry the caller gets `TimedOut` but the task runs to completion,
    /// so a half-finished write never leaves the log and the index disagreeing.
    pub(super) async fn bounded<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, StoreError>> + Send + 'static,
    {
        match tokio::time::timeout(self.store_timeout, tokio::spawn(op)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(StoreError::Io(format!("store task failed: {e}"))),
            Err(_) => Err(StoreError::TimedOut),
        }
    }

    /// Close the underlying store. In-flight admissions finish first.
    pub async fn close(&self) -> Result<(), StoreError> {
        let store = self.store.clone();
        self.bounded(async move { store.close().await }).await
    }
}

/// Get (or create) the lock serializing admissions for `slot`.
pub(super) fn slot_lock(locks: &SlotLocks, slot: &SlotKey) -> Arc<Mutex<()>> {
    if let Some(lock) = locks.get(slot) {
        return lock.value().clone();
    }
    locks.entry(slot.clone()).or_default().value().clone()
}

/// Drop the lock entry for `slot` once nobody holds or waits on it.
pub(super) fn prune_slot_lock(locks: &SlotLocks, slot: &SlotKey) {
    locks.remove_if(slot, |_, lock| Arc::strong_count(lock) == 1);
}
