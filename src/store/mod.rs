mod index;
mod memory;
mod wal_store;

pub use index::BookingIndex;
pub use memory::InMemoryStore;
pub use wal_store::WalStore;

use std::io;

use async_trait::async_trait;

use crate::model::{Booking, BookingId, NewBooking, SlotKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The medium failed to read or durably commit.
    Io(String),
    /// The store was closed; it accepts nothing until reopened.
    Closed,
    /// The operation did not finish within its bound.
    TimedOut,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "storage I/O error: {e}"),
            StoreError::Closed => write!(f, "store is closed"),
            StoreError::TimedOut => write!(f, "storage operation timed out"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

/// Authoritative set of live bookings.
///
/// `insert` does not check for clashes; callers go through admission first.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Every live booking, ordered by `(date, start)` then insertion order.
    async fn list_all(&self) -> Result<Vec<Booking>, StoreError>;

    /// Live bookings for one room on one date, in no particular order.
    async fn bookings_for(&self, slot: &SlotKey) -> Result<Vec<Booking>, StoreError>;

    /// Assign the next id and persist.
    async fn insert(&self, candidate: NewBooking) -> Result<Booking, StoreError>;

    /// Remove a booking. `Ok(false)` if there was nothing to remove.
    async fn delete_by_id(&self, id: BookingId) -> Result<bool, StoreError>;

    /// End of lifecycle. Later calls fail with `StoreError::Closed`.
    async fn close(&self) -> Result<(), StoreError>;
}
