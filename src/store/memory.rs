use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;

use crate::model::{Booking, BookingId, NewBooking, SlotKey};

use super::{BookingIndex, ReservationStore, StoreError};

/// Volatile store. Same semantics as `WalStore`, nothing survives the process.
pub struct InMemoryStore {
    index: BookingIndex,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            index: BookingIndex::new(),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl ReservationStore for InMemoryStore {
    async fn list_all(&self) -> Result<Vec<Booking>, StoreError> {
        self.ensure_open()?;
        Ok(self.index.sorted())
    }

    async fn bookings_for(&self, slot: &SlotKey) -> Result<Vec<Booking>, StoreError> {
        self.ensure_open()?;
        Ok(self.index.slot(slot))
    }

    async fn insert(&self, candidate: NewBooking) -> Result<Booking, StoreError> {
        self.ensure_open()?;
        let booking = candidate.with_id(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.index.insert(booking.clone());
        metrics::gauge!(crate::observability::BOOKINGS_LIVE).set(self.index.len() as f64);
        Ok(booking)
    }

    async fn delete_by_id(&self, id: BookingId) -> Result<bool, StoreError> {
        self.ensure_open()?;
        let removed = self.index.remove(id).is_some();
        metrics::gauge!(crate::observability::BOOKINGS_LIVE).set(self.index.len() as f64);
        Ok(removed)
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
