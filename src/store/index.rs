use dashmap::DashMap;

use crate::model::{Booking, BookingId, Event, SlotKey};

/// In-memory view of the live bookings, grouped by `(room, date)`.
#[derive(Default)]
pub struct BookingIndex {
    by_slot: DashMap<SlotKey, Vec<Booking>>,
    /// Reverse lookup: booking id → slot it lives in.
    slot_of: DashMap<BookingId, SlotKey>,
}

impl BookingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slot_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slot_of.is_empty()
    }

    pub fn contains(&self, id: BookingId) -> bool {
        self.slot_of.contains_key(&id)
    }

    pub fn insert(&self, booking: Booking) {
        let slot = booking.slot();
        self.slot_of.insert(booking.id, slot.clone());
        self.by_slot.entry(slot).or_default().push(booking);
    }

    pub fn remove(&self, id: BookingId) -> Option<Booking> {
        let (_, slot) = self.slot_of.remove(&id)?;
        let removed = {
            let mut bookings = self.by_slot.get_mut(&slot)?;
            let pos = bookings.iter().position(|b| b.id == id)?;
            bookings.remove(pos)
        };
        self.by_slot.remove_if(&slot, |_, bookings| bookings.is_empty());
        Some(removed)
    }

    pub fn slot(&self, slot: &SlotKey) -> Vec<Booking> {
        self.by_slot
            .get(slot)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    /// Every booking ordered by `(date, start)`, ties by id (= insertion order).
    pub fn sorted(&self) -> Vec<Booking> {
        let mut all: Vec<Booking> = self
            .by_slot
            .iter()
            .flat_map(|e| e.value().clone())
            .collect();
        all.sort_by(|a, b| a.listing_key().cmp(&b.listing_key()));
        all
    }

    /// Apply a replayed log event. Watermarks carry no booking state.
    pub fn apply(&self, event: &Event) {
        match event {
            Event::BookingConfirmed { booking } => self.insert(booking.clone()),
            Event::BookingCancelled { id } => {
                self.remove(*id);
            }
            Event::IdWatermark { .. } => {}
        }
    }
}
