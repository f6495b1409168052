use std::time::Instant;

use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::model::{Booking, BookingId, BookingRequest, NewBooking, SlotKey};
use crate::observability::{self, outcome_label};
use crate::store::{ReservationStore, StoreError};

use super::conflict::find_clash;
use super::{prune_slot_lock, slot_lock, AdmissionError, Engine};

type Outcome = oneshot::Sender<Result<Booking, AdmissionError>>;

impl Engine {
    /// Admit a booking request or reject it. Nothing is persisted on rejection.
    pub async fn try_book(&self, request: BookingRequest) -> Result<Booking, AdmissionError> {
        let started = Instant::now();
        let result = self.admit(request).await;

        metrics::counter!(
            observability::ADMISSIONS_TOTAL,
            "outcome" => outcome_label(&result.as_ref().map(|_| ()))
        )
        .increment(1);
        metrics::histogram!(observability::ADMISSION_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(b) => info!(
                id = b.id,
                room = %b.room,
                date = %b.date,
                start = %b.start,
                end = %b.end,
                "booking admitted"
            ),
            Err(e) if e.is_rejection() => debug!("booking rejected: {e}"),
            Err(e) => error!("booking failed: {e}"),
        }
        result
    }

    async fn admit(&self, request: BookingRequest) -> Result<Booking, AdmissionError> {
        let candidate = request.into_candidate()?;
        let slot = candidate.slot();
        let store = self.store.clone();
        let locks = self.slot_locks.clone();
        let (tx, rx) = oneshot::channel();

        // The slot lock lives on the spawned task, so it stays held until the
        // store is done even if the caller has timed out.
        tokio::spawn(async move {
            let guard = slot_lock(&locks, &slot).lock_owned().await;
            if !tx.is_closed() {
                let outcome = decide(store.as_ref(), &slot, candidate, &tx).await;
                if let Err(Ok(orphan)) = tx.send(outcome) {
                    withdraw(store.as_ref(), orphan).await;
                }
            }
            drop(guard);
            prune_slot_lock(&locks, &slot);
        });

        match tokio::time::timeout(self.store_timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(StoreError::Io("admission task failed".into()).into()),
            Err(_) => Err(StoreError::TimedOut.into()),
        }
    }

    /// Remove a booking by id. Unknown ids are a no-op; there is no ownership check.
    pub async fn cancel(&self, id: BookingId) -> Result<bool, StoreError> {
        let store = self.store.clone();
        let result = self.bounded(async move { store.delete_by_id(id).await }).await;
        match &result {
            Ok(true) => {
                metrics::counter!(observability::CANCELLATIONS_TOTAL).increment(1);
                info!(id, "booking cancelled");
            }
            Ok(false) => debug!(id, "cancel: no such booking"),
            Err(e) => error!(id, "cancel failed: {e}"),
        }
        result
    }
}

/// Read the slot, check for a clash, insert. Caller holds the slot lock.
/// Skips the insert once `caller` has stopped waiting.
async fn decide(
    store: &dyn ReservationStore,
    slot: &SlotKey,
    candidate: NewBooking,
    caller: &Outcome,
) -> Result<Booking, AdmissionError> {
    let existing = store.bookings_for(slot).await?;
    if let Some(clash) = find_clash(&existing, &candidate) {
        return Err(AdmissionError::Clash(clash.id));
    }
    if caller.is_closed() {
        return Err(StoreError::TimedOut.into());
    }
    Ok(store.insert(candidate).await?)
}

/// Undo an insert whose caller already gave up and was told it failed.
/// Runs under the slot lock, so no other admission has seen the booking.
async fn withdraw(store: &dyn ReservationStore, booking: Booking) {
    match store.delete_by_id(booking.id).await {
        Ok(_) => warn!(id = booking.id, room = %booking.room, "timed-out admission withdrawn"),
        Err(e) => error!(id = booking.id, "could not withdraw timed-out admission: {e}"),
    }
}
