use tracing::error;

use crate::model::Booking;
use crate::store::StoreError;

use super::Engine;

impl Engine {
    /// Every live booking, ordered by `(date, start)`. Takes no admission lock.
    pub async fn list(&self) -> Result<Vec<Booking>, StoreError> {
        let store = self.store.clone();
        let result = self.bounded(async move { store.list_all().await }).await;
        if let Err(e) = &result {
            error!("list bookings failed: {e}");
        }
        result
    }

    /// Number of slot locks currently held or awaited.
    pub fn contended_slots(&self) -> usize {
        self.slot_locks.len()
    }
}
