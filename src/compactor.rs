use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use crate::store::WalStore;

/// Rewrite the log whenever more than `threshold` events were appended since
/// the last compaction. Exits once the store is closed.
pub async fn run_compactor(store: Arc<WalStore>, threshold: u64, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        if store.is_closed() {
            debug!("compactor stopped");
            return;
        }
        if compact_if_due(&store, threshold).await {
            debug!("compactor pass complete");
        }
    }
}

/// One compactor pass. Returns true if the log was rewritten.
pub async fn compact_if_due(store: &WalStore, threshold: u64) -> bool {
    let appended = store.appends_since_compact().await;
    if appended < threshold {
        return false;
    }
    match store.compact().await {
        Ok(()) => true,
        Err(e) => {
            error!("compaction after {appended} appends failed: {e}");
            false
        }
    }
}
