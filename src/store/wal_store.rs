use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, error, info};

use crate::limits::WAL_CHANNEL_CAPACITY;
use crate::model::{Booking, BookingId, Event, NewBooking, SlotKey};
use crate::observability;
use crate::wal::Wal;

use super::{BookingIndex, ReservationStore, StoreError};

// ── Group-commit writer ──────────────────────────────────

type Ack = oneshot::Sender<io::Result<()>>;

enum WalCommand {
    Append { event: Event, response: Ack },
    Compact { events: Vec<Event>, response: Ack },
    AppendsSinceCompact { response: oneshot::Sender<u64> },
    Shutdown { response: Ack },
}

/// Owns the log. Every append already queued behind the first one joins its
/// batch, and the whole batch shares a single fsync.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    let mut batch: Vec<(Event, Ack)> = Vec::new();
    while let Some(first) = rx.recv().await {
        let mut next = Some(first);
        while let Some(cmd) = next.take() {
            match cmd {
                WalCommand::Append { event, response } => {
                    batch.push((event, response));
                    next = rx.try_recv().ok();
                }
                control => {
                    commit_batch(&mut wal, &mut batch);
                    if !handle_control(&mut wal, control) {
                        debug!(path = %wal.path().display(), "log writer stopped");
                        return;
                    }
                }
            }
        }
        commit_batch(&mut wal, &mut batch);
    }
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<(Event, Ack)>) {
    if batch.is_empty() {
        return;
    }
    metrics::histogram!(observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let started = Instant::now();

    let result = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event))
        .and_then(|()| wal.flush_sync());
    if let Err(e) = &result {
        // Every caller in the batch is told it failed, so none of it may replay.
        error!(path = %wal.path().display(), batch = batch.len(), "log commit failed: {e}");
        if let Err(e) = wal.rollback() {
            error!(path = %wal.path().display(), "log rollback failed, writes disabled: {e}");
        }
    }

    metrics::histogram!(observability::WAL_FLUSH_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());
    for (_, tx) in batch.drain(..) {
        let _ = tx.send(match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        });
    }
}

/// Returns false once the writer should exit.
fn handle_control(wal: &mut Wal, cmd: WalCommand) -> bool {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
            true
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
            true
        }
        WalCommand::Shutdown { response } => {
            let _ = response.send(wal.flush_sync());
            false
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the caller"),
    }
}

// ── Store ────────────────────────────────────────────────

/// Durable store: the in-memory index is rebuilt from the log on open and
/// every mutation is committed to the log before it becomes visible.
pub struct WalStore {
    index: BookingIndex,
    next_id: AtomicU64,
    wal_tx: mpsc::Sender<WalCommand>,
    closed: AtomicBool,
    /// Mutations hold it shared; compaction holds it exclusive so no
    /// committed-but-unapplied event can be missing from the snapshot.
    mutation_gate: RwLock<()>,
}

impl WalStore {
    /// Recover the log at `path` and start the writer task. Needs a tokio runtime.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let events = Wal::recover(path)?;
        let wal = Wal::open(path)?;

        let index = BookingIndex::new();
        let mut next_id: BookingId = 1;
        for event in &events {
            match event {
                Event::BookingConfirmed { booking } => next_id = next_id.max(booking.id + 1),
                Event::IdWatermark { next_id: mark } => next_id = next_id.max(*mark),
                Event::BookingCancelled { .. } => {}
            }
            index.apply(event);
        }
        info!(
            path = %path.display(),
            events = events.len(),
            live = index.len(),
            next_id,
            "booking log replayed"
        );
        metrics::gauge!(observability::BOOKINGS_LIVE).set(index.len() as f64);

        let (wal_tx, wal_rx) = mpsc::channel(WAL_CHANNEL_CAPACITY);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        Ok(Self {
            index,
            next_id: AtomicU64::new(next_id),
            wal_tx,
            closed: AtomicBool::new(false),
            mutation_gate: RwLock::new(()),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    async fn send(&self, cmd: WalCommand) -> Result<(), StoreError> {
        self.wal_tx
            .send(cmd)
            .await
            .map_err(|_| StoreError::Io("log writer shut down".into()))
    }

    async fn wal_append(&self, event: Event) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.send(WalCommand::Append { event, response: tx }).await?;
        rx.await
            .map_err(|_| StoreError::Io("log writer dropped response".into()))??;
        Ok(())
    }

    pub async fn appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Rewrite the log as an id watermark followed by the live bookings.
    pub async fn compact(&self) -> Result<(), StoreError> {
        self.ensure_open()?;
        let _exclusive = self.mutation_gate.write().await;

        let live = self.index.sorted();
        let mut events = Vec::with_capacity(live.len() + 1);
        events.push(Event::IdWatermark {
            next_id: self.next_id.load(Ordering::Acquire),
        });
        events.extend(live.into_iter().map(|booking| Event::BookingConfirmed { booking }));
        let count = events.len();

        let (tx, rx) = oneshot::channel();
        self.send(WalCommand::Compact { events, response: tx }).await?;
        rx.await
            .map_err(|_| StoreError::Io("log writer dropped response".into()))??;
        info!(events = count, "booking log compacted");
        Ok(())
    }
}

#[async_trait]
impl ReservationStore for WalStore {
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
        let _shared = self.mutation_gate.read().await;
        let booking = candidate.with_id(self.next_id.fetch_add(1, Ordering::AcqRel));
        self.wal_append(Event::BookingConfirmed {
            booking: booking.clone(),
        })
        .await?;
        self.index.insert(booking.clone());
        metrics::gauge!(observability::BOOKINGS_LIVE).set(self.index.len() as f64);
        Ok(booking)
    }

    async fn delete_by_id(&self, id: BookingId) -> Result<bool, StoreError> {
        self.ensure_open()?;
        let _shared = self.mutation_gate.read().await;
        if !self.index.contains(id) {
            return Ok(false);
        }
        self.wal_append(Event::BookingCancelled { id }).await?;
        let removed = self.index.remove(id).is_some();
        metrics::gauge!(observability::BOOKINGS_LIVE).set(self.index.len() as f64);
        Ok(removed)
    }

    async fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        // Wait out in-flight mutations before stopping the writer.
        let _exclusive = self.mutation_gate.write().await;
        let (tx, rx) = oneshot::channel();
        self.send(WalCommand::Shutdown { response: tx }).await?;
        rx.await
            .map_err(|_| StoreError::Io("log writer dropped response".into()))??;
        info!("booking log closed");
        Ok(())
    }
}
