//! Cache change events.
//!
//! Every observable store change is published on an in-memory broadcast bus so
//! that mounted readers and the revalidator re-render or refetch without
//! polling.

use std::sync::atomic::{AtomicU64, Ordering};

use time::OffsetDateTime;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use super::keys::CacheKey;

/// Monotonic epoch for ordering events within one process.
pub type Epoch = u64;

/// Cache event with idempotency and ordering support.
#[derive(Debug, Clone)]
pub struct CacheEvent {
    /// Unique identifier for idempotency (UUIDv4).
    pub id: Uuid,
    /// Monotonic epoch for ordering within this process.
    pub epoch: Epoch,
    /// The type of cache event.
    pub kind: EventKind,
    /// When the event was created.
    pub timestamp: OffsetDateTime,
}

impl CacheEvent {
    pub fn new(kind: EventKind, epoch: Epoch) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            kind,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// Types of observable cache changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// An entry was written wholesale (fetch result, optimistic edit, or
    /// rollback restore).
    EntryUpdated { key: CacheKey },
    /// An entry was marked stale and should be refetched by active readers.
    EntryInvalidated { key: CacheKey },
    /// An expired, reader-free entry was removed by the sweeper.
    EntryEvicted { key: CacheKey },
}

impl EventKind {
    pub fn key(&self) -> &CacheKey {
        match self {
            Self::EntryUpdated { key } | Self::EntryInvalidated { key } | Self::EntryEvicted { key } => {
                key
            }
        }
    }
}

/// Broadcast bus carrying cache events to subscribers.
///
/// Publishing never blocks; slow subscribers observe a lag error and re-read
/// the store instead of replaying missed events.
pub struct EventBus {
    sender: broadcast::Sender<CacheEvent>,
    epoch_counter: AtomicU64,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            epoch_counter: AtomicU64::new(0),
        }
    }

    /// Get the next epoch number.
    pub fn next_epoch(&self) -> Epoch {
        self.epoch_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Publish an event to every current subscriber.
    pub fn publish(&self, kind: EventKind) {
        let event = CacheEvent::new(kind, self.next_epoch());

        debug!(
            event_id = %event.id,
            event_epoch = event.epoch,
            event_kind = ?event.kind,
            "Cache event published"
        );

        // A send error only means there are no subscribers right now.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
