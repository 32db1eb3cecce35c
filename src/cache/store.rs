//! Keyed storage for cached list pages.
//!
//! One `ListStore` holds every cached page/filter combination of a single
//! resource kind. Entries are replaced wholesale; cross-entry edits go through
//! [`ListStore::set_where`] so that an item cached on several pages is patched
//! everywhere at once.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use metrics::{counter, gauge};
use tokio::time::Instant;
use tracing::debug;

use crate::domain::entities::ListItem;

use super::entry::CacheEntry;
use super::events::{EventBus, EventKind};
use super::keys::{CacheKey, ListFilter, ResourceKind};
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

const METRIC_CACHE_HIT: &str = "lampo_cache_hit_total";
const METRIC_CACHE_MISS: &str = "lampo_cache_miss_total";
const METRIC_CACHE_INVALIDATE: &str = "lampo_cache_invalidate_total";
const METRIC_CACHE_EVICT: &str = "lampo_cache_evict_total";
const METRIC_CACHE_ENTRIES: &str = "lampo_cache_entries";

struct Slot<E> {
    entry: CacheEntry<E>,
    last_read: Instant,
}

/// In-memory cache for one resource kind, keyed by filter set.
///
/// All operations are infallible map edits; poisoned locks recover with a
/// structured warning. Every observable change is published on the event bus.
pub struct ListStore<E: ListItem> {
    kind: ResourceKind,
    slots: RwLock<HashMap<ListFilter, Slot<E>>>,
    readers: RwLock<HashMap<ListFilter, u32>>,
    bus: Arc<EventBus>,
}

impl<E: ListItem> ListStore<E> {
    pub fn new(kind: ResourceKind, bus: Arc<EventBus>) -> Self {
        Self {
            kind,
            slots: RwLock::new(HashMap::new()),
            readers: RwLock::new(HashMap::new()),
            bus,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn key(&self, filter: &ListFilter) -> CacheKey {
        CacheKey::new(self.kind, filter.clone())
    }

    fn record_entry_count(&self, count: usize) {
        gauge!(METRIC_CACHE_ENTRIES, "kind" => self.kind.as_str()).set(count as f64);
    }

    /// Look up an entry, refreshing its last-read stamp.
    pub fn get(&self, filter: &ListFilter) -> Option<CacheEntry<E>> {
        let mut slots = rw_write(&self.slots, SOURCE, "get");
        match slots.get_mut(filter) {
            Some(slot) => {
                slot.last_read = Instant::now();
                counter!(METRIC_CACHE_HIT, "kind" => self.kind.as_str()).increment(1);
                Some(slot.entry.clone())
            }
            None => {
                counter!(METRIC_CACHE_MISS, "kind" => self.kind.as_str()).increment(1);
                None
            }
        }
    }

    /// Look up an entry without touching read metadata or counters.
    pub fn peek(&self, filter: &ListFilter) -> Option<CacheEntry<E>> {
        rw_read(&self.slots, SOURCE, "peek")
            .get(filter)
            .map(|slot| slot.entry.clone())
    }

    /// Replace the entry for `filter` wholesale.
    pub fn set(&self, filter: ListFilter, entry: CacheEntry<E>) {
        let count = {
            let mut slots = rw_write(&self.slots, SOURCE, "set");
            match slots.get_mut(&filter) {
                Some(slot) => slot.entry = entry,
                None => {
                    slots.insert(
                        filter.clone(),
                        Slot {
                            entry,
                            last_read: Instant::now(),
                        },
                    );
                }
            }
            slots.len()
        };
        self.record_entry_count(count);
        self.bus.publish(EventKind::EntryUpdated {
            key: self.key(&filter),
        });
    }

    /// Apply `updater` to every entry whose filter matches `predicate`,
    /// replacing each matched entry with the updater's result.
    pub fn set_where(
        &self,
        predicate: impl Fn(&ListFilter) -> bool,
        updater: impl Fn(&ListFilter, &CacheEntry<E>) -> CacheEntry<E>,
    ) {
        let updated: Vec<ListFilter> = {
            let mut slots = rw_write(&self.slots, SOURCE, "set_where");
            slots
                .iter_mut()
                .filter(|(filter, _)| predicate(filter))
                .map(|(filter, slot)| {
                    slot.entry = updater(filter, &slot.entry);
                    filter.clone()
                })
                .collect()
        };
        for filter in updated {
            self.bus.publish(EventKind::EntryUpdated {
                key: self.key(&filter),
            });
        }
    }

    /// Mark matching entries stale. Returns how many entries changed; entries
    /// that are already stale are skipped and publish nothing, so a repeated
    /// invalidation is unobservable.
    pub fn invalidate_where(&self, predicate: impl Fn(&ListFilter) -> bool) -> usize {
        let invalidated: Vec<ListFilter> = {
            let mut slots = rw_write(&self.slots, SOURCE, "invalidate_where");
            slots
                .iter_mut()
                .filter(|(filter, slot)| predicate(filter) && !slot.entry.stale)
                .map(|(filter, slot)| {
                    slot.entry = slot.entry.invalidated();
                    filter.clone()
                })
                .collect()
        };
        let count = invalidated.len();
        if count > 0 {
            counter!(METRIC_CACHE_INVALIDATE, "kind" => self.kind.as_str()).increment(count as u64);
        }
        for filter in invalidated {
            self.bus.publish(EventKind::EntryInvalidated {
                key: self.key(&filter),
            });
        }
        count
    }

    /// Mark every entry of this kind stale.
    pub fn invalidate_all(&self) -> usize {
        self.invalidate_where(|_| true)
    }

    /// Full copy of every cached `(filter, entry)` pair, taken before an
    /// optimistic edit so a failed write can restore it verbatim.
    pub fn snapshot(&self) -> Vec<(ListFilter, CacheEntry<E>)> {
        rw_read(&self.slots, SOURCE, "snapshot")
            .iter()
            .map(|(filter, slot)| (filter.clone(), slot.entry.clone()))
            .collect()
    }

    /// Write every snapshotted pair back verbatim (full rollback, not a
    /// merge). Reader registrations and read stamps are untouched.
    pub fn restore(&self, entries: Vec<(ListFilter, CacheEntry<E>)>) {
        let restored: Vec<ListFilter> = {
            let mut slots = rw_write(&self.slots, SOURCE, "restore");
            entries
                .into_iter()
                .map(|(filter, entry)| {
                    match slots.get_mut(&filter) {
                        Some(slot) => slot.entry = entry,
                        None => {
                            slots.insert(
                                filter.clone(),
                                Slot {
                                    entry,
                                    last_read: Instant::now(),
                                },
                            );
                        }
                    }
                    filter
                })
                .collect()
        };
        for filter in restored {
            self.bus.publish(EventKind::EntryUpdated {
                key: self.key(&filter),
            });
        }
    }

    /// Register a mounted reader for `filter`; swept entries never include a
    /// filter with live readers.
    pub fn acquire_reader(&self, filter: &ListFilter) {
        let mut readers = rw_write(&self.readers, SOURCE, "acquire_reader");
        *readers.entry(filter.clone()).or_insert(0) += 1;
    }

    pub fn release_reader(&self, filter: &ListFilter) {
        let mut readers = rw_write(&self.readers, SOURCE, "release_reader");
        if let Some(count) = readers.get_mut(filter) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                readers.remove(filter);
            }
        }
    }

    pub fn reader_count(&self, filter: &ListFilter) -> u32 {
        rw_read(&self.readers, SOURCE, "reader_count")
            .get(filter)
            .copied()
            .unwrap_or(0)
    }

    /// Remove entries whose last read is older than `ttl` and which no live
    /// reader references. Returns the number of evicted entries.
    pub fn sweep_expired(&self, ttl: Duration) -> usize {
        let now = Instant::now();
        let evicted: Vec<ListFilter> = {
            let readers = rw_read(&self.readers, SOURCE, "sweep_expired.readers");
            let mut slots = rw_write(&self.slots, SOURCE, "sweep_expired");
            let expired: Vec<ListFilter> = slots
                .iter()
                .filter(|(filter, slot)| {
                    readers.get(*filter).copied().unwrap_or(0) == 0
                        && now.duration_since(slot.last_read) >= ttl
                })
                .map(|(filter, _)| filter.clone())
                .collect();
            for filter in &expired {
                slots.remove(filter);
            }
            self.record_entry_count(slots.len());
            expired
        };
        let count = evicted.len();
        if count > 0 {
            counter!(METRIC_CACHE_EVICT, "kind" => self.kind.as_str()).increment(count as u64);
            debug!(
                kind = self.kind.as_str(),
                evicted = count,
                "Swept expired cache entries"
            );
        }
        for filter in evicted {
            self.bus.publish(EventKind::EntryEvicted {
                key: self.key(&filter),
            });
        }
        count
    }

    /// Filters currently cached, in no particular order.
    pub fn cached_filters(&self) -> Vec<ListFilter> {
        rw_read(&self.slots, SOURCE, "cached_filters")
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        rw_read(&self.slots, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all cached entries.
    pub fn clear(&self) {
        rw_write(&self.slots, SOURCE, "clear").clear();
        self.record_entry_count(0);
    }
}
