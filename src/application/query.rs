//! Coalescing query controller.
//!
//! Issues list reads for cache keys, deduplicates concurrent identical reads
//! onto a single in-flight fetch, retries a failed read once, and refetches
//! invalidated entries for whichever readers are still mounted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use metrics::{counter, histogram};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::{
    CacheConfig, CacheEntry, CacheEvent, EventBus, EventKind, FetchStatus, ListFilter, ListPage,
    ListStore, ResourceKind, mutex_lock,
};
use crate::domain::entities::ListItem;

use super::sources::ListSource;

const SOURCE: &str = "application::query";

const METRIC_FETCH_TOTAL: &str = "lampo_query_fetch_total";
const METRIC_FETCH_RETRY: &str = "lampo_query_retry_total";
const METRIC_FETCH_COALESCED: &str = "lampo_query_coalesced_total";
const METRIC_FETCH_MS: &str = "lampo_query_fetch_ms";

struct InflightFetch {
    id: Uuid,
    handle: JoinHandle<()>,
}

/// Read-side controller for one resource kind.
pub struct QueryController<E: ListItem> {
    kind: ResourceKind,
    store: Arc<ListStore<E>>,
    source: Arc<dyn ListSource<E>>,
    bus: Arc<EventBus>,
    config: CacheConfig,
    inflight: Mutex<HashMap<ListFilter, InflightFetch>>,
}

impl<E: ListItem> QueryController<E> {
    pub fn new(
        kind: ResourceKind,
        store: Arc<ListStore<E>>,
        source: Arc<dyn ListSource<E>>,
        bus: Arc<EventBus>,
        config: CacheConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            kind,
            store,
            source,
            bus,
            config,
            inflight: Mutex::new(HashMap::new()),
        })
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn store(&self) -> &Arc<ListStore<E>> {
        &self.store
    }

    /// Subscribe a reader to `filter`, fetching if the entry is absent, stale,
    /// or was never loaded. The handle releases the reader registration on
    /// drop.
    pub fn read(self: &Arc<Self>, filter: ListFilter) -> QueryHandle<E> {
        self.store.acquire_reader(&filter);

        let needs_fetch = match self.store.get(&filter) {
            None => true,
            Some(entry) => {
                entry.stale
                    || matches!(entry.status, FetchStatus::Idle | FetchStatus::Loading)
            }
        };
        if needs_fetch {
            self.ensure_fetch(filter.clone());
        }

        QueryHandle {
            controller: Arc::clone(self),
            filter,
            events: self.bus.subscribe(),
        }
    }

    /// Force a fetch for `filter` regardless of staleness, still coalescing
    /// with any fetch already in flight.
    pub fn refetch(self: &Arc<Self>, filter: &ListFilter) {
        self.ensure_fetch(filter.clone());
    }

    /// Warm the cache for `filter` without registering a reader. The result,
    /// if never navigated to, is swept once its TTL elapses.
    pub fn prefetch(self: &Arc<Self>, filter: ListFilter) {
        let needs_fetch = match self.store.peek(&filter) {
            None => true,
            Some(entry) => entry.stale || entry.status == FetchStatus::Idle,
        };
        if needs_fetch {
            debug!(
                kind = self.kind.as_str(),
                page = filter.page,
                "Prefetching list page"
            );
            self.ensure_fetch(filter);
        }
    }

    /// Abort every in-flight fetch for this kind, rolling loading markers back
    /// to their previous settled state. Returns how many fetches were
    /// cancelled.
    pub fn cancel_inflight(&self) -> usize {
        let drained: HashMap<ListFilter, InflightFetch> = {
            let mut inflight = mutex_lock(&self.inflight, SOURCE, "cancel_inflight");
            std::mem::take(&mut *inflight)
        };
        if drained.is_empty() {
            return 0;
        }

        for fetch in drained.values() {
            fetch.handle.abort();
        }
        debug!(
            kind = self.kind.as_str(),
            cancelled = drained.len(),
            "Cancelled in-flight list fetches"
        );

        self.store
            .set_where(|filter| drained.contains_key(filter), |_, entry| entry.load_cancelled());
        drained.len()
    }

    /// Refetch invalidated entries as long as they have mounted readers.
    pub fn spawn_revalidator(self: &Arc<Self>) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        let mut events = self.bus.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let EventKind::EntryInvalidated { key } = event.kind else {
                            continue;
                        };
                        if key.kind != controller.kind {
                            continue;
                        }
                        if controller.store.reader_count(&key.filter) == 0 {
                            continue;
                        }
                        debug!(
                            kind = controller.kind.as_str(),
                            page = key.filter.page,
                            "Refetching invalidated entry for active reader"
                        );
                        controller.ensure_fetch(key.filter);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(
                            kind = controller.kind.as_str(),
                            skipped, "Cache event stream lagged"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn ensure_fetch(self: &Arc<Self>, filter: ListFilter) {
        let mut inflight = mutex_lock(&self.inflight, SOURCE, "ensure_fetch");
        if inflight.contains_key(&filter) {
            counter!(METRIC_FETCH_COALESCED, "kind" => self.kind.as_str()).increment(1);
            debug!(
                kind = self.kind.as_str(),
                page = filter.page,
                "Coalesced onto in-flight fetch"
            );
            return;
        }

        // The loading marker is written at issue time, before the task ever
        // runs; callers observe the transition synchronously.
        self.store.set(
            filter.clone(),
            CacheEntry::loading_from(self.store.peek(&filter).as_ref()),
        );

        let fetch_id = Uuid::new_v4();
        let controller = Arc::clone(self);
        let task_filter = filter.clone();
        let handle = tokio::spawn(async move {
            controller.run_fetch(task_filter, fetch_id).await;
        });
        inflight.insert(filter, InflightFetch {
            id: fetch_id,
            handle,
        });
    }

    async fn run_fetch(self: Arc<Self>, filter: ListFilter, fetch_id: Uuid) {
        counter!(METRIC_FETCH_TOTAL, "kind" => self.kind.as_str()).increment(1);
        let started = Instant::now();

        let mut retried = false;
        let outcome = loop {
            match self.source.list(&filter).await {
                Ok(page) => break Ok(page),
                Err(err) if !retried => {
                    retried = true;
                    counter!(METRIC_FETCH_RETRY, "kind" => self.kind.as_str()).increment(1);
                    warn!(
                        kind = self.kind.as_str(),
                        page = filter.page,
                        error = %err,
                        "List fetch failed; retrying once"
                    );
                    tokio::time::sleep(self.config.retry_delay()).await;
                }
                Err(err) => break Err(err),
            }
        };

        if !self.finish_inflight(&filter, fetch_id) {
            debug!(
                kind = self.kind.as_str(),
                page = filter.page,
                "Discarding superseded fetch result"
            );
            return;
        }

        match outcome {
            Ok(page) => {
                histogram!(METRIC_FETCH_MS, "kind" => self.kind.as_str())
                    .record(started.elapsed().as_secs_f64() * 1000.0);
                self.store.set(filter, CacheEntry::success(page));
            }
            Err(err) => {
                let previous = self.store.peek(&filter);
                self.store
                    .set(filter, CacheEntry::failed(previous.as_ref(), err.to_string()));
            }
        }
    }

    fn finish_inflight(&self, filter: &ListFilter, fetch_id: Uuid) -> bool {
        let mut inflight = mutex_lock(&self.inflight, SOURCE, "finish_inflight");
        match inflight.get(filter) {
            Some(fetch) if fetch.id == fetch_id => {
                inflight.remove(filter);
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    fn inflight_count(&self) -> usize {
        mutex_lock(&self.inflight, SOURCE, "inflight_count").len()
    }
}

/// A mounted reader subscribed to one cache key.
pub struct QueryHandle<E: ListItem> {
    controller: Arc<QueryController<E>>,
    filter: ListFilter,
    events: broadcast::Receiver<CacheEvent>,
}

impl<E: ListItem> QueryHandle<E> {
    pub fn filter(&self) -> &ListFilter {
        &self.filter
    }

    pub fn entry(&self) -> Option<CacheEntry<E>> {
        self.controller.store.get(&self.filter)
    }

    pub fn data(&self) -> Option<ListPage<E>> {
        self.entry().and_then(|entry| entry.value)
    }

    pub fn status(&self) -> FetchStatus {
        self.entry().map_or(FetchStatus::Idle, |entry| entry.status)
    }

    pub fn error(&self) -> Option<String> {
        self.entry().and_then(|entry| entry.error)
    }

    pub fn refetch(&self) {
        self.controller.refetch(&self.filter);
    }

    /// Wait until this key's entry is settled and fresh (success or error,
    /// not stale, no load in flight), then return it.
    pub async fn settled(&mut self) -> CacheEntry<E> {
        loop {
            if let Some(entry) = self.controller.store.peek(&self.filter) {
                if entry.is_settled() && !entry.stale {
                    return entry;
                }
            }

            match self.events.recv().await {
                Ok(event) => {
                    let key = event.kind.key();
                    if key.kind != self.controller.kind || key.filter != self.filter {
                        continue;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    return self
                        .controller
                        .store
                        .peek(&self.filter)
                        .unwrap_or_else(CacheEntry::idle);
                }
            }
        }
    }
}

impl<E: ListItem> Drop for QueryHandle<E> {
    fn drop(&mut self) {
        self.controller.store.release_reader(&self.filter);
    }
}
