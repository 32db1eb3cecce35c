//! Filter and pagination state for one list view.
//!
//! Keystrokes update `raw_search` synchronously; the cache key only follows
//! after a quiescence window, so typing does not fetch per keystroke. Page
//! advances warm the next page's cache entry in the background.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::{CacheConfig, FetchStatus, ListFilter, ListPage, mutex_lock};
use crate::domain::entities::ListItem;

use super::query::{QueryController, QueryHandle};

const SOURCE: &str = "application::filters";

/// Current paging and search state of a mounted list view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    pub page: u32,
    pub page_size: u32,
    /// Echoed in the search input on every keystroke.
    pub raw_search: String,
    /// Committed after the quiescence window; part of the cache key.
    pub debounced_search: String,
}

impl FilterState {
    fn new(page_size: u32) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
            raw_search: String::new(),
            debounced_search: String::new(),
        }
    }

    /// The cache filter derived from the committed state.
    pub fn filter(&self) -> ListFilter {
        let search =
            (!self.debounced_search.is_empty()).then(|| self.debounced_search.clone());
        ListFilter::new(self.page, self.page_size, search)
    }
}

/// Drives the active reader of one list view: search debounce, page moves,
/// and next-page prefetch.
pub struct FilterController<E: ListItem> {
    inner: Arc<FilterInner<E>>,
}

struct FilterInner<E: ListItem> {
    query: Arc<QueryController<E>>,
    config: CacheConfig,
    state: Mutex<FilterState>,
    active: Mutex<Option<QueryHandle<E>>>,
    debounce: Mutex<Option<JoinHandle<()>>>,
    mounted: AtomicBool,
}

impl<E: ListItem> FilterController<E> {
    pub fn new(query: Arc<QueryController<E>>, config: CacheConfig, page_size: u32) -> Self {
        Self {
            inner: Arc::new(FilterInner {
                query,
                config,
                state: Mutex::new(FilterState::new(page_size)),
                active: Mutex::new(None),
                debounce: Mutex::new(None),
                mounted: AtomicBool::new(false),
            }),
        }
    }

    /// Start reading the current filter; the view is now live.
    pub fn mount(&self) {
        self.inner.mounted.store(true, Ordering::SeqCst);
        self.inner.commit();
    }

    /// Stop reading and cancel any pending debounce timer.
    pub fn unmount(&self) {
        self.inner.mounted.store(false, Ordering::SeqCst);
        self.inner.cancel_debounce();
        *mutex_lock(&self.inner.active, SOURCE, "unmount.active") = None;
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> FilterState {
        mutex_lock(&self.inner.state, SOURCE, "state").clone()
    }

    /// The filter the active reader is currently keyed on.
    pub fn current_filter(&self) -> ListFilter {
        mutex_lock(&self.inner.state, SOURCE, "current_filter").filter()
    }

    /// Record a keystroke. `raw_search` and the page reset apply immediately;
    /// the fetchable filter only changes once the quiescence window passes
    /// with no further keystrokes.
    pub fn set_search(&self, text: &str) {
        {
            let mut state = mutex_lock(&self.inner.state, SOURCE, "set_search");
            state.raw_search = text.to_string();
            state.page = 1;
        }
        self.inner.cancel_debounce();

        if !self.inner.mounted.load(Ordering::SeqCst) {
            return;
        }

        let inner = Arc::clone(&self.inner);
        let committed = text.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(inner.config.debounce()).await;
            inner.commit_search(committed);
        });
        *mutex_lock(&self.inner.debounce, SOURCE, "set_search.debounce") = Some(handle);
    }

    /// Move to `page` and warm the following page's cache entry.
    pub fn set_page(&self, page: u32) {
        {
            let mut state = mutex_lock(&self.inner.state, SOURCE, "set_page");
            state.page = page.max(1);
        }
        self.inner.commit();

        if self.inner.config.prefetch_next_page {
            let filter = self.current_filter();
            self.inner.query.prefetch(filter.next_page());
        }
    }

    /// Warm an arbitrary page under the current filters (hover prefetch).
    pub fn prefetch_page(&self, page: u32) {
        let filter = self.current_filter().with_page(page);
        self.inner.query.prefetch(filter);
    }

    pub fn set_page_size(&self, page_size: u32) {
        {
            let mut state = mutex_lock(&self.inner.state, SOURCE, "set_page_size");
            state.page_size = page_size.max(1);
            state.page = 1;
        }
        self.inner.commit();
    }

    /// Payload currently visible to the view, if any.
    pub fn data(&self) -> Option<ListPage<E>> {
        mutex_lock(&self.inner.active, SOURCE, "data")
            .as_ref()
            .and_then(|handle| handle.data())
    }

    pub fn status(&self) -> FetchStatus {
        mutex_lock(&self.inner.active, SOURCE, "status")
            .as_ref()
            .map_or(FetchStatus::Idle, |handle| handle.status())
    }

    pub fn refetch(&self) {
        if let Some(handle) = mutex_lock(&self.inner.active, SOURCE, "refetch").as_ref() {
            handle.refetch();
        }
    }
}

impl<E: ListItem> FilterInner<E> {
    fn commit(self: &Arc<Self>) {
        if !self.mounted.load(Ordering::SeqCst) {
            return;
        }
        let filter = mutex_lock(&self.state, SOURCE, "commit").filter();
        let handle = self.query.read(filter);
        *mutex_lock(&self.active, SOURCE, "commit.active") = Some(handle);
    }

    fn commit_search(self: &Arc<Self>, text: String) {
        {
            let mut state = mutex_lock(&self.state, SOURCE, "commit_search");
            // A newer keystroke owns the pending commit.
            if state.raw_search != text {
                return;
            }
            state.debounced_search = text.clone();
            state.page = 1;
        }
        debug!(search = %text, "Committed debounced search");
        self.commit();
    }

    fn cancel_debounce(&self) {
        if let Some(handle) = mutex_lock(&self.debounce, SOURCE, "cancel_debounce").take() {
            handle.abort();
        }
    }
}
