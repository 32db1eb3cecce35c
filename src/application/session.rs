//! Session wiring.
//!
//! A `Session` is the explicit construction boundary for the whole layer: it
//! owns the event bus, one controller bundle per resource kind, and the
//! background tasks, and it tears all of that down deterministically.

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::cache::{CacheConfig, EventBus, ListStore, ResourceKind, mutex_lock};
use crate::domain::entities::{CommentRecord, ListItem, PostRecord, UserRecord};

use super::filters::FilterController;
use super::mutation::MutationController;
use super::query::QueryController;
use super::sources::{ListSource, WriteSource};

const SOURCE: &str = "application::session";

const DEFAULT_PAGE_SIZE: u32 = 10;

/// The pair of collaborators backing one resource kind.
pub struct ResourceSources<E: ListItem> {
    pub list: Arc<dyn ListSource<E>>,
    pub write: Arc<dyn WriteSource>,
}

/// Collaborators for every resource kind of the dashboard.
pub struct SessionSources {
    pub users: ResourceSources<UserRecord>,
    pub posts: ResourceSources<PostRecord>,
    pub comments: ResourceSources<CommentRecord>,
}

/// Store plus controllers for one resource kind.
pub struct ResourceController<E: ListItem> {
    store: Arc<ListStore<E>>,
    query: Arc<QueryController<E>>,
    mutations: Arc<MutationController<E>>,
    filters: FilterController<E>,
}

impl<E: ListItem> ResourceController<E> {
    fn new(
        kind: ResourceKind,
        sources: ResourceSources<E>,
        bus: &Arc<EventBus>,
        config: &CacheConfig,
    ) -> (Self, Vec<JoinHandle<()>>) {
        let store = Arc::new(ListStore::new(kind, Arc::clone(bus)));
        let query = QueryController::new(
            kind,
            Arc::clone(&store),
            sources.list,
            Arc::clone(bus),
            config.clone(),
        );
        let mutations =
            MutationController::new(kind, Arc::clone(&store), Arc::clone(&query), sources.write);
        let filters = FilterController::new(Arc::clone(&query), config.clone(), DEFAULT_PAGE_SIZE);

        let tasks = vec![query.spawn_revalidator(), spawn_sweeper(Arc::clone(&store), config)];

        (
            Self {
                store,
                query,
                mutations,
                filters,
            },
            tasks,
        )
    }

    pub fn store(&self) -> &Arc<ListStore<E>> {
        &self.store
    }

    pub fn query(&self) -> &Arc<QueryController<E>> {
        &self.query
    }

    pub fn mutations(&self) -> &Arc<MutationController<E>> {
        &self.mutations
    }

    pub fn filters(&self) -> &FilterController<E> {
        &self.filters
    }
}

fn spawn_sweeper<E: ListItem>(store: Arc<ListStore<E>>, config: &CacheConfig) -> JoinHandle<()> {
    let ttl = config.entry_ttl();
    let cadence = config.sweep_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cadence);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            store.sweep_expired(ttl);
        }
    })
}

/// One dashboard session: cache, controllers, and background tasks.
///
/// Construct inside a tokio runtime; background tasks are spawned immediately
/// and aborted by [`Session::teardown`] or on drop.
pub struct Session {
    users: ResourceController<UserRecord>,
    posts: ResourceController<PostRecord>,
    comments: ResourceController<CommentRecord>,
    bus: Arc<EventBus>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Session {
    pub fn new(config: CacheConfig, sources: SessionSources) -> Self {
        let bus = Arc::new(EventBus::new(config.event_capacity_non_zero()));

        let (users, mut tasks) =
            ResourceController::new(ResourceKind::Users, sources.users, &bus, &config);
        let (posts, post_tasks) =
            ResourceController::new(ResourceKind::Posts, sources.posts, &bus, &config);
        let (comments, comment_tasks) =
            ResourceController::new(ResourceKind::Comments, sources.comments, &bus, &config);
        tasks.extend(post_tasks);
        tasks.extend(comment_tasks);

        info!(
            debounce_ms = config.debounce_ms,
            entry_ttl_secs = config.entry_ttl_secs,
            "Dashboard session created"
        );

        Self {
            users,
            posts,
            comments,
            bus,
            tasks: Mutex::new(tasks),
        }
    }

    pub fn users(&self) -> &ResourceController<UserRecord> {
        &self.users
    }

    pub fn posts(&self) -> &ResourceController<PostRecord> {
        &self.posts
    }

    pub fn comments(&self) -> &ResourceController<CommentRecord> {
        &self.comments
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Abort background tasks, unmount views, and cancel in-flight reads.
    /// Safe to call more than once.
    pub fn teardown(&self) {
        let tasks = std::mem::take(&mut *mutex_lock(&self.tasks, SOURCE, "teardown"));
        if tasks.is_empty() {
            return;
        }
        for task in &tasks {
            task.abort();
        }

        self.users.filters.unmount();
        self.posts.filters.unmount();
        self.comments.filters.unmount();

        self.users.query.cancel_inflight();
        self.posts.query.cancel_inflight();
        self.comments.query.cancel_inflight();

        debug!("Dashboard session torn down");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}
