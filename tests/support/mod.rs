#![allow(dead_code)]

//! Shared test doubles: an in-memory backend standing in for the server-side
//! collaborators.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use time::macros::datetime;

use lampo::{
    AccountStatus, FieldPatch, ListFilter, ListItem, ListPage, ListSource, ResourceSources,
    SessionSources, SourceError, UserRecord, UserRole, WriteReceipt, WriteSource,
};

pub fn user(id: &str, name: &str) -> UserRecord {
    UserRecord {
        id: id.to_string(),
        name: name.to_string(),
        email: format!("{id}@example.com"),
        role: UserRole::Member,
        status: AccountStatus::Active,
        created_at: datetime!(2024-01-01 00:00 UTC),
    }
}

pub fn users(count: usize) -> Vec<UserRecord> {
    (1..=count)
        .map(|n| user(&format!("u-{n}"), &format!("User {n}")))
        .collect()
}

/// Scripted outcome for one write call.
pub struct WriteScript {
    pub delay: Duration,
    pub result: Result<WriteReceipt, SourceError>,
}

/// In-memory users backend implementing both collaborator traits.
///
/// Reads paginate the backing dataset (search matches on name,
/// case-insensitive); successful writes mutate the dataset so settlement
/// refetches observe server truth. Failures and delays are scripted per call.
pub struct StubBackend {
    dataset: Mutex<Vec<UserRecord>>,
    list_delay: Mutex<Duration>,
    list_calls: AtomicUsize,
    seen_filters: Mutex<Vec<ListFilter>>,
    list_failures: Mutex<VecDeque<SourceError>>,
    write_scripts: Mutex<VecDeque<WriteScript>>,
    deleted: Mutex<Vec<String>>,
}

impl StubBackend {
    pub fn new(dataset: Vec<UserRecord>) -> Arc<Self> {
        Arc::new(Self {
            dataset: Mutex::new(dataset),
            list_delay: Mutex::new(Duration::ZERO),
            list_calls: AtomicUsize::new(0),
            seen_filters: Mutex::new(Vec::new()),
            list_failures: Mutex::new(VecDeque::new()),
            write_scripts: Mutex::new(VecDeque::new()),
            deleted: Mutex::new(Vec::new()),
        })
    }

    pub fn set_list_delay(&self, delay: Duration) {
        *self.list_delay.lock().expect("list_delay lock") = delay;
    }

    pub fn fail_next_list(&self, err: SourceError) {
        self.list_failures
            .lock()
            .expect("list_failures lock")
            .push_back(err);
    }

    pub fn script_write(&self, script: WriteScript) {
        self.write_scripts
            .lock()
            .expect("write_scripts lock")
            .push_back(script);
    }

    pub fn fail_next_write(&self, err: SourceError) {
        self.script_write(WriteScript {
            delay: Duration::ZERO,
            result: Err(err),
        });
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn seen_filters(&self) -> Vec<ListFilter> {
        self.seen_filters.lock().expect("seen_filters lock").clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().expect("deleted lock").clone()
    }

    pub fn dataset(&self) -> Vec<UserRecord> {
        self.dataset.lock().expect("dataset lock").clone()
    }

    async fn run_write_script(&self) -> Option<Result<WriteReceipt, SourceError>> {
        let script = self.write_scripts.lock().expect("write_scripts lock").pop_front();
        match script {
            Some(script) => {
                if !script.delay.is_zero() {
                    tokio::time::sleep(script.delay).await;
                }
                Some(script.result)
            }
            None => None,
        }
    }
}

#[async_trait]
impl ListSource<UserRecord> for StubBackend {
    async fn list(&self, filter: &ListFilter) -> Result<ListPage<UserRecord>, SourceError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_filters
            .lock()
            .expect("seen_filters lock")
            .push(filter.clone());

        let delay = *self.list_delay.lock().expect("list_delay lock");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self
            .list_failures
            .lock()
            .expect("list_failures lock")
            .pop_front()
        {
            return Err(err);
        }

        let dataset = self.dataset.lock().expect("dataset lock");
        let matching: Vec<UserRecord> = match filter.search.as_deref() {
            Some(term) => {
                let term = term.to_lowercase();
                dataset
                    .iter()
                    .filter(|record| record.name.to_lowercase().contains(&term))
                    .cloned()
                    .collect()
            }
            None => dataset.clone(),
        };

        let total = matching.len() as u64;
        let total_pages = total.div_ceil(u64::from(filter.page_size)).max(1) as u32;
        let start = ((filter.page - 1) * filter.page_size) as usize;
        let items: Vec<UserRecord> = matching
            .into_iter()
            .skip(start)
            .take(filter.page_size as usize)
            .collect();

        Ok(ListPage::new(items, total, filter.page, total_pages))
    }
}

#[async_trait]
impl WriteSource for StubBackend {
    async fn delete(&self, id: &str) -> Result<WriteReceipt, SourceError> {
        if let Some(result) = self.run_write_script().await {
            return result;
        }

        let mut dataset = self.dataset.lock().expect("dataset lock");
        dataset.retain(|record| record.id() != id);
        self.deleted.lock().expect("deleted lock").push(id.to_string());
        Ok(WriteReceipt::ok("deleted"))
    }

    async fn update_field(&self, patch: &FieldPatch) -> Result<WriteReceipt, SourceError> {
        if let Some(result) = self.run_write_script().await {
            return result;
        }

        let mut dataset = self.dataset.lock().expect("dataset lock");
        for record in dataset.iter_mut() {
            if record.id() == patch.id {
                record.apply_field(&patch.field, &patch.value);
            }
        }
        Ok(WriteReceipt::ok("updated"))
    }
}

/// Backend with no data, for the resource kinds a test does not exercise.
pub struct EmptyBackend;

#[async_trait]
impl<E: ListItem> ListSource<E> for EmptyBackend {
    async fn list(&self, filter: &ListFilter) -> Result<ListPage<E>, SourceError> {
        Ok(ListPage::empty(filter.page))
    }
}

#[async_trait]
impl WriteSource for EmptyBackend {
    async fn delete(&self, _id: &str) -> Result<WriteReceipt, SourceError> {
        Ok(WriteReceipt::ok("deleted"))
    }

    async fn update_field(&self, _patch: &FieldPatch) -> Result<WriteReceipt, SourceError> {
        Ok(WriteReceipt::ok("updated"))
    }
}

/// Session sources backed by `backend` for users and empty stubs elsewhere.
pub fn session_sources(backend: &Arc<StubBackend>) -> SessionSources {
    SessionSources {
        users: ResourceSources {
            list: Arc::clone(backend) as Arc<dyn ListSource<UserRecord>>,
            write: Arc::clone(backend) as Arc<dyn WriteSource>,
        },
        posts: ResourceSources {
            list: Arc::new(EmptyBackend),
            write: Arc::new(EmptyBackend),
        },
        comments: ResourceSources {
            list: Arc::new(EmptyBackend),
            write: Arc::new(EmptyBackend),
        },
    }
}

/// Let chained tasks (commits, fetches, store writes) run to quiescence.
pub async fn drain() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}
