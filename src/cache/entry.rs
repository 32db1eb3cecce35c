//! Cached list payloads and entry lifecycle states.

use serde::Serialize;
use time::OffsetDateTime;

/// Fetch lifecycle of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// One page of a listed resource, as returned by the server-side collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListPage<E> {
    pub items: Vec<E>,
    pub total: u64,
    pub page: u32,
    pub total_pages: u32,
}

impl<E> ListPage<E> {
    pub fn new(items: Vec<E>, total: u64, page: u32, total_pages: u32) -> Self {
        Self {
            items,
            total,
            page,
            total_pages: total_pages.max(1),
        }
    }

    pub fn empty(page: u32) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page,
            total_pages: 1,
        }
    }
}

/// A cached result plus its metadata.
///
/// Entries are replaced wholesale on every successful read or optimistic
/// write; callers never edit fields of a stored entry in place.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<E> {
    pub value: Option<ListPage<E>>,
    pub status: FetchStatus,
    /// Present iff `status == FetchStatus::Error`.
    pub error: Option<String>,
    pub updated_at: OffsetDateTime,
    /// Stale entries are refetched on the next read.
    pub stale: bool,
}

impl<E: Clone> CacheEntry<E> {
    /// Entry for a key that has never been fetched.
    pub fn idle() -> Self {
        Self {
            value: None,
            status: FetchStatus::Idle,
            error: None,
            updated_at: OffsetDateTime::now_utc(),
            stale: false,
        }
    }

    /// Entry for an in-flight fetch, keeping any previously loaded payload
    /// visible while the new one arrives.
    pub fn loading_from(previous: Option<&CacheEntry<E>>) -> Self {
        Self {
            value: previous.and_then(|entry| entry.value.clone()),
            status: FetchStatus::Loading,
            error: None,
            updated_at: OffsetDateTime::now_utc(),
            stale: false,
        }
    }

    /// Fresh successful result.
    pub fn success(page: ListPage<E>) -> Self {
        Self {
            value: Some(page),
            status: FetchStatus::Success,
            error: None,
            updated_at: OffsetDateTime::now_utc(),
            stale: false,
        }
    }

    /// Failed fetch. The previous successful payload, when present, stays
    /// visible rather than being cleared.
    pub fn failed(previous: Option<&CacheEntry<E>>, message: impl Into<String>) -> Self {
        Self {
            value: previous.and_then(|entry| entry.value.clone()),
            status: FetchStatus::Error,
            error: Some(message.into()),
            updated_at: OffsetDateTime::now_utc(),
            stale: false,
        }
    }

    /// Copy of this entry with `stale` set.
    pub fn invalidated(&self) -> Self {
        Self {
            stale: true,
            ..self.clone()
        }
    }

    /// Copy of this entry with an in-flight load rolled back: the status
    /// returns to `Success` when a payload is present, `Idle` otherwise.
    pub fn load_cancelled(&self) -> Self {
        let status = match self.status {
            FetchStatus::Loading => {
                if self.value.is_some() {
                    FetchStatus::Success
                } else {
                    FetchStatus::Idle
                }
            }
            other => other,
        };
        Self {
            status,
            ..self.clone()
        }
    }

    /// Replacement entry whose payload, when present, is passed through `f`.
    /// Status, staleness, and error carry over unchanged.
    pub fn map_value(&self, f: impl FnOnce(&ListPage<E>) -> ListPage<E>) -> Self {
        Self {
            value: self.value.as_ref().map(f),
            status: self.status,
            error: self.error.clone(),
            updated_at: OffsetDateTime::now_utc(),
            stale: self.stale,
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.status, FetchStatus::Success | FetchStatus::Error)
    }
}
