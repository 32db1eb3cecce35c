//! Cache key definitions.
//!
//! A cached list page is addressed by its resource kind plus the exact filter
//! set that produced it. Equality of every filter value, not identity, decides
//! cache hits.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// The three resource collections managed by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Users,
    Posts,
    Comments,
}

impl ResourceKind {
    /// Stable label used in log fields and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Posts => "posts",
            Self::Comments => "comments",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filter parameters addressing one cached list page.
///
/// `search` is the debounced term; an empty search is normalized to `None` so
/// that "no search" and "cleared search" hit the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListFilter {
    pub page: u32,
    pub page_size: u32,
    pub search: Option<String>,
}

impl ListFilter {
    /// Build a filter, clamping `page` and `page_size` to at least 1 and
    /// normalizing an empty search term to `None`.
    pub fn new(page: u32, page_size: u32, search: Option<String>) -> Self {
        let search = search.and_then(|term| {
            let trimmed = term.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        });
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
            search,
        }
    }

    /// First page with no search term.
    pub fn first_page(page_size: u32) -> Self {
        Self::new(1, page_size, None)
    }

    /// Same filters, different page.
    pub fn with_page(&self, page: u32) -> Self {
        Self::new(page, self.page_size, self.search.clone())
    }

    /// The page directly after this one, under identical filters.
    pub fn next_page(&self) -> Self {
        self.with_page(self.page.saturating_add(1))
    }
}

/// Unified cache key: resource kind plus filter set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: ResourceKind,
    pub filter: ListFilter,
}

impl CacheKey {
    pub fn new(kind: ResourceKind, filter: ListFilter) -> Self {
        Self { kind, filter }
    }
}

/// Compute a hash for any hashable value.
pub fn hash_value<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}
