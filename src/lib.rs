//! Lampo: an optimistic, in-memory list cache and query layer for admin
//! dashboards.
//!
//! The layer keeps paginated list views (users, posts, comments) consistent
//! under concurrent, possibly-failing writes:
//!
//! - **Cache store**: keyed, request-scoped entry map per resource kind
//! - **Query controller**: coalesced reads, retry-once, refetch, prefetch
//! - **Filter state**: debounced search plus page/page-size commits
//! - **Mutation controller**: snapshot → optimistic edit → write →
//!   rollback-or-invalidate
//!
//! Everything is wired through an explicit [`Session`]; the server-side data
//! store stays behind the [`ListSource`] and [`WriteSource`] traits.
//!
//! ```no_run
//! # async fn demo(sources: lampo::SessionSources) {
//! let settings = lampo::config::load(None).expect("configuration");
//! lampo::telemetry::init(&settings.logging).expect("telemetry");
//!
//! let session = lampo::Session::new((&settings.cache).into(), sources);
//! let users = session.users();
//! users.filters().mount();
//! users.filters().set_search("ada");
//! # }
//! ```

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod telemetry;

pub use application::filters::{FilterController, FilterState};
pub use application::mutation::{
    ListEdit, MutationController, MutationError, MutationState, MutationStatus, WriteOp, apply_edit,
};
pub use application::query::{QueryController, QueryHandle};
pub use application::session::{ResourceController, ResourceSources, Session, SessionSources};
pub use application::sources::{FieldPatch, ListSource, SourceError, WriteReceipt, WriteSource};
pub use cache::{
    CacheConfig, CacheEntry, CacheEvent, CacheKey, EventBus, EventKind, FetchStatus, ListFilter,
    ListPage, ListStore, ResourceKind,
};
pub use domain::entities::{CommentRecord, ListItem, PostRecord, UserRecord};
pub use domain::types::{AccountStatus, ModerationStatus, PostStatus, UserRole};
