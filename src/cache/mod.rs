//! Lampo cache system.
//!
//! A request-scoped, in-memory, keyed cache for paginated admin list views:
//!
//! - **Store**: one keyed entry map per resource kind, replaced wholesale on
//!   every read or optimistic write
//! - **Events**: broadcast notifications driving re-render and revalidation
//! - **TTL sweep**: reader-free entries are garbage-collected after a fixed
//!   time past their last read
//!
//! ## Configuration
//!
//! Cache behavior is controlled via `lampo.toml`:
//!
//! ```toml
//! [cache]
//! debounce_ms = 500
//! retry_delay_ms = 1000
//! entry_ttl_secs = 600
//! # ... see config.rs for all options
//! ```

mod config;
mod entry;
mod events;
mod keys;
mod lock;
mod store;

pub(crate) use lock::mutex_lock;

pub use config::CacheConfig;
pub use entry::{CacheEntry, FetchStatus, ListPage};
pub use events::{CacheEvent, Epoch, EventBus, EventKind};
pub use keys::{CacheKey, ListFilter, ResourceKind, hash_value};
pub use store::ListStore;
