//! Cache runtime configuration.

use std::time::Duration;

use serde::Deserialize;

// Default values for cache configuration
const DEFAULT_DEBOUNCE_MS: u64 = 500;
const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
const DEFAULT_ENTRY_TTL_SECS: u64 = 600;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
const DEFAULT_EVENT_CAPACITY: usize = 128;

/// Runtime knobs for the cache and its controllers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Quiescence window before a search term is committed (ms).
    pub debounce_ms: u64,
    /// Delay before the single automatic read retry (ms).
    pub retry_delay_ms: u64,
    /// Time-to-live past the last read before a reader-free entry is swept (s).
    pub entry_ttl_secs: u64,
    /// Cadence of the background sweep (s).
    pub sweep_interval_secs: u64,
    /// Warm the next page's cache entry on page advance.
    pub prefetch_next_page: bool,
    /// Capacity of the cache event bus.
    pub event_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            entry_ttl_secs: DEFAULT_ENTRY_TTL_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            prefetch_next_page: true,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            debounce_ms: settings.debounce_ms,
            retry_delay_ms: settings.retry_delay_ms,
            entry_ttl_secs: settings.entry_ttl_secs,
            sweep_interval_secs: settings.sweep_interval_secs,
            prefetch_next_page: settings.prefetch_next_page,
            event_capacity: settings.event_capacity,
        }
    }
}

impl CacheConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Entry TTL, clamping to one second if configured as zero.
    pub fn entry_ttl(&self) -> Duration {
        Duration::from_secs(self.entry_ttl_secs.max(1))
    }

    /// Sweep cadence, clamping to one second if configured as zero.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Event bus capacity, clamping to 1 if zero.
    pub fn event_capacity_non_zero(&self) -> usize {
        self.event_capacity.max(1)
    }
}
