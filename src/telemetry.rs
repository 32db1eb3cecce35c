//! Telemetry setup: tracing subscriber and metric descriptions.

use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use thiserror::Error;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

static METRIC_DESCRIPTIONS: Once = Once::new();

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(String),
}

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), TelemetryError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| TelemetryError::Subscriber(err.to_string()))
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "lampo_cache_hit_total",
            Unit::Count,
            "Total number of cache hits."
        );
        describe_counter!(
            "lampo_cache_miss_total",
            Unit::Count,
            "Total number of cache misses."
        );
        describe_counter!(
            "lampo_cache_invalidate_total",
            Unit::Count,
            "Total number of cache entries marked stale."
        );
        describe_counter!(
            "lampo_cache_evict_total",
            Unit::Count,
            "Total number of expired cache entries removed by the sweeper."
        );
        describe_gauge!(
            "lampo_cache_entries",
            Unit::Count,
            "Current number of cached list pages."
        );
        describe_counter!(
            "lampo_query_fetch_total",
            Unit::Count,
            "Total number of list fetches issued."
        );
        describe_counter!(
            "lampo_query_retry_total",
            Unit::Count,
            "Total number of automatic read retries."
        );
        describe_counter!(
            "lampo_query_coalesced_total",
            Unit::Count,
            "Total number of reads coalesced onto an in-flight fetch."
        );
        describe_histogram!(
            "lampo_query_fetch_ms",
            Unit::Milliseconds,
            "List fetch latency in milliseconds."
        );
        describe_counter!(
            "lampo_mutation_total",
            Unit::Count,
            "Total number of mutations issued."
        );
        describe_counter!(
            "lampo_mutation_rollback_total",
            Unit::Count,
            "Total number of optimistic edits rolled back after a failed write."
        );
    });
}
