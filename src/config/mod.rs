//! Configuration layer: typed settings with layered precedence (file → env).

use std::path::Path;
use std::str::FromStr;

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const LOCAL_CONFIG_BASENAME: &str = "lampo";

const DEFAULT_DEBOUNCE_MS: u64 = 500;
const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
const DEFAULT_ENTRY_TTL_SECS: u64 = 600;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
const DEFAULT_EVENT_CAPACITY: usize = 128;

/// Fully validated settings for a host embedding the layer.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub debounce_ms: u64,
    pub retry_delay_ms: u64,
    pub entry_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    pub prefetch_next_page: bool,
    pub event_capacity: usize,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment).
pub fn load(config_file: Option<&Path>) -> Result<Settings, LoadError> {
    let mut builder =
        Config::builder().add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = config_file {
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("LAMPO").separator("__"));

    let raw: RawSettings = builder.build()?.try_deserialize()?;
    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    debounce_ms: Option<u64>,
    retry_delay_ms: Option<u64>,
    entry_ttl_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
    prefetch_next_page: Option<bool>,
    event_capacity: Option<usize>,
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        Ok(Self {
            logging: build_logging_settings(raw.logging)?,
            cache: build_cache_settings(raw.cache)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let entry_ttl_secs = cache.entry_ttl_secs.unwrap_or(DEFAULT_ENTRY_TTL_SECS);
    if entry_ttl_secs == 0 {
        return Err(LoadError::invalid(
            "cache.entry_ttl_secs",
            "must be greater than zero",
        ));
    }

    let sweep_interval_secs = cache
        .sweep_interval_secs
        .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS);
    if sweep_interval_secs == 0 {
        return Err(LoadError::invalid(
            "cache.sweep_interval_secs",
            "must be greater than zero",
        ));
    }

    let event_capacity = cache.event_capacity.unwrap_or(DEFAULT_EVENT_CAPACITY);
    if event_capacity == 0 {
        return Err(LoadError::invalid(
            "cache.event_capacity",
            "must be greater than zero",
        ));
    }

    Ok(CacheSettings {
        debounce_ms: cache.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS),
        retry_delay_ms: cache.retry_delay_ms.unwrap_or(DEFAULT_RETRY_DELAY_MS),
        entry_ttl_secs,
        sweep_interval_secs,
        prefetch_next_page: cache.prefetch_next_page.unwrap_or(true),
        event_capacity,
    })
}
