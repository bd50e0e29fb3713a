//! Configuration Module
//!
//! Handles loading and managing configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// == Store Config ==
/// Settings injected into `CacheStore` and `OfflineQueue`.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// TTL applied when `set` is called without one
    pub default_ttl: Duration,
    /// Aggregate size budget for cached values, in bytes
    pub max_cache_size: u64,
    /// Whether the durable tier is used at all
    pub persistent_storage: bool,
    /// Failed replays tolerated before a queued operation is dropped
    pub max_retry_count: u32,
    /// Coalesce concurrent `cache_wrap` misses on the same key
    pub single_flight: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_millis(300_000),
            max_cache_size: 50 * 1024 * 1024,
            persistent_storage: true,
            max_retry_count: 3,
            single_flight: false,
        }
    }
}

impl StoreConfig {
    /// Loads the data-layer settings from environment variables.
    ///
    /// # Environment Variables
    /// - `DEFAULT_TTL_MS` - Default TTL in milliseconds (default: 300000)
    /// - `MAX_CACHE_SIZE` - Cache size budget in bytes (default: 50 MiB)
    /// - `PERSISTENT_STORAGE` - Enable the durable tier (default: true)
    /// - `MAX_RETRY_COUNT` - Replay attempts before dropping (default: 3)
    /// - `SINGLE_FLIGHT` - Coalesce concurrent misses (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_ttl: Duration::from_millis(env_or(
                "DEFAULT_TTL_MS",
                defaults.default_ttl.as_millis() as u64,
            )),
            max_cache_size: env_or("MAX_CACHE_SIZE", defaults.max_cache_size),
            persistent_storage: env_or("PERSISTENT_STORAGE", defaults.persistent_storage),
            max_retry_count: env_or("MAX_RETRY_COUNT", defaults.max_retry_count),
            single_flight: env_or("SINGLE_FLIGHT", defaults.single_flight),
        }
    }
}

// == Config ==
/// Process configuration for the proxy binary.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Data-layer settings
    pub store: StoreConfig,
    /// Directory holding the durable stores
    pub data_dir: PathBuf,
    /// Base URL of the upstream API
    pub upstream_url: String,
    /// HTTP server port
    pub server_port: u16,
    /// Expiry sweep interval in seconds, 0 disables the sweep
    pub cleanup_interval: u64,
    /// Connectivity probe interval in seconds
    pub probe_interval: u64,
    /// Upstream path polled by the connectivity probe
    pub health_path: String,
    /// Upstream request timeout in seconds
    pub request_timeout: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - see [`StoreConfig::from_env`]
    /// - `DATA_DIR` - Durable store directory (default: ./data)
    /// - `UPSTREAM_URL` - Upstream base URL (default: http://127.0.0.1:8080)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Expiry sweep frequency in seconds (default: 60)
    /// - `PROBE_INTERVAL` - Connectivity probe frequency in seconds (default: 5)
    /// - `HEALTH_PATH` - Upstream probe path (default: /health)
    /// - `REQUEST_TIMEOUT` - Upstream timeout in seconds (default: 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            store: StoreConfig::from_env(),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            upstream_url: env::var("UPSTREAM_URL").unwrap_or(defaults.upstream_url),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
            probe_interval: env_or("PROBE_INTERVAL", defaults.probe_interval),
            health_path: env::var("HEALTH_PATH").unwrap_or(defaults.health_path),
            request_timeout: env_or("REQUEST_TIMEOUT", defaults.request_timeout),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            data_dir: PathBuf::from("./data"),
            upstream_url: "http://127.0.0.1:8080".to_string(),
            server_port: 3000,
            cleanup_interval: 60,
            probe_interval: 5,
            health_path: "/health".to_string(),
            request_timeout: 30,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
