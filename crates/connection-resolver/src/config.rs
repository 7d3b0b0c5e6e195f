use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MONITOR_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_MONITOR_MAX_CONCURRENCY: usize = 10;

/// How ranked candidates are tested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackMode {
    /// One candidate at a time, stopping at the first success
    Sequential,
    /// Up to `max_in_flight` probes at once; rank order still decides the winner
    Concurrent { max_in_flight: usize },
}

impl FallbackMode {
    pub fn from_max_in_flight(max_in_flight: usize) -> Self {
        if max_in_flight <= 1 {
            FallbackMode::Sequential
        } else {
            FallbackMode::Concurrent { max_in_flight }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Per-candidate connectivity timeout
    pub probe_timeout: Duration,
    /// Snapshot and device information requests
    pub request_timeout: Duration,
    pub fallback: FallbackMode,
    pub monitor_interval: Duration,
    pub monitor_max_concurrency: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            fallback: FallbackMode::Sequential,
            monitor_interval: Duration::from_secs(DEFAULT_MONITOR_INTERVAL_SECS),
            monitor_max_concurrency: DEFAULT_MONITOR_MAX_CONCURRENCY,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

impl ResolverConfig {
    /// Load configuration from environment, falling back to defaults
    pub fn from_env() -> Self {
        let probe_timeout_secs = env_or("PROBE_TIMEOUT_SECS", DEFAULT_PROBE_TIMEOUT_SECS).max(1);
        let request_timeout_secs =
            env_or("SNAPSHOT_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS).max(1);
        let max_in_flight = env_or("FALLBACK_MAX_IN_FLIGHT", 1usize);
        let monitor_interval_secs =
            env_or("MONITOR_INTERVAL_SECS", DEFAULT_MONITOR_INTERVAL_SECS).max(1);
        let monitor_max_concurrency =
            env_or("MONITOR_MAX_CONCURRENCY", DEFAULT_MONITOR_MAX_CONCURRENCY).max(1);

        Self {
            probe_timeout: Duration::from_secs(probe_timeout_secs),
            request_timeout: Duration::from_secs(request_timeout_secs),
            fallback: FallbackMode::from_max_in_flight(max_in_flight),
            monitor_interval: Duration::from_secs(monitor_interval_secs),
            monitor_max_concurrency,
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_fallback(mut self, fallback: FallbackMode) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval;
        self
    }

    pub fn with_monitor_max_concurrency(mut self, max: usize) -> Self {
        self.monitor_max_concurrency = max.max(1);
        self
    }
}
