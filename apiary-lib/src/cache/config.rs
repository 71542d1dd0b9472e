use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default time a cached outcome stays fresh
const DEFAULT_LIFESPAN: Duration = Duration::from_secs(60);

/// Default interval between checks while waiting for an in-flight fetch
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Default number of times a stale in-flight entry is evicted before the
/// waiter takes over the fetch itself
const DEFAULT_STALE_RETRIES: usize = 2;

/// Response cache configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Lifespan of entries whose endpoint has neither an override nor a
    /// static default
    #[serde(default = "default_lifespan", with = "humantime_serde")]
    pub default_lifespan: Duration,

    /// Lifespan of failed outcomes.
    ///
    /// `None` caches failures exactly as long as successes would be.
    #[serde(default, with = "humantime_serde")]
    pub error_lifespan: Option<Duration>,

    /// Interval between checks while waiting for another caller's fetch
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    /// How often a stale in-flight entry is evicted before giving up and
    /// fetching regardless
    #[serde(default = "default_stale_retries")]
    pub stale_retries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_lifespan: default_lifespan(),
            error_lifespan: None,
            poll_interval: default_poll_interval(),
            stale_retries: default_stale_retries(),
        }
    }
}

const fn default_lifespan() -> Duration {
    DEFAULT_LIFESPAN
}

const fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

const fn default_stale_retries() -> usize {
    DEFAULT_STALE_RETRIES
}
