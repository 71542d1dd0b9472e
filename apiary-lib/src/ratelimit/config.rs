use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of requests in flight at the same time
const DEFAULT_MAX_CONCURRENT: usize = 15;

/// Default number of requests admitted per window
const DEFAULT_MAX_PER_WINDOW: usize = 30;

/// Default length of the sliding rate window
const DEFAULT_WINDOW: Duration = Duration::from_secs(3);

/// Throttling configuration shared by all requests of a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThrottleConfig {
    /// Maximum number of requests in flight at the same time
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Maximum number of requests admitted within any one window
    #[serde(default = "default_max_per_window")]
    pub max_per_window: usize,

    /// Length of the sliding rate window
    #[serde(default = "default_window", with = "humantime_serde")]
    pub window: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            max_per_window: default_max_per_window(),
            window: default_window(),
        }
    }
}

const fn default_max_concurrent() -> usize {
    DEFAULT_MAX_CONCURRENT
}

const fn default_max_per_window() -> usize {
    DEFAULT_MAX_PER_WINDOW
}

const fn default_window() -> Duration {
    DEFAULT_WINDOW
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_throttle_config() {
        let config = ThrottleConfig::default();
        assert_eq!(config.max_concurrent, 15);
        assert_eq!(config.max_per_window, 30);
        assert_eq!(config.window, Duration::from_secs(3));
    }

    #[test]
    fn test_config_serialization() {
        let config = ThrottleConfig {
            max_concurrent: 4,
            max_per_window: 10,
            window: Duration::from_millis(1500),
        };

        let toml = toml::to_string(&config).unwrap();
        let deserialized: ThrottleConfig = toml::from_str(&toml).unwrap();

        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_human_readable_window() {
        let config: ThrottleConfig = toml::from_str(r#"window = "500ms""#).unwrap();
        assert_eq!(config.window, Duration::from_millis(500));
        assert_eq!(config.max_concurrent, 15);
    }
}
