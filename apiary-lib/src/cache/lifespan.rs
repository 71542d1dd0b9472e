use std::collections::HashMap;
use std::time::Duration;

use crate::Endpoint;

/// Per-endpoint lifespan overrides, keyed by endpoint name
pub type LifespanOverrides = HashMap<String, Duration>;

/// Resolves how long a cache entry stays fresh.
///
/// Priority: per-client override for the endpoint name, then the endpoint's
/// static default, then the global default. Failed outcomes use the error
/// lifespan instead when one is configured.
#[derive(Debug, Clone, Default)]
pub struct Lifespans {
    overrides: LifespanOverrides,
    default: Duration,
    error: Option<Duration>,
}

impl Lifespans {
    /// Create a resolver from the override table and the fallbacks
    #[must_use]
    pub fn new(overrides: LifespanOverrides, default: Duration, error: Option<Duration>) -> Self {
        Self {
            overrides,
            default,
            error,
        }
    }

    /// Lifespan of a successful outcome for `endpoint`
    #[must_use]
    pub fn resolve(&self, endpoint: &Endpoint) -> Duration {
        self.overrides
            .get(endpoint.name())
            .copied()
            .or_else(|| endpoint.default_lifespan())
            .unwrap_or(self.default)
    }

    /// Lifespan of a failed outcome, if it differs from successes
    #[must_use]
    pub const fn error(&self) -> Option<Duration> {
        self.error
    }
}
