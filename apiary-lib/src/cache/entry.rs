use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::Outcome;

/// Type-erased cached [`Outcome`]
pub(crate) type Payload = Arc<dyn Any + Send + Sync>;

/// Lifecycle state of a [`CacheEntry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryState {
    /// Exactly one caller is fetching the outcome for this key
    Processing,
    /// The outcome is available
    Cached,
}

/// One slot of the [`super::ResponseCache`].
///
/// A `Cached` entry always holds a payload; a `Processing` entry never does.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    payload: Option<Payload>,
    updated_at: Instant,
    state: EntryState,
    life_span: Duration,
}

impl CacheEntry {
    /// A placeholder for a fetch that has just been claimed
    pub(crate) fn processing(life_span: Duration) -> Self {
        Self {
            payload: None,
            updated_at: Instant::now(),
            state: EntryState::Processing,
            life_span,
        }
    }

    /// A completed entry
    pub(crate) fn cached(payload: Payload, life_span: Duration) -> Self {
        Self {
            payload: Some(payload),
            updated_at: Instant::now(),
            state: EntryState::Cached,
            life_span,
        }
    }

    /// Complete this entry in place so that waiters observe the outcome
    pub(crate) fn fill(&mut self, payload: Payload, life_span: Option<Duration>) {
        self.payload = Some(payload);
        self.updated_at = Instant::now();
        self.state = EntryState::Cached;
        if let Some(life_span) = life_span {
            self.life_span = life_span;
        }
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn state(&self) -> EntryState {
        self.state
    }

    /// Time of the last write
    #[must_use]
    pub const fn updated_at(&self) -> Instant {
        self.updated_at
    }

    /// How long the entry stays fresh after its last write
    #[must_use]
    pub const fn life_span(&self) -> Duration {
        self.life_span
    }

    /// Returns `true` once the entry has outlived its lifespan
    #[must_use]
    pub fn is_stale_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.updated_at) >= self.life_span
    }

    /// The cached outcome, if there is one of type `Outcome<T>`
    pub(crate) fn outcome<T: Clone + 'static>(&self) -> Option<Outcome<T>> {
        self.payload
            .as_ref()
            .and_then(|payload| payload.downcast_ref::<Outcome<T>>())
            .cloned()
    }
}
