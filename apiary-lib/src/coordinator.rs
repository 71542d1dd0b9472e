//! Resolution of requests through the cache and the throttler.
//!
//! [`RequestCoordinator::resolve`] is the single entry point used to run a
//! fetch: it answers from the cache when possible, makes sure at most one
//! fetch per key is in flight, and turns every failure into an [`Outcome`]
//! instead of an error.

use std::future::Future;
use std::sync::Arc;

use log::{debug, warn};
use tokio::time::Instant;

use crate::cache::{Claim, ResponseCache};
use crate::ratelimit::Throttler;
use crate::{ApiError, ErrorKind, FetchError, Outcome, Page, RequestKey, Source};

/// Combines a [`ResponseCache`] and a [`Throttler`] into request resolution.
///
/// Cloning is cheap and clones share both.
#[derive(Debug, Clone)]
pub struct RequestCoordinator {
    cache: Arc<ResponseCache>,
    throttler: Arc<Throttler>,
}

impl RequestCoordinator {
    /// Create a coordinator over a shared cache and throttler
    #[must_use]
    pub const fn new(cache: Arc<ResponseCache>, throttler: Arc<Throttler>) -> Self {
        Self { cache, throttler }
    }

    /// The cache outcomes are stored in
    #[must_use]
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// The throttler fetches pass through
    #[must_use]
    pub fn throttler(&self) -> &Throttler {
        &self.throttler
    }

    /// Resolve `key`, fetching it only if no fresh outcome is cached and no
    /// other caller is already fetching it.
    ///
    /// Every outcome produced by `fetch`, successful or not, is cached under
    /// `key`. Outcomes served from the cache have [`Source::Cache`].
    pub async fn resolve<T, F, Fut>(&self, key: &RequestKey, fetch: F) -> Outcome<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Page<T>, FetchError>>,
    {
        self.resolve_with_deadline(key, fetch, None).await
    }

    /// Like [`RequestCoordinator::resolve`], but gives up once `deadline`
    /// passes.
    ///
    /// A deadline failure is never cached. If this caller owned the fetch,
    /// its claim is released so that other callers can take over.
    pub async fn resolve_with_deadline<T, F, Fut>(
        &self,
        key: &RequestKey,
        fetch: F,
        deadline: Option<Instant>,
    ) -> Outcome<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Page<T>, FetchError>>,
    {
        self.resolve_checked(key, || Ok(()), fetch, deadline).await
    }

    /// Like [`RequestCoordinator::resolve_with_deadline`], but runs `check`
    /// before the fetch is throttled.
    ///
    /// A failed check becomes the cached outcome for `key` without taking a
    /// concurrency permit or a slot in the rate window.
    pub async fn resolve_checked<T, C, F, Fut>(
        &self,
        key: &RequestKey,
        check: C,
        fetch: F,
        deadline: Option<Instant>,
    ) -> Outcome<T>
    where
        T: Clone + Send + Sync + 'static,
        C: FnOnce() -> Result<(), FetchError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Page<T>, FetchError>>,
    {
        match self.cache.claim::<T>(key, deadline).await {
            Claim::Hit(mut outcome) => {
                outcome.source = Source::Cache;
                outcome
            }
            Claim::TimedOut => deadline_exceeded(key),
            Claim::Owner => {
                let mut guard = OwnerGuard::new(&self.cache, key);

                let result = match check() {
                    Ok(()) => self.throttler.execute(key, fetch, deadline).await,
                    Err(e) => Err(e),
                };
                let outcome = match result {
                    Ok(outcome) => outcome,
                    Err(FetchError::Deadline) => {
                        debug!("Deadline passed while fetching `{key}`, releasing claim");
                        // the guard releases the claim
                        return deadline_exceeded(key);
                    }
                    Err(e) => failure_outcome(key, e),
                };

                self.cache.store(key, &outcome);
                guard.disarm();
                outcome
            }
        }
    }
}

/// Map a fetch failure to the outcome reported and cached for `key`
fn failure_outcome<T>(key: &RequestKey, error: FetchError) -> Outcome<T> {
    let key = key.to_string();
    match error {
        FetchError::Validation(reason) => {
            Outcome::failure(Source::LocalError, ErrorKind::InvalidRequest { key, reason })
        }
        FetchError::Status { status, body } => {
            let error = match ApiError::decode(&body) {
                Some(error) => ErrorKind::Api { key, status, error },
                None => ErrorKind::UnexpectedResponse { key, status, body },
            };
            warn!("{error}");
            Outcome::failure(Source::RemoteError, error)
        }
        FetchError::Transport(source) => Outcome::failure(
            Source::RemoteError,
            ErrorKind::Transport {
                key,
                source: Arc::from(source),
            },
        ),
        FetchError::Decode(source) => Outcome::failure(
            Source::RemoteError,
            ErrorKind::Decode {
                key,
                source: Arc::new(source),
            },
        ),
        FetchError::Deadline => deadline_exceeded_for(key),
    }
}

fn deadline_exceeded<T>(key: &RequestKey) -> Outcome<T> {
    deadline_exceeded_for(key.to_string())
}

fn deadline_exceeded_for<T>(key: String) -> Outcome<T> {
    Outcome::failure(Source::LocalError, ErrorKind::DeadlineExceeded { key })
}

/// Releases an in-flight claim unless disarmed, so that a cancelled or
/// failed owner never leaves waiters behind
struct OwnerGuard<'a> {
    cache: &'a ResponseCache,
    key: &'a RequestKey,
    armed: bool,
}

impl<'a> OwnerGuard<'a> {
    const fn new(cache: &'a ResponseCache, key: &'a RequestKey) -> Self {
        Self {
            cache,
            key,
            armed: true,
        }
    }

    const fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for OwnerGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.cache.release(self.key);
        }
    }
}
