use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use log::{debug, trace};
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::time::{Instant, timeout_at};

use super::window::Window;
use super::{ThrottleConfig, ThrottleStats};
use crate::{FetchError, Outcome, Page, RequestKey};

/// Gatekeeper for outgoing requests.
///
/// Every fetch passes two gates before it runs:
/// - a hard ceiling on the number of fetches in flight
/// - a sliding window limiting how many fetches start per time window
///
/// Neither gate is fair: waiters are admitted in no particular order, but
/// every waiter is admitted eventually.
#[derive(Debug)]
pub struct Throttler {
    /// Controls the maximum number of fetches in flight
    semaphore: Semaphore,

    /// Admission times of the latest fetches
    window: Mutex<Window>,

    config: ThrottleConfig,

    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    total_requests: AtomicU64,
    failed_requests: AtomicU64,
    rate_delayed: AtomicU64,
    fetch_time_micros: AtomicU64,
}

impl Throttler {
    /// Create a throttler from its configuration.
    ///
    /// Limits of zero are raised to one.
    #[must_use]
    pub fn new(config: ThrottleConfig) -> Self {
        let max_concurrent = config.max_concurrent.max(1);
        let max_per_window = config.max_per_window.max(1);

        Self {
            semaphore: Semaphore::new(max_concurrent),
            window: Mutex::new(Window::new(max_per_window, config.window)),
            config: ThrottleConfig {
                max_concurrent,
                max_per_window,
                window: config.window,
            },
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            total_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            rate_delayed: AtomicU64::new(0),
            fetch_time_micros: AtomicU64::new(0),
        }
    }

    /// Run `fetch` once both gates admit it.
    ///
    /// The steps are:
    /// 1. Acquire a concurrency permit
    /// 2. Reserve a slot in the rate window, sleeping until it opens
    /// 3. Run the fetch and record statistics
    /// 4. Wrap the page as a network [`Outcome`]
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `fetch`. Returns
    /// [`FetchError::Deadline`] if `deadline` passes at any of the steps
    /// above; the fetch is then dropped.
    pub async fn execute<T, F, Fut>(
        &self,
        key: &RequestKey,
        fetch: F,
        deadline: Option<Instant>,
    ) -> Result<Outcome<T>, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Page<T>, FetchError>>,
    {
        let _permit = self.acquire(deadline).await?;
        self.wait_for_window(key, deadline).await?;

        let _in_flight = InFlight::enter(self);
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        debug!("Fetching `{key}`");

        let started = Instant::now();
        let result = match deadline {
            Some(deadline) => timeout_at(deadline, fetch())
                .await
                .unwrap_or_else(|_| Err(FetchError::Deadline)),
            None => fetch().await,
        };
        self.record(started.elapsed(), result.is_err());

        if let Err(e) = &result {
            debug!("Fetching `{key}` failed: {e}");
        }
        result.map(Outcome::from_page)
    }

    async fn acquire(&self, deadline: Option<Instant>) -> Result<SemaphorePermit<'_>, FetchError> {
        let acquire = self.semaphore.acquire();
        let permit = match deadline {
            Some(deadline) => timeout_at(deadline, acquire)
                .await
                .map_err(|_| FetchError::Deadline)?,
            None => acquire.await,
        };
        // SAFETY: this should not panic as we never close the semaphore
        Ok(permit.expect("Semaphore was closed unexpectedly"))
    }

    async fn wait_for_window(
        &self,
        key: &RequestKey,
        deadline: Option<Instant>,
    ) -> Result<(), FetchError> {
        let now = Instant::now();
        let admit_at = self.lock_window().reserve(now);
        if admit_at <= now {
            return Ok(());
        }

        if let Some(deadline) = deadline
            && admit_at > deadline
        {
            self.lock_window().cancel(admit_at);
            return Err(FetchError::Deadline);
        }

        self.rate_delayed.fetch_add(1, Ordering::Relaxed);
        trace!(
            "Rate window full, delaying `{key}` by {:?}",
            admit_at.saturating_duration_since(now)
        );
        tokio::time::sleep_until(admit_at).await;
        Ok(())
    }

    fn lock_window(&self) -> std::sync::MutexGuard<'_, Window> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, elapsed: Duration, failed: bool) {
        if failed {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.fetch_time_micros.fetch_add(micros, Ordering::Relaxed);
    }

    /// Configuration in effect, after raising zero limits
    #[must_use]
    pub const fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    /// Number of fetches currently in flight
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Number of fetches that may start right now without waiting for the
    /// concurrency gate
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Snapshot of the throttling counters
    #[must_use]
    pub fn stats(&self) -> ThrottleStats {
        ThrottleStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            rate_delayed: self.rate_delayed.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            peak_in_flight: self.peak_in_flight.load(Ordering::Relaxed),
            total_fetch_time: Duration::from_micros(self.fetch_time_micros.load(Ordering::Relaxed)),
        }
    }
}

impl Default for Throttler {
    fn default() -> Self {
        Self::new(ThrottleConfig::default())
    }
}

/// Counts a fetch as in flight until dropped
struct InFlight<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(throttler: &'a Throttler) -> Self {
        let current = throttler.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        throttler.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        Self {
            counter: &throttler.in_flight,
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}
