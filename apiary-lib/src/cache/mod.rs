//! In-memory response cache with single-flight semantics.
//!
//! For every [`RequestKey`] the [`ResponseCache`] either hands out a fresh
//! cached [`Outcome`] or grants exactly one caller the right to fetch it.
//! Other callers asking for the same key in the meantime wait until the
//! owner stores its outcome and then share it.
//!
//! Waiting is done by polling at a short fixed interval. Correctness does not
//! depend on wakeup latency, only on re-checking eventually.

mod config;
mod entry;
mod lifespan;

pub use config::CacheConfig;
pub use entry::{CacheEntry, EntryState};
pub use lifespan::{LifespanOverrides, Lifespans};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use log::{debug, trace, warn};
use serde::Serialize;
use tokio::time::Instant;

use crate::{Outcome, RequestKey, Source};
use entry::Payload;

/// Result of [`ResponseCache::claim`]
#[derive(Debug)]
pub enum Claim<T> {
    /// The caller owns the fetch and must call [`ResponseCache::store`]
    /// (or [`ResponseCache::release`]) when done
    Owner,
    /// A fresh outcome, produced earlier or by a concurrent owner
    Hit(Outcome<T>),
    /// The deadline passed while waiting for another caller's fetch
    TimedOut,
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Claims answered with a cached outcome
    pub hits: u64,
    /// Claims that granted fetch ownership
    pub misses: u64,
    /// Poll rounds spent waiting for in-flight fetches
    pub waits: u64,
    /// Entries currently held
    pub entries: usize,
}

/// Thread-safe keyed store of outcomes, at most one concurrent fetch per key
#[derive(Debug)]
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    lifespans: Lifespans,
    poll_interval: Duration,
    stale_retries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    waits: AtomicU64,
}

impl ResponseCache {
    /// Create an empty cache
    #[must_use]
    pub fn new(config: CacheConfig, overrides: LifespanOverrides) -> Self {
        Self {
            entries: DashMap::new(),
            lifespans: Lifespans::new(overrides, config.default_lifespan, config.error_lifespan),
            poll_interval: config.poll_interval,
            stale_retries: config.stale_retries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            waits: AtomicU64::new(0),
        }
    }

    /// Return a fresh cached outcome for `key`, or make the caller the owner
    /// of the fetch.
    ///
    /// While another caller owns the fetch this waits until its outcome is
    /// stored. An in-flight entry that outlives its lifespan is considered
    /// abandoned: it is evicted and the claim starts over. After
    /// `stale_retries` such evictions the caller takes over the key
    /// unconditionally, so nobody blocks forever.
    ///
    /// `deadline` bounds the time spent waiting; [`Claim::TimedOut`] leaves
    /// the entry untouched.
    pub async fn claim<T>(&self, key: &RequestKey, deadline: Option<Instant>) -> Claim<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut stale_evictions = 0;

        loop {
            let now = Instant::now();

            match self.entries.entry(key.as_str().to_owned()) {
                Entry::Vacant(vacant) => {
                    vacant.insert(CacheEntry::processing(self.lifespans.resolve(key.endpoint())));
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    debug!("Cache miss for `{key}`, claiming fetch");
                    return Claim::Owner;
                }
                Entry::Occupied(mut occupied) => {
                    let state = occupied.get().state();
                    let stale = occupied.get().is_stale_at(now);

                    match (state, stale) {
                        (EntryState::Cached, false) => {
                            if let Some(outcome) = occupied.get().outcome::<T>() {
                                self.hits.fetch_add(1, Ordering::Relaxed);
                                trace!("Cache hit for `{key}`");
                                return Claim::Hit(outcome);
                            }
                            warn!("Cached outcome for `{key}` has an unexpected type, evicting");
                            occupied.remove();
                            continue;
                        }
                        (EntryState::Cached, true) => {
                            debug!("Cached outcome for `{key}` is stale, evicting");
                            occupied.remove();
                            continue;
                        }
                        (EntryState::Processing, true) => {
                            stale_evictions += 1;
                            if stale_evictions > self.stale_retries {
                                warn!(
                                    "In-flight fetch for `{key}` is still stale after {} evictions, taking over",
                                    self.stale_retries
                                );
                                occupied.insert(CacheEntry::processing(
                                    self.lifespans.resolve(key.endpoint()),
                                ));
                                self.misses.fetch_add(1, Ordering::Relaxed);
                                return Claim::Owner;
                            }
                            debug!("In-flight fetch for `{key}` is stale, evicting");
                            occupied.remove();
                            continue;
                        }
                        (EntryState::Processing, false) => {
                            // Fall through to waiting once the shard lock
                            // held by `occupied` is released.
                        }
                    }
                }
            }

            if let Some(deadline) = deadline
                && now >= deadline
            {
                debug!("Deadline passed while waiting for `{key}`");
                return Claim::TimedOut;
            }

            self.waits.fetch_add(1, Ordering::Relaxed);
            trace!("Waiting for in-flight fetch of `{key}`");
            let wake_at = now + self.poll_interval;
            let wake_at = deadline.map_or(wake_at, |deadline| wake_at.min(deadline));
            tokio::time::sleep_until(wake_at).await;
        }
    }

    /// Store the outcome of a fetch.
    ///
    /// Completes the in-flight entry in place so waiters observe it, or
    /// inserts a new entry. Outcomes served from the cache are never written
    /// back.
    pub fn store<T>(&self, key: &RequestKey, outcome: &Outcome<T>)
    where
        T: Clone + Send + Sync + 'static,
    {
        if outcome.source == Source::Cache {
            trace!("Not re-caching cached outcome for `{key}`");
            return;
        }

        let error_lifespan = outcome.is_error().then(|| self.lifespans.error()).flatten();
        let payload: Payload = Arc::new(outcome.clone());

        match self.entries.entry(key.as_str().to_owned()) {
            Entry::Occupied(mut occupied) => occupied.get_mut().fill(payload, error_lifespan),
            Entry::Vacant(vacant) => {
                let life_span =
                    error_lifespan.unwrap_or_else(|| self.lifespans.resolve(key.endpoint()));
                vacant.insert(CacheEntry::cached(payload, life_span));
            }
        }
    }

    /// Give up ownership of `key` without storing an outcome.
    ///
    /// Removes the entry only while it is still in flight, so waiters
    /// immediately claim the key themselves.
    pub fn release(&self, key: &RequestKey) {
        if self
            .entries
            .remove_if(key.as_str(), |_, entry| entry.state() == EntryState::Processing)
            .is_some()
        {
            debug!("Released in-flight claim for `{key}`");
        }
    }

    /// Time of the last write to `key`
    #[must_use]
    pub fn updated_at(&self, key: &RequestKey) -> Option<Instant> {
        self.entries.get(key.as_str()).map(|entry| entry.updated_at())
    }

    /// Lifecycle state of `key`
    #[must_use]
    pub fn state(&self, key: &RequestKey) -> Option<EntryState> {
        self.entries.get(key.as_str()).map(|entry| entry.state())
    }

    /// Drop every completed entry that has outlived its lifespan.
    ///
    /// In-flight entries are kept: their owners will complete them.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            entry.state() == EntryState::Processing || !entry.is_stale_at(now)
        });
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            debug!("Purged {purged} expired cache entries");
        }
    }

    /// Number of entries, including in-flight ones
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the cache holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of the cache counters
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            waits: self.waits.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(CacheConfig::default(), LifespanOverrides::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::catalog;
    use crate::{ApiRequest, ErrorKind, Page};

    use std::collections::HashMap;

    fn key() -> RequestKey {
        ApiRequest::new(catalog::QUESTIONS).param("sort", "votes").key()
    }

    fn network(items: Vec<u32>) -> Outcome<Vec<u32>> {
        Outcome::from_page(Page::new(items))
    }

    fn cache_with_lifespan(lifespan: Duration) -> ResponseCache {
        ResponseCache::new(
            CacheConfig::default(),
            HashMap::from([("questions".to_string(), lifespan)]),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_claim_owns() {
        let cache = ResponseCache::default();
        let key = key();

        assert!(matches!(cache.claim::<Vec<u32>>(&key, None).await, Claim::Owner));
        assert_eq!(cache.state(&key), Some(EntryState::Processing));
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_claim_after_store_hits() {
        let cache = ResponseCache::default();
        let key = key();

        assert!(matches!(cache.claim::<Vec<u32>>(&key, None).await, Claim::Owner));
        cache.store(&key, &network(vec![1, 2]));
        assert_eq!(cache.state(&key), Some(EntryState::Cached));

        match cache.claim::<Vec<u32>>(&key, None).await {
            Claim::Hit(outcome) => {
                assert_eq!(outcome.items, Some(vec![1, 2]));
                assert_eq!(outcome.source, Source::Network);
            }
            other => panic!("expected a hit, got {other:?}"),
        }
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiter_receives_owner_outcome() {
        let cache = Arc::new(ResponseCache::default());
        let key = key();
        assert!(matches!(cache.claim::<Vec<u32>>(&key, None).await, Claim::Owner));

        let waiter = tokio::spawn({
            let cache = Arc::clone(&cache);
            let key = key.clone();
            async move { cache.claim::<Vec<u32>>(&key, None).await }
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        cache.store(&key, &network(vec![9]));

        match waiter.await.unwrap() {
            Claim::Hit(outcome) => assert_eq!(outcome.items, Some(vec![9])),
            other => panic!("expected a hit, got {other:?}"),
        }
        assert!(cache.stats().waits >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_entry_is_refetched() {
        let cache = cache_with_lifespan(Duration::from_millis(10));
        let key = key();

        assert!(matches!(cache.claim::<Vec<u32>>(&key, None).await, Claim::Owner));
        cache.store(&key, &network(vec![1]));

        tokio::time::advance(Duration::from_millis(20)).await;
        assert!(matches!(cache.claim::<Vec<u32>>(&key, None).await, Claim::Owner));
        assert_eq!(cache.stats().misses, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_fetch_is_taken_over() {
        let cache = cache_with_lifespan(Duration::from_millis(100));
        let key = key();

        // the owner never stores anything
        assert!(matches!(cache.claim::<Vec<u32>>(&key, None).await, Claim::Owner));

        let start = Instant::now();
        assert!(matches!(cache.claim::<Vec<u32>>(&key, None).await, Claim::Owner));
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiter_times_out() {
        let cache = ResponseCache::default();
        let key = key();
        assert!(matches!(cache.claim::<Vec<u32>>(&key, None).await, Claim::Owner));

        let deadline = Instant::now() + Duration::from_millis(120);
        assert!(matches!(
            cache.claim::<Vec<u32>>(&key, Some(deadline)).await,
            Claim::TimedOut
        ));
        assert!(Instant::now() >= deadline);
        // the owner's entry is untouched
        assert_eq!(cache.state(&key), Some(EntryState::Processing));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_is_not_stored_again() {
        let cache = ResponseCache::default();
        let key = key();
        assert!(matches!(cache.claim::<Vec<u32>>(&key, None).await, Claim::Owner));
        cache.store(&key, &network(vec![1]));
        let written = cache.updated_at(&key).unwrap();

        tokio::time::advance(Duration::from_secs(1)).await;
        let mut hit = network(vec![1]);
        hit.source = Source::Cache;
        cache.store(&key, &hit);

        assert_eq!(cache.updated_at(&key), Some(written));
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_lifespan() {
        let config = CacheConfig {
            error_lifespan: Some(Duration::from_millis(5)),
            ..CacheConfig::default()
        };
        let cache = ResponseCache::new(config, LifespanOverrides::new());
        let key = key();

        assert!(matches!(cache.claim::<Vec<u32>>(&key, None).await, Claim::Owner));
        let failure: Outcome<Vec<u32>> = Outcome::failure(
            Source::LocalError,
            ErrorKind::InvalidRequest {
                key: key.to_string(),
                reason: "nope".to_string(),
            },
        );
        cache.store(&key, &failure);

        assert!(matches!(cache.claim::<Vec<u32>>(&key, None).await, Claim::Hit(_)));
        tokio::time::advance(Duration::from_millis(5)).await;
        assert!(matches!(cache.claim::<Vec<u32>>(&key, None).await, Claim::Owner));
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_only_removes_in_flight_entries() {
        let cache = ResponseCache::default();
        let key = key();

        assert!(matches!(cache.claim::<Vec<u32>>(&key, None).await, Claim::Owner));
        cache.release(&key);
        assert!(cache.is_empty());

        assert!(matches!(cache.claim::<Vec<u32>>(&key, None).await, Claim::Owner));
        cache.store(&key, &network(vec![1]));
        cache.release(&key);
        assert_eq!(cache.state(&key), Some(EntryState::Cached));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = cache_with_lifespan(Duration::from_millis(10));
        let stale = key();
        let in_flight = ApiRequest::new(catalog::QUESTIONS).key();

        cache.store(&stale, &network(vec![1]));
        assert!(matches!(
            cache.claim::<Vec<u32>>(&in_flight, None).await,
            Claim::Owner
        ));
        assert_eq!(cache.len(), 2);

        tokio::time::advance(Duration::from_millis(20)).await;
        cache.purge_expired();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.state(&in_flight), Some(EntryState::Processing));
    }
}
