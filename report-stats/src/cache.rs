// Copyright (c) The report-ng Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A memoizing key-value cache with a time-to-live and single-flight loads.
//!
//! [`MemoCache::get_or_load`] returns a live cached value if there is one. Otherwise it either
//! joins a load that is already in flight for the same key, or starts a new one. Every caller
//! waiting on a load observes the result of that one load, success or failure.
//!
//! Successful results are stored until the configured TTL elapses. Failures are never stored:
//! the next call after a failed or panicked load starts over. Expiry is checked lazily on access; there is no
//! background sweep.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::{
    collections::HashMap,
    fmt,
    future::Future,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Cache configuration, fixed when a cache is created.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CacheConfig {
    ttl: Duration,
}

impl CacheConfig {
    /// The TTL used if none is configured.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(120);

    /// Creates a new cache configuration with the given TTL.
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// Returns the time-to-live for entries.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}

type SharedLoad<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

enum Slot<V, E> {
    Ready { value: V, expires_at: Instant },
    Loading { generation: u64, load: SharedLoad<V, E> },
}

struct CacheState<V, E> {
    slots: HashMap<String, Slot<V, E>>,
    // Distinguishes a load from any later load for the same key, so that a stale load finishing
    // after an eviction doesn't clobber the slot.
    next_generation: u64,
}

/// A memoizing cache mapping string keys to values of type `V`.
///
/// Loads that fail with an `E` are shared among concurrent callers but not cached.
pub struct MemoCache<V, E> {
    config: CacheConfig,
    state: Mutex<CacheState<V, E>>,
}

impl<V, E> MemoCache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Creates a new, empty cache.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            state: Mutex::new(CacheState {
                slots: HashMap::new(),
                next_generation: 0,
            }),
        }
    }

    /// Returns the configuration for this cache.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns the value for `key`, calling `loader` to produce it if necessary.
    ///
    /// `loader` is called at most once per call, and never while another load for `key` is in
    /// flight. It is called with the cache's internal lock held, so it must only construct the
    /// future and not do any work of its own.
    pub async fn get_or_load<F, Fut>(&self, key: &str, loader: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let (generation, load) = {
            let mut state = self.lock();
            let now = Instant::now();
            let in_flight = match state.slots.get(key) {
                Some(Slot::Ready { value, expires_at }) if now < *expires_at => {
                    debug!("cache hit for `{key}`");
                    return Ok(value.clone());
                }
                Some(Slot::Loading { generation, load }) => Some((*generation, load.clone())),
                Some(Slot::Ready { .. }) => {
                    debug!("cache entry for `{key}` expired");
                    None
                }
                None => None,
            };

            match in_flight {
                Some(in_flight) => {
                    debug!("joining in-flight load for `{key}`");
                    in_flight
                }
                None => {
                    debug!("cache miss for `{key}`, loading");
                    let generation = state.next_generation;
                    state.next_generation += 1;
                    let load = loader().boxed().shared();
                    state.slots.insert(
                        key.to_owned(),
                        Slot::Loading {
                            generation,
                            load: load.clone(),
                        },
                    );
                    (generation, load)
                }
            }
        };

        let guard = UnwindGuard {
            cache: self,
            key,
            generation,
        };
        let result = load.await;
        drop(guard);
        self.settle(key, generation, &result);
        result
    }

    /// Removes the entry for `key`, whether it is ready or still loading.
    ///
    /// Callers already waiting on an in-flight load still receive its result, but that result is
    /// not stored. Returns true if there was an entry.
    pub fn evict(&self, key: &str) -> bool {
        let removed = self.lock().slots.remove(key).is_some();
        if removed {
            debug!("evicted `{key}`");
        }
        removed
    }

    /// Removes all entries.
    pub fn clear(&self) {
        self.lock().slots.clear();
    }

    /// Returns the number of entries that are either live or loading.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock()
            .slots
            .values()
            .filter(|slot| match slot {
                Slot::Ready { expires_at, .. } => now < *expires_at,
                Slot::Loading { .. } => true,
            })
            .count()
    }

    /// Returns true if there are no live or loading entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Called by every waiter once the load completes. Only the first one to get here for the
    // current generation replaces the loading slot.
    fn settle(&self, key: &str, generation: u64, result: &Result<V, E>) {
        let mut state = self.lock();
        let is_current = matches!(
            state.slots.get(key),
            Some(Slot::Loading { generation: current, .. }) if *current == generation
        );
        if !is_current {
            return;
        }

        match result {
            Ok(value) => {
                let expires_at = Instant::now() + self.config.ttl;
                state.slots.insert(
                    key.to_owned(),
                    Slot::Ready {
                        value: value.clone(),
                        expires_at,
                    },
                );
            }
            Err(_) => {
                warn!("load for `{key}` failed, result will not be cached");
                state.slots.remove(key);
            }
        }
    }
}

impl<V, E> MemoCache<V, E> {
    fn lock(&self) -> MutexGuard<'_, CacheState<V, E>> {
        // The state is only ever mutated in single statements, so it is consistent even if a
        // loader panicked while the lock was held.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// A panicking load is re-raised by `Shared` to every waiter, and `settle` is never reached. This
// removes the loading slot while unwinding so that the next call starts a fresh load.
struct UnwindGuard<'a, V, E> {
    cache: &'a MemoCache<V, E>,
    key: &'a str,
    generation: u64,
}

impl<V, E> Drop for UnwindGuard<'_, V, E> {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            return;
        }
        let mut state = self.cache.lock();
        if matches!(
            state.slots.get(self.key),
            Some(Slot::Loading { generation, .. }) if *generation == self.generation
        ) {
            warn!("load for `{}` panicked, discarding it", self.key);
            state.slots.remove(self.key);
        }
    }
}

impl<V, E> fmt::Debug for MemoCache<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        panic::AssertUnwindSafe,
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
    };

    const TTL: Duration = Duration::from_secs(120);

    fn counting_loader(
        calls: &Arc<AtomicUsize>,
        result: Result<u32, &'static str>,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<u32, &'static str>> {
        let calls = Arc::clone(calls);
        move || {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                result
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn second_call_is_served_from_cache() {
        let cache = MemoCache::new(CacheConfig::new(TTL));
        let calls = Arc::new(AtomicUsize::new(0));

        assert_eq!(cache.get_or_load("k", counting_loader(&calls, Ok(1))).await, Ok(1));
        assert_eq!(cache.get_or_load("k", counting_loader(&calls, Ok(2))).await, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_load() {
        let cache = MemoCache::new(CacheConfig::new(TTL));
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b, c) = tokio::join!(
            cache.get_or_load("k", counting_loader(&calls, Ok(1))),
            cache.get_or_load("k", counting_loader(&calls, Ok(2))),
            cache.get_or_load("k", counting_loader(&calls, Ok(3))),
        );
        // Whichever caller got in first supplied the loader; everyone sees its result.
        assert!(a.is_ok());
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn different_keys_load_independently() {
        let cache = MemoCache::new(CacheConfig::new(TTL));
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            cache.get_or_load("a", counting_loader(&calls, Ok(1))),
            cache.get_or_load("b", counting_loader(&calls, Ok(2))),
        );
        assert_eq!((a, b), (Ok(1), Ok(2)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_shared_but_not_cached() {
        let cache = MemoCache::new(CacheConfig::new(TTL));
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            cache.get_or_load("k", counting_loader(&calls, Err("boom"))),
            cache.get_or_load("k", counting_loader(&calls, Err("boom"))),
        );
        assert_eq!((a, b), (Err("boom"), Err("boom")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty(), "failed loads leave no entry behind");

        // The next call retries.
        assert_eq!(cache.get_or_load("k", counting_loader(&calls, Ok(3))).await, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_load_is_retried() {
        let cache = MemoCache::<u32, &'static str>::new(CacheConfig::new(TTL));
        let calls = Arc::new(AtomicUsize::new(0));

        let panicked = AssertUnwindSafe(cache.get_or_load("k", || async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let value: Option<u32> = None;
            Ok(value.expect("value is missing"))
        }))
        .catch_unwind()
        .await;
        assert!(panicked.is_err());
        assert!(cache.is_empty(), "panicked loads leave no entry behind");

        assert_eq!(cache.get_or_load("k", counting_loader(&calls, Ok(7))).await, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = MemoCache::new(CacheConfig::new(TTL));
        let calls = Arc::new(AtomicUsize::new(0));

        assert_eq!(cache.get_or_load("k", counting_loader(&calls, Ok(1))).await, Ok(1));

        tokio::time::advance(TTL - Duration::from_secs(1)).await;
        assert_eq!(cache.get_or_load("k", counting_loader(&calls, Ok(2))).await, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.len(), 0, "expired entries are not counted");
        assert_eq!(cache.get_or_load("k", counting_loader(&calls, Ok(2))).await, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // The reloaded value is cached in turn.
        assert_eq!(cache.get_or_load("k", counting_loader(&calls, Ok(3))).await, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn evict_forces_reload() {
        let cache = MemoCache::new(CacheConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));

        assert_eq!(cache.get_or_load("k", counting_loader(&calls, Ok(1))).await, Ok(1));
        assert!(cache.evict("k"));
        assert!(!cache.evict("k"));
        assert_eq!(cache.get_or_load("k", counting_loader(&calls, Ok(2))).await, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn eviction_during_load_discards_result() {
        let cache = MemoCache::new(CacheConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let load = cache.get_or_load("k", counting_loader(&calls, Ok(1)));
        tokio::pin!(load);
        assert!(futures::poll!(&mut load).is_pending());

        assert!(cache.evict("k"));
        assert_eq!(load.await, Ok(1));
        assert!(cache.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
