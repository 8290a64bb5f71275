//! Expiring in-memory store with single-flight loading.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::entry::CacheEntry;
use super::traits::CacheResult;

type Load<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

/// A load that callers for the same key can join.
struct InFlight<V, E> {
  id: u64,
  load: Load<V, E>,
}

struct Slots<K, V, E> {
  entries: HashMap<K, CacheEntry<V>>,
  in_flight: HashMap<K, InFlight<V, E>>,
  next_load_id: u64,
}

impl<K: Eq + Hash, V: Clone, E> Slots<K, V, E> {
  /// Return the live value for `key`, evicting it if it has expired.
  fn live(&mut self, key: &K, now: Instant) -> Option<V> {
    let expired = match self.entries.get(key) {
      Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
      Some(_) => true,
      None => false,
    };

    if expired {
      self.entries.remove(key);
    }
    None
  }
}

/// Generic key-value cache with lazy per-entry expiry.
///
/// Concurrent `get_or_load` calls for the same missing key share one loader
/// invocation and all observe its outcome. The internal lock only covers map
/// bookkeeping; loaders always run outside it, so a slow load for one key never
/// blocks readers of another.
///
/// Failed loads are never stored. Cloning the cache yields another handle to the
/// same storage.
pub struct TtlCache<K, V, E> {
  slots: Arc<Mutex<Slots<K, V, E>>>,
}

impl<K, V, E> TtlCache<K, V, E>
where
  K: Eq + Hash + Clone + Debug + Send + 'static,
  V: Clone + Send + Sync + 'static,
  E: Clone + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self {
      slots: Arc::new(Mutex::new(Slots {
        entries: HashMap::new(),
        in_flight: HashMap::new(),
        next_load_id: 0,
      })),
    }
  }

  fn lock(&self) -> MutexGuard<'_, Slots<K, V, E>> {
    lock(&self.slots)
  }

  /// Get a live value. An expired entry is evicted by the lookup that finds it.
  pub fn get(&self, key: &K) -> Option<V> {
    self.lock().live(key, Instant::now())
  }

  /// Store a value, replacing any previous entry for the key.
  pub fn insert(&self, key: K, value: V, ttl: Duration) {
    self.lock().entries.insert(key, CacheEntry::new(value, ttl));
  }

  /// Return the live value for `key`, or load it.
  ///
  /// 1. Live entry - return it without calling `loader`
  /// 2. Another caller is loading the key - wait for that load and share its outcome
  /// 3. Otherwise run `loader`, store a successful result with `ttl`, and hand the
  ///    outcome to every caller that joined in the meantime
  ///
  /// Errors are returned to all waiters and leave the cache as it was.
  pub async fn get_or_load<F, Fut>(
    &self,
    key: K,
    ttl: Duration,
    loader: F,
  ) -> Result<CacheResult<V>, E>
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
  {
    let (load, leader) = {
      let mut slots = self.lock();

      if let Some(value) = slots.live(&key, Instant::now()) {
        debug!(?key, "cache hit");
        return Ok(CacheResult::from_cache(value));
      }

      if let Some(load) = slots.in_flight.get(&key).map(|f| f.load.clone()) {
        debug!(?key, "joining in-flight load");
        (load, false)
      } else {
        debug!(?key, "cache miss");
        let id = slots.next_load_id;
        slots.next_load_id += 1;

        let load = self.start_load(id, key.clone(), ttl, loader);
        slots.in_flight.insert(
          key,
          InFlight {
            id,
            load: load.clone(),
          },
        );
        (load, true)
      }
    };

    let value = load.await?;
    if leader {
      Ok(CacheResult::from_network(value))
    } else {
      Ok(CacheResult::joined(value))
    }
  }

  /// Build the shared load future. It settles the bookkeeping itself, so the
  /// outcome is recorded exactly once no matter which waiter drives it.
  fn start_load<F, Fut>(&self, id: u64, key: K, ttl: Duration, loader: F) -> Load<V, E>
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
  {
    let slots = Arc::clone(&self.slots);

    async move {
      let outcome = loader().await;

      let mut slots = lock(&slots);
      // Invalidated while loading: hand the value to the waiters but don't store it.
      let current = slots.in_flight.get(&key).map(|f| f.id) == Some(id);
      if current {
        slots.in_flight.remove(&key);
      }

      match &outcome {
        Ok(value) if current => {
          slots
            .entries
            .insert(key, CacheEntry::new(value.clone(), ttl));
        }
        Ok(_) => debug!(?key, "load finished after invalidation, not stored"),
        Err(_) => warn!(?key, "load failed, nothing cached"),
      }

      outcome
    }
    .boxed()
    .shared()
  }

  /// Remove an entry regardless of expiry. A load in progress for the key still
  /// completes for its waiters but its result is not stored.
  pub fn invalidate(&self, key: &K) {
    let mut slots = self.lock();
    slots.entries.remove(key);
    slots.in_flight.remove(key);
  }

  /// Remove every entry whose key matches `predicate`.
  pub fn invalidate_where(&self, predicate: impl Fn(&K) -> bool) {
    let mut slots = self.lock();
    slots.entries.retain(|key, _| !predicate(key));
    slots.in_flight.retain(|key, _| !predicate(key));
  }

  /// Drop all entries.
  pub fn clear(&self) {
    let mut slots = self.lock();
    slots.entries.clear();
    slots.in_flight.clear();
  }

  /// Number of stored entries, including expired ones not yet evicted.
  pub fn len(&self) -> usize {
    self.lock().entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl<K, V, E> Default for TtlCache<K, V, E>
where
  K: Eq + Hash + Clone + Debug + Send + 'static,
  V: Clone + Send + Sync + 'static,
  E: Clone + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<K, V, E> Clone for TtlCache<K, V, E> {
  fn clone(&self) -> Self {
    Self {
      slots: Arc::clone(&self.slots),
    }
  }
}

// The maps hold no cross-entry invariants, so a panic elsewhere leaves them usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CacheSource;
  use std::sync::atomic::{AtomicU32, Ordering};

  type TestCache = TtlCache<String, u32, String>;

  fn counting_loader(
    calls: &Arc<AtomicU32>,
    result: Result<u32, String>,
    delay: Duration,
  ) -> impl FnOnce() -> BoxFuture<'static, Result<u32, String>> + Send + 'static {
    let calls = Arc::clone(calls);
    move || {
      async move {
        calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(delay).await;
        result
      }
      .boxed()
    }
  }

  #[tokio::test(start_paused = true)]
  async fn test_insert_then_get_until_ttl() {
    let cache = TestCache::new();
    cache.insert("k".to_string(), 7, Duration::from_secs(5));

    assert_eq!(cache.get(&"k".to_string()), Some(7));

    tokio::time::advance(Duration::from_secs(4)).await;
    assert_eq!(cache.get(&"k".to_string()), Some(7));

    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(cache.get(&"k".to_string()), None);
  }

  #[tokio::test(start_paused = true)]
  async fn test_get_evicts_expired_entry() {
    let cache = TestCache::new();
    cache.insert("k".to_string(), 1, Duration::from_secs(1));
    assert_eq!(cache.len(), 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    // Still stored until an access notices it
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get(&"k".to_string()), None);
    assert!(cache.is_empty());
  }

  #[tokio::test]
  async fn test_live_entry_skips_loader() {
    let cache = TestCache::new();
    let calls = Arc::new(AtomicU32::new(0));
    cache.insert("k".to_string(), 3, Duration::from_secs(60));

    let result = cache
      .get_or_load(
        "k".to_string(),
        Duration::from_secs(60),
        counting_loader(&calls, Ok(99), Duration::ZERO),
      )
      .await
      .unwrap();

    assert_eq!(result.data, 3);
    assert_eq!(result.source, CacheSource::Cache);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_concurrent_misses_share_one_load() {
    let cache = TestCache::new();
    let calls = Arc::new(AtomicU32::new(0));

    let handles: Vec<_> = (0..10)
      .map(|_| {
        let cache = cache.clone();
        let loader = counting_loader(&calls, Ok(42), Duration::from_millis(50));
        tokio::spawn(async move {
          cache
            .get_or_load("k".to_string(), Duration::from_secs(60), loader)
            .await
        })
      })
      .collect();

    let mut network = 0;
    for handle in handles {
      let result = handle.await.unwrap().unwrap();
      assert_eq!(result.data, 42);
      if result.source == CacheSource::Network {
        network += 1;
      }
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(network, 1);
    assert_eq!(cache.get(&"k".to_string()), Some(42));
  }

  #[tokio::test]
  async fn test_failed_load_reaches_every_waiter_and_is_not_cached() {
    let cache = TestCache::new();
    let calls = Arc::new(AtomicU32::new(0));

    let handles: Vec<_> = (0..5)
      .map(|_| {
        let cache = cache.clone();
        let loader = counting_loader(
          &calls,
          Err("service unavailable".to_string()),
          Duration::from_millis(50),
        );
        tokio::spawn(async move {
          cache
            .get_or_load("k".to_string(), Duration::from_secs(60), loader)
            .await
        })
      })
      .collect();

    for handle in handles {
      let err = handle.await.unwrap().unwrap_err();
      assert_eq!(err, "service unavailable");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(cache.is_empty());

    // The next call retries rather than reusing the failure
    let result = cache
      .get_or_load(
        "k".to_string(),
        Duration::from_secs(60),
        counting_loader(&calls, Ok(5), Duration::ZERO),
      )
      .await
      .unwrap();
    assert_eq!(result.data, 5);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_failed_reload_of_expired_key_leaves_it_empty() {
    let cache = TestCache::new();
    let calls = Arc::new(AtomicU32::new(0));
    cache.insert("k".to_string(), 1, Duration::from_secs(1));
    tokio::time::advance(Duration::from_secs(2)).await;

    let err = cache
      .get_or_load(
        "k".to_string(),
        Duration::from_secs(60),
        counting_loader(&calls, Err("boom".to_string()), Duration::ZERO),
      )
      .await
      .unwrap_err();

    // The expired value is gone and the failure was not stored in its place
    assert_eq!(err, "boom");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.get(&"k".to_string()), None);
    assert!(cache.is_empty());

    let result = cache
      .get_or_load(
        "k".to_string(),
        Duration::from_secs(60),
        counting_loader(&calls, Ok(2), Duration::ZERO),
      )
      .await
      .unwrap();
    assert_eq!(result.data, 2);
    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_failed_load_leaves_other_keys_untouched() {
    let cache = TestCache::new();
    let calls = Arc::new(AtomicU32::new(0));
    cache.insert("a".to_string(), 1, Duration::from_secs(60));

    let err = cache
      .get_or_load(
        "b".to_string(),
        Duration::from_secs(60),
        counting_loader(&calls, Err("boom".to_string()), Duration::ZERO),
      )
      .await
      .unwrap_err();

    assert_eq!(err, "boom");
    assert_eq!(cache.get(&"a".to_string()), Some(1));
    assert_eq!(cache.get(&"b".to_string()), None);
  }

  #[tokio::test]
  async fn test_slow_load_does_not_block_other_keys() {
    let cache = TestCache::new();
    let (release, gate) = tokio::sync::oneshot::channel::<()>();

    let slow = {
      let cache = cache.clone();
      tokio::spawn(async move {
        cache
          .get_or_load("slow".to_string(), Duration::from_secs(60), move || async move {
            let _ = gate.await;
            Ok(1)
          })
          .await
      })
    };
    while cache.lock().in_flight.is_empty() {
      tokio::task::yield_now().await;
    }

    let fast = tokio::time::timeout(
      Duration::from_secs(1),
      cache.get_or_load("fast".to_string(), Duration::from_secs(60), || async {
        Ok(2)
      }),
    )
    .await
    .expect("fast key blocked by slow load")
    .unwrap();
    assert_eq!(fast.data, 2);

    release.send(()).unwrap();
    assert_eq!(slow.await.unwrap().unwrap().data, 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_expiry_triggers_exactly_one_refetch() {
    let cache = TestCache::new();
    let calls = Arc::new(AtomicU32::new(0));
    let ttl = Duration::from_secs(1);

    for _ in 0..3 {
      cache
        .get_or_load("k".to_string(), ttl, counting_loader(&calls, Ok(1), Duration::ZERO))
        .await
        .unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_secs(2)).await;

    for _ in 0..3 {
      cache
        .get_or_load("k".to_string(), ttl, counting_loader(&calls, Ok(1), Duration::ZERO))
        .await
        .unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_invalidate_during_load_discards_result() {
    let cache = TestCache::new();
    let (release, gate) = tokio::sync::oneshot::channel::<()>();

    let pending = {
      let cache = cache.clone();
      tokio::spawn(async move {
        cache
          .get_or_load("k".to_string(), Duration::from_secs(60), move || async move {
            let _ = gate.await;
            Ok(10)
          })
          .await
      })
    };
    while cache.lock().in_flight.is_empty() {
      tokio::task::yield_now().await;
    }

    cache.invalidate(&"k".to_string());
    release.send(()).unwrap();

    // The waiter still gets the value, but it was not stored
    assert_eq!(pending.await.unwrap().unwrap().data, 10);
    assert_eq!(cache.get(&"k".to_string()), None);
  }

  #[tokio::test]
  async fn test_invalidate_where_and_clear() {
    let cache = TestCache::new();
    let ttl = Duration::from_secs(60);
    cache.insert("schema:Bug".to_string(), 1, ttl);
    cache.insert("states:Bug".to_string(), 2, ttl);
    cache.insert("states:Task".to_string(), 3, ttl);

    cache.invalidate_where(|key| key.ends_with(":Bug"));
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get(&"states:Task".to_string()), Some(3));

    cache.clear();
    assert!(cache.is_empty());
  }
}
