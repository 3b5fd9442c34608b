//! Keyed cache of loaded server data shared by every view.
//!
//! Inspired by TanStack Query: one entry per [`QueryKey`], one in-flight
//! load per entry, invalidation by key pattern after writes, and
//! subscribers notified whenever an entry changes.
//!
//! Every read and write of an entry goes through this type. Loads record
//! the entry generation they started under; a load whose generation has
//! since moved on (invalidation, a newer load, an explicit write) is
//! dropped instead of written, so results land in request-issued order.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::key::{KeyMatch, Mutation, QueryKey};
use super::state::QuerySnapshot;
use crate::api::ApiError;
use crate::config::CacheConfig;

type Value = Arc<dyn Any + Send + Sync>;
type LoadResult = Result<Value, ApiError>;
type SharedLoad = Shared<BoxFuture<'static, LoadResult>>;
type Callback = Arc<dyn Fn(&QueryKey) + Send + Sync>;

const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Tuning knobs for a [`QueryCache`].
#[derive(Debug, Clone, Copy)]
pub struct CacheOptions {
  /// Age after which a hit is served but revalidated in the background
  pub stale_time: Duration,
  /// Extra attempts for loads failing with a transport error
  pub retries: u32,
  /// Delay before the first retry; doubles per attempt, capped at 30s
  pub retry_base_delay: Duration,
}

impl Default for CacheOptions {
  fn default() -> Self {
    Self {
      stale_time: Duration::from_secs(60),
      retries: 2,
      retry_base_delay: Duration::from_secs(1),
    }
  }
}

impl From<&CacheConfig> for CacheOptions {
  fn from(config: &CacheConfig) -> Self {
    Self {
      stale_time: Duration::from_secs(config.stale_time_secs),
      retries: config.retries,
      retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
    }
  }
}

#[derive(Default)]
struct Entry {
  data: Option<Value>,
  error: Option<ApiError>,
  updated_at: Option<Instant>,
  invalidated: bool,
  generation: u64,
  inflight: Option<SharedLoad>,
}

impl Entry {
  fn is_stale(&self, stale_time: Duration) -> bool {
    self
      .updated_at
      .map(|t| t.elapsed() >= stale_time)
      .unwrap_or(true)
  }
}

#[derive(Default)]
struct Inner {
  entries: HashMap<QueryKey, Entry>,
  subscribers: HashMap<QueryKey, Vec<(u64, Callback)>>,
  next_subscriber: u64,
}

impl Inner {
  fn callbacks(&self, key: &QueryKey) -> Vec<Callback> {
    self
      .subscribers
      .get(key)
      .map(|subs| subs.iter().map(|(_, cb)| Arc::clone(cb)).collect())
      .unwrap_or_default()
  }
}

struct Store {
  inner: Mutex<Inner>,
}

impl Store {
  fn lock(&self) -> MutexGuard<'_, Inner> {
    // A panicking subscriber never runs under the lock, so a poisoned
    // mutex still guards consistent data.
    self
      .inner
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  /// Write a finished load into its entry, unless it was superseded.
  fn complete(&self, key: &QueryKey, generation: u64, result: &LoadResult) {
    let callbacks = {
      let mut inner = self.lock();
      let Some(entry) = inner.entries.get_mut(key) else {
        debug!(key = %key.description(), "entry evicted before load finished");
        return;
      };
      if entry.generation != generation {
        debug!(
          key = %key.description(),
          generation,
          current = entry.generation,
          "discarding superseded load result"
        );
        return;
      }

      entry.inflight = None;
      match result {
        Ok(value) => {
          entry.data = Some(Arc::clone(value));
          entry.error = None;
          entry.updated_at = Some(Instant::now());
          entry.invalidated = false;
        }
        Err(err) => {
          // An invalidated entry stays invalidated so the next fetch loads
          // again; the error tells subscribers this reload already failed.
          warn!(key = %key.description(), error = %err, "load failed");
          entry.error = Some(err.clone());
        }
      }
      inner.callbacks(key)
    };
    notify(key, callbacks);
  }
}

/// Subscribers run after the lock is released so they may read the cache.
fn notify(key: &QueryKey, callbacks: Vec<Callback>) {
  for callback in callbacks {
    callback(key);
  }
}

enum Plan {
  Hit(Value),
  Revalidate(Value),
  Join(SharedLoad),
  Load,
}

/// Shared query cache handle. Clones address the same entries.
#[derive(Clone)]
pub struct QueryCache {
  store: Arc<Store>,
  options: CacheOptions,
}

impl QueryCache {
  pub fn new(options: CacheOptions) -> Self {
    Self {
      store: Arc::new(Store {
        inner: Mutex::new(Inner::default()),
      }),
      options,
    }
  }

  /// Return the data for `key`, loading it with `loader` when needed.
  ///
  /// - fresh entry: returned immediately
  /// - entry older than the stale time: returned immediately, and one
  ///   background revalidation is started
  /// - invalidated or missing entry: waits for a load; the entry keeps
  ///   serving its previous data to snapshots meanwhile
  ///
  /// Concurrent calls for the same key share a single load.
  pub async fn fetch<T, F, Fut>(&self, key: QueryKey, loader: F) -> Result<Arc<T>, ApiError>
  where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    let load = {
      let mut inner = self.store.lock();
      let entry = inner.entries.entry(key.clone()).or_default();
      match self.plan(entry) {
        Plan::Hit(value) => return downcast(&key, value),
        Plan::Revalidate(value) => {
          debug!(key = %key.description(), "serving stale data while revalidating");
          // Callers are answered from the stale value; the load only writes
          let _ = self.start_load(entry, &key, loader);
          return downcast(&key, value);
        }
        Plan::Join(load) => {
          debug!(key = %key.description(), "joining in-flight load");
          load
        }
        Plan::Load => self.start_load(entry, &key, loader),
      }
    };

    let value = load.await?;
    downcast(&key, value)
  }

  fn plan(&self, entry: &Entry) -> Plan {
    match (&entry.data, &entry.inflight) {
      (Some(value), inflight) if !entry.invalidated => {
        if inflight.is_some() || !entry.is_stale(self.options.stale_time) {
          Plan::Hit(Arc::clone(value))
        } else {
          Plan::Revalidate(Arc::clone(value))
        }
      }
      (_, Some(load)) => Plan::Join(load.clone()),
      _ => Plan::Load,
    }
  }

  /// Spawn a load for `key` under a new generation and park it on the
  /// entry so concurrent fetches can join it.
  fn start_load<T, F, Fut>(&self, entry: &mut Entry, key: &QueryKey, loader: F) -> SharedLoad
  where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    entry.generation += 1;
    let generation = entry.generation;
    let store = Arc::downgrade(&self.store);
    let task_key = key.clone();
    let options = self.options;

    debug!(key = %key.description(), generation, "starting load");
    let task = tokio::spawn(async move {
      let result = load_with_retry(&loader, options.retries, options.retry_base_delay)
        .await
        .map(|data| Arc::new(data) as Value);
      if let Some(store) = store.upgrade() {
        store.complete(&task_key, generation, &result);
      }
      result
    });

    let load = async move {
      task
        .await
        .unwrap_or_else(|e| Err(ApiError::Transport(format!("load task failed: {}", e))))
    }
    .boxed()
    .shared();
    entry.inflight = Some(load.clone());
    load
  }

  /// Mark every matching entry stale and notify its subscribers, who are
  /// expected to fetch again. The entry's last error is cleared: an
  /// invalidated entry with an error is one whose reload has since failed.
  /// In-flight loads for those entries are detached: they still answer
  /// their callers, but their result is not written. Returns the number of
  /// entries touched.
  pub fn invalidate(&self, pattern: &KeyMatch) -> usize {
    let touched: Vec<(QueryKey, Vec<Callback>)> = {
      let mut inner = self.store.lock();
      let keys: Vec<QueryKey> = inner
        .entries
        .iter_mut()
        .filter(|(key, _)| pattern.matches(key))
        .map(|(key, entry)| {
          entry.invalidated = true;
          entry.error = None;
          entry.generation += 1;
          entry.inflight = None;
          key.clone()
        })
        .collect();
      keys
        .into_iter()
        .map(|key| {
          let callbacks = inner.callbacks(&key);
          (key, callbacks)
        })
        .collect()
    };

    let count = touched.len();
    debug!(?pattern, count, "invalidated");
    for (key, callbacks) in touched {
      notify(&key, callbacks);
    }
    count
  }

  /// Run a write against the backend. On success the keys the mutation
  /// affects are invalidated; on failure the cache is left untouched and
  /// the error goes back to the caller.
  pub async fn mutate<T, Fut>(&self, mutation: Mutation, write: Fut) -> Result<T, ApiError>
  where
    Fut: Future<Output = Result<T, ApiError>>,
  {
    match write.await {
      Ok(value) => {
        info!(?mutation, "mutation succeeded");
        for pattern in mutation.invalidates() {
          self.invalidate(&pattern);
        }
        Ok(value)
      }
      Err(err) => {
        warn!(?mutation, error = %err, "mutation failed");
        Err(err)
      }
    }
  }

  /// Write `value` as the fresh data for `key` (e.g. the record returned
  /// by an update), superseding any in-flight load.
  pub fn set_data<T: Send + Sync + 'static>(&self, key: QueryKey, value: T) {
    let callbacks = {
      let mut inner = self.store.lock();
      let entry = inner.entries.entry(key.clone()).or_default();
      entry.generation += 1;
      entry.inflight = None;
      entry.data = Some(Arc::new(value));
      entry.error = None;
      entry.invalidated = false;
      entry.updated_at = Some(Instant::now());
      inner.callbacks(&key)
    };
    notify(&key, callbacks);
  }

  pub fn snapshot<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<QuerySnapshot<T>> {
    let inner = self.store.lock();
    let entry = inner.entries.get(key)?;
    Some(QuerySnapshot {
      data: entry
        .data
        .clone()
        .and_then(|value| value.downcast::<T>().ok()),
      error: entry.error.clone(),
      is_invalidated: entry.invalidated,
    })
  }

  /// Call `callback` after every change to the entry for `key`: a load
  /// landing, an invalidation or an explicit write.
  /// Dropping the returned [`Subscription`] unsubscribes.
  pub fn subscribe<F>(&self, key: QueryKey, callback: F) -> Subscription
  where
    F: Fn(&QueryKey) + Send + Sync + 'static,
  {
    let mut inner = self.store.lock();
    let id = inner.next_subscriber;
    inner.next_subscriber += 1;
    inner
      .subscribers
      .entry(key.clone())
      .or_default()
      .push((id, Arc::new(callback)));
    Subscription {
      store: Arc::downgrade(&self.store),
      key,
      id,
    }
  }

  /// Drop every entry, returning how many there were. Loads still in
  /// flight finish without writing.
  pub fn clear(&self) -> usize {
    let mut inner = self.store.lock();
    let count = inner.entries.len();
    inner.entries.clear();
    count
  }
}

/// Handle returned by [`QueryCache::subscribe`]; unsubscribes on drop.
pub struct Subscription {
  store: Weak<Store>,
  key: QueryKey,
  id: u64,
}

impl Subscription {
  pub fn key(&self) -> &QueryKey {
    &self.key
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    let Some(store) = self.store.upgrade() else {
      return;
    };
    let mut inner = store.lock();
    let now_empty = match inner.subscribers.get_mut(&self.key) {
      Some(subs) => {
        subs.retain(|(id, _)| *id != self.id);
        subs.is_empty()
      }
      None => false,
    };
    if now_empty {
      inner.subscribers.remove(&self.key);
    }
  }
}

fn downcast<T: Send + Sync + 'static>(key: &QueryKey, value: Value) -> Result<Arc<T>, ApiError> {
  value.downcast::<T>().map_err(|_| {
    ApiError::shape(format!(
      "cached value for {} has an unexpected type",
      key.description()
    ))
  })
}

/// Delay before retry number `attempt` (0-based): `base * 2^attempt`,
/// capped at 30 seconds.
pub fn retry_delay(base: Duration, attempt: u32) -> Duration {
  base
    .saturating_mul(2u32.saturating_pow(attempt))
    .min(MAX_RETRY_DELAY)
}

async fn load_with_retry<T, F, Fut>(
  loader: &F,
  retries: u32,
  base_delay: Duration,
) -> Result<T, ApiError>
where
  F: Fn() -> Fut,
  Fut: Future<Output = Result<T, ApiError>>,
{
  let mut attempt = 0;
  loop {
    match loader().await {
      Err(err) if err.is_retryable() && attempt < retries => {
        let delay = retry_delay(base_delay, attempt);
        warn!(attempt = attempt + 1, ?delay, error = %err, "load failed, retrying");
        tokio::time::sleep(delay).await;
        attempt += 1;
      }
      result => return result,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::{ListParams, User};
  use std::sync::atomic::{AtomicUsize, Ordering};

  fn cache() -> QueryCache {
    QueryCache::new(CacheOptions {
      stale_time: Duration::from_secs(60),
      retries: 0,
      retry_base_delay: Duration::from_millis(10),
    })
  }

  fn users_key(page: u32) -> QueryKey {
    QueryKey::list::<User>(ListParams::new(page, 10))
  }

  /// Loader returning how many times it has been called, after `delay`.
  fn counting_loader(
    calls: Arc<AtomicUsize>,
    delay: Duration,
  ) -> impl Fn() -> BoxFuture<'static, Result<usize, ApiError>> + Send + Sync + 'static {
    move || {
      let calls = Arc::clone(&calls);
      async move {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(delay).await;
        Ok(n)
      }
      .boxed()
    }
  }

  #[tokio::test]
  async fn test_concurrent_fetches_share_one_load() {
    let cache = cache();
    let calls = Arc::new(AtomicUsize::new(0));

    let (a, b) = tokio::join!(
      cache.fetch(
        users_key(1),
        counting_loader(calls.clone(), Duration::from_millis(20))
      ),
      cache.fetch(
        users_key(1),
        counting_loader(calls.clone(), Duration::from_millis(20))
      ),
    );

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
  }

  #[tokio::test]
  async fn test_fresh_hit_skips_loader() {
    let cache = cache();
    let calls = Arc::new(AtomicUsize::new(0));

    cache
      .fetch(users_key(1), counting_loader(calls.clone(), Duration::ZERO))
      .await
      .unwrap();
    let again = cache
      .fetch(users_key(1), counting_loader(calls.clone(), Duration::ZERO))
      .await
      .unwrap();

    assert_eq!(*again, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_different_keys_load_separately() {
    let cache = cache();
    let calls = Arc::new(AtomicUsize::new(0));

    cache
      .fetch(users_key(1), counting_loader(calls.clone(), Duration::ZERO))
      .await
      .unwrap();
    cache
      .fetch(users_key(2), counting_loader(calls.clone(), Duration::ZERO))
      .await
      .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(cache.snapshot::<usize>(&users_key(2)).is_some());
  }

  #[tokio::test]
  async fn test_invalidated_entry_is_refetched() {
    let cache = cache();
    let calls = Arc::new(AtomicUsize::new(0));

    cache
      .fetch(users_key(1), counting_loader(calls.clone(), Duration::ZERO))
      .await
      .unwrap();
    assert_eq!(cache.invalidate(&KeyMatch::Lists("users")), 1);

    let snapshot = cache.snapshot::<usize>(&users_key(1)).unwrap();
    assert!(snapshot.is_invalidated);
    // Previous data stays visible until the refetch lands
    assert_eq!(snapshot.data.as_deref(), Some(&1));

    let value = cache
      .fetch(users_key(1), counting_loader(calls.clone(), Duration::ZERO))
      .await
      .unwrap();
    assert_eq!(*value, 2);
    assert!(!cache.snapshot::<usize>(&users_key(1)).unwrap().is_invalidated);
  }

  #[tokio::test]
  async fn test_stale_hit_returns_old_data_and_revalidates() {
    let cache = QueryCache::new(CacheOptions {
      stale_time: Duration::ZERO,
      retries: 0,
      retry_base_delay: Duration::from_millis(10),
    });
    let calls = Arc::new(AtomicUsize::new(0));

    cache
      .fetch(users_key(1), counting_loader(calls.clone(), Duration::ZERO))
      .await
      .unwrap();
    let served = cache
      .fetch(
        users_key(1),
        counting_loader(calls.clone(), Duration::from_millis(10)),
      )
      .await
      .unwrap();
    assert_eq!(*served, 1);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let snapshot = cache.snapshot::<usize>(&users_key(1)).unwrap();
    assert_eq!(snapshot.data.as_deref(), Some(&2));
  }

  #[tokio::test]
  async fn test_superseded_load_is_not_written() {
    let cache = cache();
    let calls = Arc::new(AtomicUsize::new(0));
    let loader = {
      let calls = calls.clone();
      move || {
        let calls = Arc::clone(&calls);
        async move {
          // First call is slow and answers "old"; later calls are quick
          let n = calls.fetch_add(1, Ordering::SeqCst);
          if n == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<_, ApiError>("old")
          } else {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok("new")
          }
        }
      }
    };

    let slow = {
      let cache = cache.clone();
      let loader = loader.clone();
      tokio::spawn(async move { cache.fetch(users_key(1), loader).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    cache.invalidate(&KeyMatch::Exact(users_key(1)));

    let fresh = cache.fetch(users_key(1), loader).await.unwrap();
    assert_eq!(*fresh, "new");

    // The slow load still answers its own caller...
    assert_eq!(*slow.await.unwrap().unwrap(), "old");
    // ...but never overwrites the newer entry
    let snapshot = cache.snapshot::<&str>(&users_key(1)).unwrap();
    assert_eq!(snapshot.data.as_deref(), Some(&"new"));
  }

  #[tokio::test]
  async fn test_mutate_success_invalidates_lists_and_detail() {
    let cache = cache();
    cache.set_data(users_key(1), 1usize);
    cache.set_data(users_key(2), 2usize);
    cache.set_data(QueryKey::detail::<User>("7"), 7usize);
    cache.set_data(QueryKey::detail::<User>("8"), 8usize);

    cache
      .mutate(Mutation::delete::<User>("7"), async { Ok::<_, ApiError>(()) })
      .await
      .unwrap();

    assert!(cache.snapshot::<usize>(&users_key(1)).unwrap().is_invalidated);
    assert!(cache.snapshot::<usize>(&users_key(2)).unwrap().is_invalidated);
    assert!(
      cache
        .snapshot::<usize>(&QueryKey::detail::<User>("7"))
        .unwrap()
        .is_invalidated
    );
    assert!(
      !cache
        .snapshot::<usize>(&QueryKey::detail::<User>("8"))
        .unwrap()
        .is_invalidated
    );
  }

  #[tokio::test]
  async fn test_mutate_failure_leaves_cache_untouched() {
    let cache = cache();
    cache.set_data(users_key(1), 1usize);

    let err = cache
      .mutate(Mutation::delete::<User>("7"), async {
        Err::<(), _>(ApiError::rejected(Some(403), "Forbidden"))
      })
      .await
      .unwrap_err();

    assert_eq!(err, ApiError::rejected(Some(403), "Forbidden"));
    assert!(!cache.snapshot::<usize>(&users_key(1)).unwrap().is_invalidated);
  }

  #[tokio::test]
  async fn test_failed_load_is_stored_and_retried_on_next_fetch() {
    let cache = cache();
    let calls = Arc::new(AtomicUsize::new(0));
    let loader = {
      let calls = calls.clone();
      move || {
        let calls = Arc::clone(&calls);
        async move {
          if calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(ApiError::rejected(Some(500), "Failed to fetch users"))
          } else {
            Ok(42usize)
          }
        }
      }
    };

    let err = cache
      .fetch(users_key(1), loader.clone())
      .await
      .unwrap_err();
    assert_eq!(err.to_string(), "Failed to fetch users");
    let snapshot = cache.snapshot::<usize>(&users_key(1)).unwrap();
    assert!(snapshot.error.is_some());
    assert!(snapshot.data.is_none());

    assert_eq!(*cache.fetch(users_key(1), loader).await.unwrap(), 42);
    assert!(cache
      .snapshot::<usize>(&users_key(1))
      .unwrap()
      .error
      .is_none());
  }

  #[tokio::test]
  async fn test_failed_reload_keeps_entry_invalidated() {
    let cache = cache();
    cache.set_data(users_key(1), 1usize);
    cache.invalidate(&KeyMatch::Lists("users"));
    assert!(cache.snapshot::<usize>(&users_key(1)).unwrap().needs_reload());

    let err = cache
      .fetch(users_key(1), || async {
        Err::<usize, _>(ApiError::rejected(Some(500), "Failed to fetch users"))
      })
      .await
      .unwrap_err();
    assert_eq!(err.to_string(), "Failed to fetch users");

    let snapshot = cache.snapshot::<usize>(&users_key(1)).unwrap();
    assert!(snapshot.is_invalidated);
    assert!(!snapshot.needs_reload());
    assert_eq!(snapshot.data.as_deref(), Some(&1));

    // Still invalidated, so the next fetch loads instead of serving old data
    let value = cache
      .fetch(users_key(1), || async { Ok::<_, ApiError>(2usize) })
      .await
      .unwrap();
    assert_eq!(*value, 2);

    // A new invalidation asks for a reload again
    cache.invalidate(&KeyMatch::Lists("users"));
    assert!(cache.snapshot::<usize>(&users_key(1)).unwrap().needs_reload());
  }

  #[tokio::test(start_paused = true)]
  async fn test_transport_failures_are_retried_with_backoff() {
    let cache = QueryCache::new(CacheOptions {
      stale_time: Duration::from_secs(60),
      retries: 2,
      retry_base_delay: Duration::from_millis(1000),
    });
    let calls = Arc::new(AtomicUsize::new(0));
    let loader = {
      let calls = calls.clone();
      move || {
        let calls = Arc::clone(&calls);
        async move {
          if calls.fetch_add(1, Ordering::SeqCst) < 2 {
            Err(ApiError::Transport("connection refused".into()))
          } else {
            Ok("ok")
          }
        }
      }
    };

    let start = Instant::now();
    let value = cache.fetch(users_key(1), loader).await.unwrap();
    assert_eq!(*value, "ok");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // 1s + 2s of backoff
    assert_eq!(start.elapsed(), Duration::from_millis(3000));
  }

  #[tokio::test]
  async fn test_rejections_are_not_retried() {
    let cache = QueryCache::new(CacheOptions {
      retries: 2,
      ..CacheOptions::default()
    });
    let calls = Arc::new(AtomicUsize::new(0));
    let loader = {
      let calls = calls.clone();
      move || {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Err::<usize, _>(ApiError::rejected(Some(400), "Bad page")) }
      }
    };

    assert!(cache.fetch(users_key(1), loader).await.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn test_retry_delay_doubles_and_caps() {
    let base = Duration::from_millis(1000);
    assert_eq!(retry_delay(base, 0), Duration::from_millis(1000));
    assert_eq!(retry_delay(base, 1), Duration::from_millis(2000));
    assert_eq!(retry_delay(base, 4), Duration::from_millis(16000));
    assert_eq!(retry_delay(base, 5), Duration::from_secs(30));
    assert_eq!(retry_delay(base, 40), Duration::from_secs(30));
  }

  #[tokio::test]
  async fn test_subscribers_only_hear_their_key() {
    let cache = cache();
    let page_one = Arc::new(AtomicUsize::new(0));
    let page_two = Arc::new(AtomicUsize::new(0));

    let _one = {
      let page_one = page_one.clone();
      cache.subscribe(users_key(1), move |_| {
        page_one.fetch_add(1, Ordering::SeqCst);
      })
    };
    let _two = {
      let page_two = page_two.clone();
      cache.subscribe(users_key(2), move |_| {
        page_two.fetch_add(1, Ordering::SeqCst);
      })
    };

    cache.set_data(users_key(1), 1usize);
    // Synchronous: already notified when set_data returns
    assert_eq!(page_one.load(Ordering::SeqCst), 1);
    assert_eq!(page_two.load(Ordering::SeqCst), 0);

    cache.invalidate(&KeyMatch::Exact(users_key(1)));
    assert_eq!(page_one.load(Ordering::SeqCst), 2);
    assert_eq!(page_two.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_dropped_subscription_is_not_notified() {
    let cache = cache();
    let hits = Arc::new(AtomicUsize::new(0));

    let subscription = {
      let hits = hits.clone();
      cache.subscribe(users_key(1), move |_| {
        hits.fetch_add(1, Ordering::SeqCst);
      })
    };
    drop(subscription);

    cache.set_data(users_key(1), 1usize);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_subscriber_can_read_cache_during_notification() {
    let cache = cache();
    let seen = Arc::new(Mutex::new(None));

    let _sub = {
      let reader = cache.clone();
      let seen = seen.clone();
      cache.subscribe(users_key(1), move |key| {
        let value = reader.snapshot::<usize>(key).and_then(|s| s.data);
        *seen.lock().unwrap() = value.map(|v| *v);
      })
    };

    cache
      .fetch(users_key(1), || async { Ok::<_, ApiError>(5usize) })
      .await
      .unwrap();
    assert_eq!(*seen.lock().unwrap(), Some(5));
  }

  #[tokio::test]
  async fn test_type_mismatch_is_reported() {
    let cache = cache();
    cache.set_data(users_key(1), 1usize);
    let err = cache
      .fetch(users_key(1), || async { Ok::<_, ApiError>("text") })
      .await
      .unwrap_err();
    assert!(matches!(err, ApiError::UnexpectedShape(_)));
  }

  #[tokio::test]
  async fn test_clear_drops_entries_and_orphans_loads() {
    let cache = cache();
    cache.set_data(users_key(1), 1usize);
    cache.set_data(QueryKey::detail::<User>("1"), 1usize);

    let slow = {
      let cache = cache.clone();
      tokio::spawn(async move {
        cache
          .fetch(users_key(2), || async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, ApiError>(2usize)
          })
          .await
      })
    };
    tokio::time::sleep(Duration::from_millis(5)).await;

    assert_eq!(cache.clear(), 3);
    assert!(cache.snapshot::<usize>(&users_key(1)).is_none());

    // The load still answers its caller but writes nothing back
    assert_eq!(*slow.await.unwrap().unwrap(), 2);
    assert!(cache.snapshot::<usize>(&users_key(2)).is_none());
    assert_eq!(cache.clear(), 0);
  }
}
