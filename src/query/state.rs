//! Per-view query state on top of the shared cache.
//!
//! Inspired by TanStack Query, a `Query<T>` binds one cache key to the
//! loader that fills it and tracks what the owning view should render.
//!
//! A view calls [`Query::fetch`] once, then [`Query::poll`] on every tick
//! and renders from [`Query::state`]: `Loading` until the first answer,
//! then `Success` or `Error`. Invalidations made by other views reload the
//! query on the next poll.

use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::cache::{QueryCache, Subscription};
use super::key::{KeyMatch, QueryKey};
use crate::api::ApiError;

/// Point-in-time view of one cache entry.
#[derive(Debug, Clone)]
pub struct QuerySnapshot<T> {
  /// Last successfully loaded value, kept while a refetch is in flight
  pub data: Option<Arc<T>>,
  /// Error from the most recent load, if it failed
  pub error: Option<ApiError>,
  pub is_invalidated: bool,
}

impl<T> QuerySnapshot<T> {
  /// Invalidated and not yet reloaded. False once the reload has failed,
  /// so a failing backend is not asked again on every notification.
  pub fn needs_reload(&self) -> bool {
    self.is_invalidated && self.error.is_none()
  }
}

/// The state of a query
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Query has not been started
  Idle,
  /// Query is currently fetching data
  Loading,
  /// Query completed successfully
  Success(Arc<T>),
  /// Query failed with an error
  Error(ApiError),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&ApiError> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

type FetcherFn<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, ApiError>> + Send + Sync>;

/// One view's handle on a cache key.
///
/// Query<T> encapsulates:
/// - The fetching logic (via a closure), run through the shared cache
/// - Loading/success/error states
/// - Async result handling via channels
/// - A cache subscription, so writes made elsewhere show up here
pub struct Query<T> {
  state: QueryState<T>,
  cache: QueryCache,
  key: QueryKey,
  fetcher: FetcherFn<T>,
  receiver: Option<mpsc::UnboundedReceiver<Result<Arc<T>, ApiError>>>,
  changed: Arc<AtomicBool>,
  _subscription: Subscription,
}

impl<T: Send + Sync + 'static> Query<T> {
  /// Create a query for `key`. The fetcher is called whenever the cache
  /// needs to (re)load the entry.
  pub fn new<F, Fut>(cache: QueryCache, key: QueryKey, fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    let changed = Arc::new(AtomicBool::new(false));
    let subscription = {
      let changed = Arc::clone(&changed);
      cache.subscribe(key.clone(), move |_| changed.store(true, Ordering::SeqCst))
    };

    Self {
      state: QueryState::Idle,
      cache,
      key,
      fetcher: Arc::new(move || fetcher().boxed()),
      receiver: None,
      changed,
      _subscription: subscription,
    }
  }

  /// Get the current state of the query.
  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  /// Get the data if the query succeeded.
  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn error(&self) -> Option<&ApiError> {
    self.state.error()
  }

  /// Start fetching data if not already loading.
  ///
  /// This is a no-op if the query is already loading.
  pub fn fetch(&mut self) {
    if self.state.is_loading() {
      return;
    }
    self.start_fetch();
  }

  /// Force a reload: the entry is invalidated for every view sharing it,
  /// and any result still pending for this handle is ignored.
  pub fn refetch(&mut self) {
    self.receiver = None;
    self.cache.invalidate(&KeyMatch::Exact(self.key.clone()));
    // Our own invalidation needs no reaction
    self.changed.store(false, Ordering::SeqCst);
    self.start_fetch();
  }

  /// Poll for results from a pending fetch and for cache changes made by
  /// other views.
  ///
  /// Returns `true` if the state changed. Call this in your event loop
  /// tick handler.
  pub fn poll(&mut self) -> bool {
    let mut updated = false;

    if let Some(receiver) = &mut self.receiver {
      match receiver.try_recv() {
        Ok(Ok(data)) => {
          self.state = QueryState::Success(data);
          self.receiver = None;
          updated = true;
        }
        Ok(Err(error)) => {
          self.state = QueryState::Error(error);
          self.receiver = None;
          updated = true;
        }
        Err(mpsc::error::TryRecvError::Empty) => {}
        Err(mpsc::error::TryRecvError::Disconnected) => {
          // Sender dropped without sending - treat as error
          self.state = QueryState::Error(ApiError::Transport("query was cancelled".into()));
          self.receiver = None;
          updated = true;
        }
      }
    }

    if self.receiver.is_none() && self.changed.swap(false, Ordering::SeqCst) {
      updated |= self.apply_cache_change();
    }
    updated
  }

  fn apply_cache_change(&mut self) -> bool {
    match self.cache.snapshot::<T>(&self.key) {
      // Someone else's write made this entry stale: load it again
      Some(snapshot) if snapshot.needs_reload() => {
        self.start_fetch();
        true
      }
      // The reload after an invalidation failed
      Some(QuerySnapshot {
        is_invalidated: true,
        error: Some(error),
        ..
      }) => {
        let changed = !matches!(self.state, QueryState::Error(_));
        self.state = QueryState::Error(error);
        changed
      }
      Some(QuerySnapshot {
        data: Some(data), ..
      }) => {
        let unchanged = matches!(&self.state, QueryState::Success(current) if Arc::ptr_eq(current, &data));
        self.state = QueryState::Success(data);
        !unchanged
      }
      // Entry was cleared
      None if self.state.is_success() => {
        self.start_fetch();
        true
      }
      _ => false,
    }
  }

  fn start_fetch(&mut self) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.state = QueryState::Loading;

    let cache = self.cache.clone();
    let key = self.key.clone();
    let fetcher = Arc::clone(&self.fetcher);
    tokio::spawn(async move {
      let result = cache.fetch(key, move || fetcher()).await;
      // Ignore send errors - receiver may have been dropped
      let _ = tx.send(result);
    });
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .field("key", &self.key)
      .finish_non_exhaustive()
  }
}
