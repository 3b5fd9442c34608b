//! State machine behind every paginated, searchable resource list.
//!
//! The controller owns the list parameters (page, search, filters), asks
//! the query cache for the matching page, and applies results on the UI
//! tick. Only the response to the most recent request is applied; the
//! previous page stays on screen while the next one loads.

use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::pagination::{page_window, PageItem};
use super::selection::Selection;
use crate::api::types::{ListParams, Page, Resource};
use crate::api::{ApiError, ResourceService};
use crate::debounce::Debouncer;
use crate::query::{KeyMatch, Mutation, QueryCache, QueryKey, Subscription};

/// Lifecycle of the list's current request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListState {
  Idle,
  Loading,
  Ready,
  Errored(String),
}

/// Outcome of one bulk delete: every id was attempted independently.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkDeleteReport {
  pub succeeded: Vec<String>,
  pub failed: Vec<(String, ApiError)>,
}

impl BulkDeleteReport {
  pub fn is_clean(&self) -> bool {
    self.failed.is_empty()
  }

  pub fn summary(&self, label: &str) -> String {
    if self.failed.is_empty() {
      return format!("Deleted {} {}(s)", self.succeeded.len(), label);
    }
    let failed: Vec<String> = self
      .failed
      .iter()
      .map(|(id, err)| format!("{} ({})", id, err))
      .collect();
    format!(
      "Deleted {} {}(s), {} failed: {}",
      self.succeeded.len(),
      label,
      self.failed.len(),
      failed.join(", ")
    )
  }
}

enum ListMessage<R> {
  Loaded {
    seq: u64,
    key: QueryKey,
    result: Result<Arc<Page<R>>, ApiError>,
  },
  /// The cache entry for this key changed
  Changed(QueryKey),
  BulkDeleted(BulkDeleteReport),
  Deleted {
    id: String,
    result: Result<(), ApiError>,
  },
  Updated {
    id: String,
    result: Result<R, ApiError>,
  },
}

pub struct ListController<R: Resource> {
  cache: QueryCache,
  service: Arc<dyn ResourceService<R>>,
  page: u32,
  page_size: u32,
  /// The settled search the current request uses
  search: String,
  filters: BTreeMap<String, String>,
  debouncer: Debouncer<String>,
  state: ListState,
  data: Option<Arc<Page<R>>>,
  data_key: Option<QueryKey>,
  selection: Selection,
  /// Id of the latest request; older responses are discarded
  seq: u64,
  tx: mpsc::UnboundedSender<ListMessage<R>>,
  rx: mpsc::UnboundedReceiver<ListMessage<R>>,
  subscription: Option<Subscription>,
  bulk_in_flight: bool,
  last_report: Option<BulkDeleteReport>,
  notice: Option<String>,
}

impl<R: Resource> ListController<R> {
  pub fn new(
    cache: QueryCache,
    service: Arc<dyn ResourceService<R>>,
    page_size: u32,
    search_delay: Duration,
  ) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    Self {
      cache,
      service,
      page: 1,
      page_size: page_size.max(1),
      search: String::new(),
      filters: BTreeMap::new(),
      debouncer: Debouncer::new(search_delay),
      state: ListState::Idle,
      data: None,
      data_key: None,
      selection: Selection::new(),
      seq: 0,
      tx,
      rx,
      subscription: None,
      bulk_in_flight: false,
      last_report: None,
      notice: None,
    }
  }

  /// Start with a fixed filter (e.g. customers are users with
  /// `role=customer`).
  pub fn with_filter(mut self, name: &str, value: &str) -> Self {
    self.filters.insert(name.to_string(), value.to_string());
    self
  }

  /// Issue the first request.
  pub fn start(&mut self) {
    if self.state == ListState::Idle {
      self.load();
    }
  }

  // Accessors

  pub fn state(&self) -> &ListState {
    &self.state
  }

  pub fn is_loading(&self) -> bool {
    self.state == ListState::Loading
  }

  pub fn error(&self) -> Option<&str> {
    match &self.state {
      ListState::Errored(message) => Some(message),
      _ => None,
    }
  }

  /// Rows on screen: the last loaded page, kept while the next one loads.
  pub fn rows(&self) -> &[R] {
    self.data.as_ref().map(|p| p.items.as_slice()).unwrap_or(&[])
  }

  pub fn page(&self) -> u32 {
    self.page
  }

  pub fn total(&self) -> u64 {
    self.data.as_ref().map(|p| p.total).unwrap_or(0)
  }

  pub fn total_pages(&self) -> u32 {
    self.data.as_ref().map(|p| p.total_pages).unwrap_or(0)
  }

  pub fn page_window(&self) -> Vec<PageItem> {
    page_window(self.page, self.total_pages())
  }

  pub fn applied_search(&self) -> &str {
    &self.search
  }

  pub fn filter(&self, name: &str) -> Option<&str> {
    self.filters.get(name).map(String::as_str)
  }

  pub fn selection(&self) -> &Selection {
    &self.selection
  }

  pub fn is_selected(&self, id: &str) -> bool {
    self.selection.contains(id)
  }

  pub fn is_bulk_deleting(&self) -> bool {
    self.bulk_in_flight
  }

  pub fn last_report(&self) -> Option<&BulkDeleteReport> {
    self.last_report.as_ref()
  }

  /// Outcome of the last single-row action, for the status line
  pub fn notice(&self) -> Option<&str> {
    self.notice.as_deref()
  }

  /// Forget the last write outcome once the user has seen it.
  pub fn dismiss_notice(&mut self) {
    self.notice = None;
    self.last_report = None;
  }

  pub fn params(&self) -> ListParams {
    self.filters.iter().fold(
      ListParams::new(self.page, self.page_size).with_search(&self.search),
      |params, (name, value)| params.with_filter(name, value),
    )
  }

  pub fn current_key(&self) -> QueryKey {
    QueryKey::list::<R>(self.params())
  }

  // Parameter changes

  /// Feed the search box text. The query only changes once typing settles.
  pub fn set_search(&mut self, text: &str) {
    self.debouncer.set(text.trim().to_string());
  }

  /// Set (or with `None`, remove) a filter. Resets to page 1 and clears
  /// the selection, like a search change.
  pub fn set_filter(&mut self, name: &str, value: Option<&str>) {
    let changed = match value {
      Some(value) => self.filters.insert(name.to_string(), value.to_string()).as_deref() != Some(value),
      None => self.filters.remove(name).is_some(),
    };
    if changed {
      self.page = 1;
      self.selection.clear();
      self.load();
    }
  }

  /// Jump to `page`, clamped to the known page count.
  pub fn set_page(&mut self, page: u32) {
    let last = self.total_pages().max(1);
    let page = page.clamp(1, last);
    if page == self.page {
      return;
    }
    self.page = page;
    self.selection.clear();
    self.load();
  }

  pub fn next_page(&mut self) {
    self.set_page(self.page.saturating_add(1));
  }

  pub fn prev_page(&mut self) {
    self.set_page(self.page.saturating_sub(1));
  }

  /// Retry after a failed load.
  pub fn retry(&mut self) {
    if matches!(self.state, ListState::Errored(_)) {
      self.load();
    }
  }

  /// Mark everything cached for this resource stale and reload.
  pub fn refresh(&mut self) {
    self.cache.invalidate(&KeyMatch::Resource(R::NAME));
    self.load();
  }

  // Selection

  /// Toggle a visible row. Ids not on the current page are ignored.
  pub fn toggle(&mut self, id: &str) {
    if self.rows().iter().any(|r| r.id() == id) {
      self.selection.toggle(id);
    }
  }

  /// Select every visible row, or clear when they already all are.
  pub fn toggle_all(&mut self) {
    let visible: Vec<String> = self.rows().iter().map(|r| r.id().to_string()).collect();
    if self.selection.covers(visible.iter().map(String::as_str)) {
      self.selection.clear();
    } else {
      self.selection.select_all(visible.iter().map(String::as_str));
    }
  }

  pub fn clear_selection(&mut self) {
    self.selection.clear();
  }

  // Writes

  /// Delete every selected row. Each delete is independent: all are
  /// attempted even if some fail. Returns false when there is nothing to
  /// do or a bulk delete is already running.
  pub fn start_bulk_delete(&mut self) -> bool {
    if self.selection.is_empty() || self.bulk_in_flight {
      return false;
    }
    let ids = self.selection.ids().to_vec();
    self.bulk_in_flight = true;
    self.last_report = None;
    info!(resource = R::NAME, count = ids.len(), "bulk delete started");

    let cache = self.cache.clone();
    let service = Arc::clone(&self.service);
    let tx = self.tx.clone();
    tokio::spawn(async move {
      let deletes = ids.into_iter().map(|id| {
        let cache = cache.clone();
        let service = Arc::clone(&service);
        async move {
          let result = cache
            .mutate(Mutation::delete::<R>(&id), service.delete(&id))
            .await;
          (id, result)
        }
      });

      let mut report = BulkDeleteReport::default();
      for (id, result) in join_all(deletes).await {
        match result {
          Ok(()) => report.succeeded.push(id),
          Err(err) => report.failed.push((id, err)),
        }
      }
      let _ = tx.send(ListMessage::BulkDeleted(report));
    });
    true
  }

  pub fn delete_one(&mut self, id: &str) {
    let cache = self.cache.clone();
    let service = Arc::clone(&self.service);
    let tx = self.tx.clone();
    let id = id.to_string();
    tokio::spawn(async move {
      let result = cache
        .mutate(Mutation::delete::<R>(&id), service.delete(&id))
        .await;
      let _ = tx.send(ListMessage::Deleted { id, result });
    });
  }

  /// Send an update for one row (e.g. marking an order shipped).
  pub fn update_one(&mut self, id: &str, payload: R::Payload) {
    let cache = self.cache.clone();
    let service = Arc::clone(&self.service);
    let tx = self.tx.clone();
    let id = id.to_string();
    tokio::spawn(async move {
      let result = cache
        .mutate(Mutation::update::<R>(&id), service.update(&id, &payload))
        .await;
      if let Ok(record) = &result {
        cache.set_data(QueryKey::detail::<R>(&id), record.clone());
      }
      let _ = tx.send(ListMessage::Updated { id, result });
    });
  }

  // Tick

  /// Apply everything that happened since the last tick: a settled
  /// search, loaded pages, cache changes and write outcomes.
  pub fn tick(&mut self) {
    if let Some(search) = self.debouncer.poll() {
      if search != self.search {
        debug!(resource = R::NAME, %search, "search settled");
        self.search = search;
        self.page = 1;
        self.selection.clear();
        self.load();
      }
    }

    while let Ok(message) = self.rx.try_recv() {
      self.handle_message(message);
    }
  }

  fn handle_message(&mut self, message: ListMessage<R>) {
    match message {
      ListMessage::Loaded { seq, key, result } => {
        if seq != self.seq {
          debug!(key = %key.description(), seq, latest = self.seq, "discarding stale list response");
          return;
        }
        match result {
          Ok(page) => self.apply_page(key, page),
          Err(err) => {
            warn!(key = %key.description(), error = %err, "list load failed");
            self.state = ListState::Errored(err.to_string());
          }
        }
      }
      ListMessage::Changed(key) => self.handle_cache_change(key),
      ListMessage::BulkDeleted(report) => {
        info!(
          resource = R::NAME,
          succeeded = report.succeeded.len(),
          failed = report.failed.len(),
          "bulk delete finished"
        );
        self.bulk_in_flight = false;
        self.selection.clear();
        self.last_report = Some(report);
      }
      ListMessage::Deleted { id, result } => {
        self.notice = Some(match result {
          Ok(()) => {
            self.selection.set(&id, false);
            format!("Deleted {} {}", R::LABEL, id)
          }
          Err(err) => format!("Failed to delete {} {}: {}", R::LABEL, id, err),
        });
      }
      ListMessage::Updated { id, result } => {
        self.notice = Some(match result {
          Ok(_) => format!("Updated {} {}", R::LABEL, id),
          Err(err) => format!("Failed to update {} {}: {}", R::LABEL, id, err),
        });
      }
    }
  }

  fn handle_cache_change(&mut self, key: QueryKey) {
    if key != self.current_key() {
      return;
    }
    match self.cache.snapshot::<Page<R>>(&key) {
      // A write somewhere made this page stale
      Some(snapshot) if snapshot.needs_reload() => self.load(),
      // The reload failed; its own response moves us to Errored
      Some(snapshot) if snapshot.is_invalidated => {}
      Some(snapshot) => {
        if let (Some(page), false) = (snapshot.data, self.is_loading()) {
          self.apply_page(key, page);
        }
      }
      None => self.load(),
    }
  }

  fn apply_page(&mut self, key: QueryKey, page: Arc<Page<R>>) {
    if page.total_pages > 0 && self.page > page.total_pages {
      // Rows were removed from under us; step back to the last page
      self.page = page.total_pages;
      self.selection.clear();
      self.load();
      return;
    }

    let same_rows = self.data_key.as_ref() == Some(&key);
    self.data = Some(page);
    self.data_key = Some(key);
    self.state = ListState::Ready;

    if same_rows {
      let visible: Vec<String> = self.rows().iter().map(|r| r.id().to_string()).collect();
      self.selection.retain_visible(visible.iter().map(String::as_str));
    } else {
      self.selection.clear();
    }
  }

  /// Request the page for the current parameters.
  fn load(&mut self) {
    let params = self.params();
    let key = QueryKey::list::<R>(params.clone());
    self.seq += 1;
    let seq = self.seq;
    self.state = ListState::Loading;
    self.watch(&key);
    debug!(key = %key.description(), seq, "loading list");

    let cache = self.cache.clone();
    let service = Arc::clone(&self.service);
    let tx = self.tx.clone();
    tokio::spawn(async move {
      let loader = move || {
        let service = Arc::clone(&service);
        let params = params.clone();
        async move { service.list(&params).await }
      };
      let result = cache.fetch(key.clone(), loader).await;
      let _ = tx.send(ListMessage::Loaded { seq, key, result });
    });
  }

  /// Follow cache changes for `key` only.
  fn watch(&mut self, key: &QueryKey) {
    if self.subscription.as_ref().map(|s| s.key()) == Some(key) {
      return;
    }
    let tx = self.tx.clone();
    self.subscription = Some(self.cache.subscribe(key.clone(), move |changed| {
      let _ = tx.send(ListMessage::Changed(changed.clone()));
    }));
  }
}
