//! Store overview shown on start: headline counts, revenue and the newest
//! orders.
//!
//! Every figure comes from the first page of an ordinary list query. The
//! counts use the `total` the server reports, so a one-row page is enough
//! for customers and products. Writes invalidate these entries like any
//! other list, and the overview reloads on the next poll.

use std::sync::Arc;

use crate::api::types::{ListParams, Order, Page, Product, Resource, User};
use crate::api::{ApiError, ResourceService};
use crate::query::{Query, QueryCache, QueryKey};

/// Rows in the recent orders table
pub const RECENT_ORDERS: usize = 5;

/// Newest orders the revenue figures are computed over
pub const ORDER_SAMPLE: u32 = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct Overview {
  pub orders: u64,
  pub customers: u64,
  pub products: u64,
  /// Orders `revenue` and `items_sold` cover
  pub sampled: usize,
  pub revenue: f64,
  pub items_sold: u32,
  pub recent: Vec<Order>,
}

impl Overview {
  pub fn new(orders: &Page<Order>, customers: &Page<User>, products: &Page<Product>) -> Self {
    Self {
      orders: orders.total,
      customers: customers.total,
      products: products.total,
      sampled: orders.items.len(),
      revenue: orders.items.iter().map(|o| o.total_price).sum(),
      items_sold: orders.items.iter().map(Order::item_count).sum(),
      recent: orders.items.iter().take(RECENT_ORDERS).cloned().collect(),
    }
  }

  /// Mean order value, None before the first order
  pub fn average_order(&self) -> Option<f64> {
    (self.sampled > 0).then(|| self.revenue / self.sampled as f64)
  }

  /// True when there are more orders than the revenue sample holds
  pub fn is_partial(&self) -> bool {
    (self.sampled as u64) < self.orders
  }
}

fn list_query<R: Resource>(
  cache: &QueryCache,
  service: Arc<dyn ResourceService<R>>,
  params: ListParams,
) -> Query<Page<R>> {
  let key = QueryKey::list::<R>(params.clone());
  let mut query = Query::new(cache.clone(), key, move || {
    let service = Arc::clone(&service);
    let params = params.clone();
    async move { service.list(&params).await }
  });
  query.fetch();
  query
}

/// The three list queries behind the overview
pub struct Dashboard {
  orders: Query<Page<Order>>,
  customers: Query<Page<User>>,
  products: Query<Page<Product>>,
  /// Last complete overview, kept while a reload is in flight
  overview: Option<Overview>,
}

impl Dashboard {
  /// Start loading every figure.
  pub fn new(
    cache: &QueryCache,
    orders: Arc<dyn ResourceService<Order>>,
    users: Arc<dyn ResourceService<User>>,
    products: Arc<dyn ResourceService<Product>>,
  ) -> Self {
    Self {
      orders: list_query(cache, orders, ListParams::new(1, ORDER_SAMPLE)),
      customers: list_query(
        cache,
        users,
        ListParams::new(1, 1).with_filter("role", "customer"),
      ),
      products: list_query(cache, products, ListParams::new(1, 1)),
      overview: None,
    }
  }

  /// Pick up finished loads and cache changes. Returns true when anything
  /// on screen changed.
  pub fn poll(&mut self) -> bool {
    // Every query is polled, no short circuit
    let orders = self.orders.poll();
    let customers = self.customers.poll();
    let products = self.products.poll();
    if !(orders || customers || products) {
      return false;
    }

    if let (Some(o), Some(c), Some(p)) =
      (self.orders.data(), self.customers.data(), self.products.data())
    {
      self.overview = Some(Overview::new(o, c, p));
    }
    true
  }

  /// Reload every figure unless a load is already running.
  pub fn refresh(&mut self) {
    if self.is_loading() {
      return;
    }
    self.orders.refetch();
    self.customers.refetch();
    self.products.refetch();
  }

  pub fn is_loading(&self) -> bool {
    self.orders.is_loading() || self.customers.is_loading() || self.products.is_loading()
  }

  /// First failure among the three queries
  pub fn error(&self) -> Option<&ApiError> {
    self
      .orders
      .error()
      .or_else(|| self.customers.error())
      .or_else(|| self.products.error())
  }

  pub fn overview(&self) -> Option<&Overview> {
    self.overview.as_ref()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::query::{CacheOptions, Mutation};
  use crate::test_support::{order, order_service, product_service, user_service};
  use std::time::Duration;

  fn cache() -> QueryCache {
    QueryCache::new(CacheOptions {
      retries: 0,
      ..CacheOptions::default()
    })
  }

  fn page<T>(items: Vec<T>, total: u64) -> Page<T> {
    Page {
      items,
      total,
      total_pages: 1,
    }
  }

  async fn settle(dashboard: &mut Dashboard) {
    for _ in 0..5 {
      tokio::time::sleep(Duration::from_millis(1)).await;
      dashboard.poll();
    }
  }

  #[test]
  fn test_overview_figures() {
    let orders: Vec<Order> = (1..=6).map(|i| order(i, 10.0 * i as f64, 2)).collect();
    let overview = Overview::new(
      &page(orders, 80),
      &page(Vec::new(), 12),
      &page(Vec::new(), 40),
    );

    assert_eq!(overview.orders, 80);
    assert_eq!(overview.customers, 12);
    assert_eq!(overview.products, 40);
    assert_eq!(overview.revenue, 210.0);
    assert_eq!(overview.average_order(), Some(35.0));
    assert_eq!(overview.items_sold, 12);
    assert!(overview.is_partial());

    let recent: Vec<&str> = overview.recent.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(recent, vec!["1", "2", "3", "4", "5"]);
  }

  #[test]
  fn test_no_orders_has_no_average() {
    let overview = Overview::new(&page(Vec::new(), 0), &page(Vec::new(), 3), &page(Vec::new(), 0));
    assert_eq!(overview.average_order(), None);
    assert!(overview.recent.is_empty());
    assert!(!overview.is_partial());
  }

  #[tokio::test(start_paused = true)]
  async fn test_dashboard_loads_counts_from_list_totals() {
    let cache = cache();
    let orders = order_service((1..=7).map(|i| order(i, 20.0, 1)).collect());
    let users = user_service(3);
    let products = product_service();
    let mut dashboard = Dashboard::new(&cache, orders.clone(), users.clone(), products.clone());
    assert!(dashboard.is_loading());
    assert!(dashboard.overview().is_none());

    settle(&mut dashboard).await;

    let overview = dashboard.overview().unwrap();
    assert_eq!(overview.orders, 7);
    assert_eq!(overview.customers, 3);
    assert_eq!(overview.products, 0);
    assert_eq!(overview.revenue, 140.0);
    assert_eq!(overview.recent.len(), RECENT_ORDERS);

    assert_eq!(users.list_requests()[0].limit, 1);
    assert_eq!(
      users.list_requests()[0].filters.get("role").map(String::as_str),
      Some("customer")
    );
    assert_eq!(orders.list_requests()[0].limit, ORDER_SAMPLE);
  }

  #[tokio::test(start_paused = true)]
  async fn test_dashboard_reloads_after_order_deleted() {
    let cache = cache();
    let orders = order_service((1..=3).map(|i| order(i, 15.0, 1)).collect());
    let mut dashboard = Dashboard::new(&cache, orders.clone(), user_service(2), product_service());
    settle(&mut dashboard).await;
    assert_eq!(dashboard.overview().unwrap().orders, 3);

    let writer = orders.clone();
    cache
      .mutate(Mutation::delete::<Order>("2"), async move {
        ResourceService::<Order>::delete(writer.as_ref(), "2").await
      })
      .await
      .unwrap();
    settle(&mut dashboard).await;

    let overview = dashboard.overview().unwrap();
    assert_eq!(overview.orders, 2);
    assert_eq!(overview.revenue, 30.0);
    assert_eq!(orders.calls().list, 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_failed_load_reports_error_and_refresh_recovers() {
    let cache = cache();
    let products = product_service();
    products.fail_lists(Some(ApiError::rejected(Some(500), "Failed to fetch products")));
    let mut dashboard = Dashboard::new(&cache, order_service(Vec::new()), user_service(1), products.clone());
    settle(&mut dashboard).await;

    assert!(dashboard.overview().is_none());
    assert_eq!(dashboard.error().unwrap().to_string(), "Failed to fetch products");

    products.fail_lists(None);
    dashboard.refresh();
    settle(&mut dashboard).await;

    assert!(dashboard.error().is_none());
    assert_eq!(dashboard.overview().unwrap().customers, 1);
  }
}
