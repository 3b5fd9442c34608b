//! In-memory `ResourceService` for controller tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::api::types::{
  ListParams, Order, OrderItem, OrderPayload, Page, Product, ProductPayload, Resource, Role, User,
  UserPayload,
};
use crate::api::{ApiError, ResourceService};

type Matcher<R> = fn(&R, &str) -> bool;
type Builder<R> = fn(&str, &<R as Resource>::Payload) -> R;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Calls {
  pub list: usize,
  pub get: usize,
  pub create: usize,
  pub update: usize,
  pub delete: usize,
}

struct State<R> {
  records: Vec<R>,
  next_id: u32,
  calls: Calls,
  list_requests: Vec<ListParams>,
  failing_ids: HashSet<String>,
  list_failure: Option<ApiError>,
  write_failure: Option<ApiError>,
  search_delays: HashMap<String, Duration>,
  write_delay: Duration,
}

pub struct MemoryService<R: Resource> {
  state: Mutex<State<R>>,
  matcher: Matcher<R>,
  builder: Builder<R>,
}

impl<R: Resource> MemoryService<R> {
  pub fn new(records: Vec<R>, matcher: Matcher<R>, builder: Builder<R>) -> Arc<Self> {
    let next_id = records.len() as u32 + 1;
    Arc::new(Self {
      state: Mutex::new(State {
        records,
        next_id,
        calls: Calls::default(),
        list_requests: Vec::new(),
        failing_ids: HashSet::new(),
        list_failure: None,
        write_failure: None,
        search_delays: HashMap::new(),
        write_delay: Duration::ZERO,
      }),
      matcher,
      builder,
    })
  }

  fn lock(&self) -> MutexGuard<'_, State<R>> {
    self.state.lock().unwrap()
  }

  pub fn calls(&self) -> Calls {
    self.lock().calls
  }

  pub fn list_requests(&self) -> Vec<ListParams> {
    self.lock().list_requests.clone()
  }

  pub fn records(&self) -> Vec<R> {
    self.lock().records.clone()
  }

  /// Deletes and updates of `id` are rejected by the "server".
  pub fn fail_id(&self, id: &str) {
    self.lock().failing_ids.insert(id.to_string());
  }

  pub fn fail_lists(&self, error: Option<ApiError>) {
    self.lock().list_failure = error;
  }

  pub fn fail_writes(&self, error: Option<ApiError>) {
    self.lock().write_failure = error;
  }

  /// List requests searching for `search` take `delay` to answer.
  pub fn delay_search(&self, search: &str, delay: Duration) {
    self.lock().search_delays.insert(search.to_string(), delay);
  }

  pub fn delay_writes(&self, delay: Duration) {
    self.lock().write_delay = delay;
  }

  fn write_delay(&self) -> Duration {
    self.lock().write_delay
  }

  fn check_write(&self, id: Option<&str>) -> Result<(), ApiError> {
    let state = self.lock();
    if let Some(err) = &state.write_failure {
      return Err(err.clone());
    }
    match id {
      Some(id) if state.failing_ids.contains(id) => Err(ApiError::rejected(
        Some(409),
        format!("{} {} is locked", R::LABEL, id),
      )),
      _ => Ok(()),
    }
  }
}

#[async_trait]
impl<R: Resource> ResourceService<R> for MemoryService<R> {
  async fn list(&self, params: &ListParams) -> Result<Page<R>, ApiError> {
    let delay = {
      let mut state = self.lock();
      state.calls.list += 1;
      state.list_requests.push(params.clone());
      state
        .search_delays
        .get(&params.search)
        .copied()
        .unwrap_or_default()
    };
    tokio::time::sleep(delay).await;

    let state = self.lock();
    if let Some(err) = &state.list_failure {
      return Err(err.clone());
    }
    let matching: Vec<&R> = state
      .records
      .iter()
      .filter(|r| params.search.is_empty() || (self.matcher)(r, &params.search))
      .collect();
    let total = matching.len() as u64;
    let limit = params.limit as usize;
    let total_pages = matching.len().div_ceil(limit) as u32;
    let start = (params.page as usize - 1) * limit;
    let items = matching
      .into_iter()
      .skip(start)
      .take(limit)
      .cloned()
      .collect();
    Ok(Page {
      items,
      total,
      total_pages,
    })
  }

  async fn get(&self, id: &str) -> Result<R, ApiError> {
    let mut state = self.lock();
    state.calls.get += 1;
    state
      .records
      .iter()
      .find(|r| r.id() == id)
      .cloned()
      .ok_or_else(|| ApiError::rejected(Some(404), format!("{} not found", R::LABEL)))
  }

  async fn create(&self, payload: &R::Payload) -> Result<R, ApiError> {
    self.lock().calls.create += 1;
    tokio::time::sleep(self.write_delay()).await;
    self.check_write(None)?;

    let mut state = self.lock();
    let id = state.next_id.to_string();
    state.next_id += 1;
    let record = (self.builder)(&id, payload);
    state.records.push(record.clone());
    Ok(record)
  }

  async fn update(&self, id: &str, payload: &R::Payload) -> Result<R, ApiError> {
    self.lock().calls.update += 1;
    tokio::time::sleep(self.write_delay()).await;
    self.check_write(Some(id))?;

    let mut state = self.lock();
    let record = (self.builder)(id, payload);
    let slot = state
      .records
      .iter_mut()
      .find(|r| r.id() == id)
      .ok_or_else(|| ApiError::rejected(Some(404), format!("{} not found", R::LABEL)))?;
    *slot = record.clone();
    Ok(record)
  }

  async fn delete(&self, id: &str) -> Result<(), ApiError> {
    self.lock().calls.delete += 1;
    tokio::time::sleep(self.write_delay()).await;
    self.check_write(Some(id))?;

    let mut state = self.lock();
    let before = state.records.len();
    state.records.retain(|r| r.id() != id);
    if state.records.len() == before {
      return Err(ApiError::rejected(Some(404), format!("{} not found", R::LABEL)));
    }
    Ok(())
  }
}

pub fn user(id: u32) -> User {
  User {
    id: id.to_string(),
    name: format!("User {}", id),
    email: format!("user{}@example.com", id),
    role: Role::Customer,
    gender: None,
    dob: None,
    status: Some("active".into()),
    created_at: None,
    updated_at: None,
  }
}

pub fn users(count: u32) -> Vec<User> {
  (1..=count).map(user).collect()
}

/// Service over `count` sample users, searchable by name and email.
pub fn user_service(count: u32) -> Arc<MemoryService<User>> {
  MemoryService::new(
    users(count),
    |user, search| {
      let search = search.to_lowercase();
      user.name.to_lowercase().contains(&search) || user.email.to_lowercase().contains(&search)
    },
    |id, payload: &UserPayload| User {
      id: id.to_string(),
      name: payload.name.clone(),
      email: payload.email.clone(),
      role: payload.role,
      gender: payload.gender,
      dob: payload.dob,
      status: Some("active".into()),
      created_at: None,
      updated_at: None,
    },
  )
}

pub fn product_service() -> Arc<MemoryService<Product>> {
  MemoryService::new(
    Vec::new(),
    |product, search| product.name.to_lowercase().contains(&search.to_lowercase()),
    |id, payload: &ProductPayload| Product {
      id: id.to_string(),
      name: payload.name.clone(),
      sku: payload.sku.clone(),
      description: payload.description.clone(),
      category: payload.category.clone(),
      product_type: payload.product_type.clone(),
      price: payload.price,
      compare_price: payload.compare_price,
      cost_price: payload.cost_price,
      stock: payload.stock,
      weight: payload.weight,
      dimensions: payload.dimensions,
      seo_title: payload.seo_title.clone(),
      seo_description: payload.seo_description.clone(),
      is_published: payload.is_published,
      is_featured: payload.is_featured,
      status: None,
    },
  )
}

/// Order `id` with a single line of `quantity` items.
pub fn order(id: u32, total_price: f64, quantity: u32) -> Order {
  Order {
    id: id.to_string(),
    user_id: Some(id.to_string()),
    status: "pending".into(),
    total_price,
    payment_method: None,
    shipping_name: Some(format!("Customer {}", id)),
    shipping_city: None,
    shipping_country: None,
    items: vec![OrderItem {
      id: format!("{}-1", id),
      variant_id: None,
      quantity,
      price: total_price,
    }],
    created_at: None,
  }
}

pub fn order_service(orders: Vec<Order>) -> Arc<MemoryService<Order>> {
  MemoryService::new(
    orders,
    |order, search| order.id == search,
    |id, payload: &OrderPayload| Order {
      status: payload.status.clone(),
      ..order(id.parse().unwrap_or_default(), 0.0, 0)
    },
  )
}
