use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// A backend collection exposed as `/{NAME}` and `/{NAME}/{id}`.
pub trait Resource: Clone + Send + Sync + DeserializeOwned + 'static {
  /// Body sent on create and update
  type Payload: Serialize + Send + Sync;

  /// Path segment and cache namespace (e.g. "users")
  const NAME: &'static str;

  /// Array field holding the rows inside a list response's `data`
  const LIST_FIELD: &'static str;

  /// Singular label for messages (e.g. "user")
  const LABEL: &'static str;

  fn id(&self) -> &str;
}

/// Accepts both `"42"` and `42` for identifiers.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum RawId {
    Text(String),
    Number(i64),
  }

  Ok(match RawId::deserialize(deserializer)? {
    RawId::Text(s) => s,
    RawId::Number(n) => n.to_string(),
  })
}

// ============================================================================
// List parameters and pages
// ============================================================================

/// Query parameters for a list request. Also the list half of a cache key,
/// so two equal params always address the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListParams {
  pub page: u32,
  pub limit: u32,
  pub search: String,
  pub filters: BTreeMap<String, String>,
}

impl ListParams {
  pub fn new(page: u32, limit: u32) -> Self {
    Self {
      page: page.max(1),
      limit: limit.max(1),
      search: String::new(),
      filters: BTreeMap::new(),
    }
  }

  pub fn with_search(mut self, search: &str) -> Self {
    self.search = search.trim().to_string();
    self
  }

  pub fn with_filter(mut self, name: &str, value: &str) -> Self {
    self.filters.insert(name.to_string(), value.to_string());
    self
  }

  /// Query string pairs. `search` is only sent when non-empty.
  pub fn query_pairs(&self) -> Vec<(String, String)> {
    let mut pairs = vec![
      ("page".to_string(), self.page.to_string()),
      ("limit".to_string(), self.limit.to_string()),
    ];
    if !self.search.is_empty() {
      pairs.push(("search".to_string(), self.search.clone()));
    }
    for (name, value) in &self.filters {
      pairs.push((name.clone(), value.clone()));
    }
    pairs
  }
}

/// One page of a collection plus the server-reported totals.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
  pub items: Vec<T>,
  pub total: u64,
  pub total_pages: u32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
  pub total: u64,
  pub total_pages: u32,
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Admin,
  #[default]
  Customer,
}

impl Role {
  pub fn as_str(&self) -> &'static str {
    match self {
      Role::Admin => "admin",
      Role::Customer => "customer",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "admin" => Some(Role::Admin),
      "customer" => Some(Role::Customer),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
  Male,
  Female,
  Other,
}

impl Gender {
  pub fn as_str(&self) -> &'static str {
    match self {
      Gender::Male => "male",
      Gender::Female => "female",
      Gender::Other => "other",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "male" => Some(Gender::Male),
      "female" => Some(Gender::Female),
      "other" => Some(Gender::Other),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  #[serde(deserialize_with = "deserialize_id")]
  pub id: String,
  #[serde(default)]
  pub name: String,
  pub email: String,
  #[serde(default)]
  pub role: Role,
  #[serde(default)]
  pub gender: Option<Gender>,
  #[serde(default)]
  pub dob: Option<DateTime<Utc>>,
  #[serde(default)]
  pub status: Option<String>,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub updated_at: Option<DateTime<Utc>>,
}

/// Create/update body for a user. `gender` and `dob` are always sent, as
/// explicit nulls when unset. `passwordHash` is left out entirely unless a
/// password was entered, so an edit never touches stored credentials.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserPayload {
  pub name: String,
  pub email: String,
  pub role: Role,
  pub gender: Option<Gender>,
  pub dob: Option<DateTime<Utc>>,
  #[serde(rename = "passwordHash", skip_serializing_if = "Option::is_none")]
  pub password_hash: Option<String>,
}

impl Resource for User {
  type Payload = UserPayload;
  const NAME: &'static str = "users";
  const LIST_FIELD: &'static str = "users";
  const LABEL: &'static str = "user";

  fn id(&self) -> &str {
    &self.id
  }
}

// ============================================================================
// Products
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Dimensions {
  pub length: Option<f64>,
  pub width: Option<f64>,
  pub height: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
  #[serde(deserialize_with = "deserialize_id")]
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub sku: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub category: String,
  #[serde(default, rename = "type")]
  pub product_type: String,
  #[serde(default)]
  pub price: f64,
  #[serde(default)]
  pub compare_price: Option<f64>,
  #[serde(default)]
  pub cost_price: Option<f64>,
  #[serde(default)]
  pub stock: Option<u32>,
  #[serde(default)]
  pub weight: Option<f64>,
  #[serde(default)]
  pub dimensions: Dimensions,
  #[serde(default)]
  pub seo_title: String,
  #[serde(default)]
  pub seo_description: String,
  #[serde(default)]
  pub is_published: bool,
  #[serde(default)]
  pub is_featured: bool,
  #[serde(default)]
  pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPayload {
  pub name: String,
  pub sku: String,
  pub description: String,
  pub category: String,
  #[serde(rename = "type")]
  pub product_type: String,
  pub price: f64,
  pub compare_price: Option<f64>,
  pub cost_price: Option<f64>,
  pub stock: Option<u32>,
  pub weight: Option<f64>,
  pub dimensions: Dimensions,
  pub seo_title: String,
  pub seo_description: String,
  pub is_published: bool,
  pub is_featured: bool,
}

impl Resource for Product {
  type Payload = ProductPayload;
  const NAME: &'static str = "products";
  const LIST_FIELD: &'static str = "products";
  const LABEL: &'static str = "product";

  fn id(&self) -> &str {
    &self.id
  }
}

// ============================================================================
// Orders
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
  #[serde(deserialize_with = "deserialize_id")]
  pub id: String,
  #[serde(default)]
  pub variant_id: Option<String>,
  pub quantity: u32,
  pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  #[serde(deserialize_with = "deserialize_id")]
  pub id: String,
  #[serde(default)]
  pub user_id: Option<String>,
  pub status: String,
  #[serde(default)]
  pub total_price: f64,
  #[serde(default)]
  pub payment_method: Option<String>,
  #[serde(default)]
  pub shipping_name: Option<String>,
  #[serde(default)]
  pub shipping_city: Option<String>,
  #[serde(default)]
  pub shipping_country: Option<String>,
  #[serde(default)]
  pub items: Vec<OrderItem>,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
}

impl Order {
  pub fn item_count(&self) -> u32 {
    self.items.iter().map(|i| i.quantity).sum()
  }

  /// Confirmed orders are the only ones that can be marked shipped.
  pub fn can_ship(&self) -> bool {
    self.status == "confirmed"
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderPayload {
  pub status: String,
}

impl Resource for Order {
  type Payload = OrderPayload;
  const NAME: &'static str = "orders";
  const LIST_FIELD: &'static str = "orders";
  const LABEL: &'static str = "order";

  fn id(&self) -> &str {
    &self.id
  }
}

// ============================================================================
// Categories
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
  #[serde(deserialize_with = "deserialize_id")]
  pub id: String,
  pub name: String,
  #[serde(default, alias = "products")]
  pub product_count: u32,
  #[serde(default)]
  pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryPayload {
  pub name: String,
  pub status: Option<String>,
}

impl Resource for Category {
  type Payload = CategoryPayload;
  const NAME: &'static str = "categories";
  const LIST_FIELD: &'static str = "categories";
  const LABEL: &'static str = "category";

  fn id(&self) -> &str {
    &self.id
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_query_pairs_skip_empty_search() {
    let params = ListParams::new(2, 10);
    let pairs = params.query_pairs();
    assert_eq!(
      pairs,
      vec![
        ("page".to_string(), "2".to_string()),
        ("limit".to_string(), "10".to_string()),
      ]
    );
  }

  #[test]
  fn test_query_pairs_with_search_and_filters() {
    let params = ListParams::new(1, 10)
      .with_search("  jane ")
      .with_filter("status", "shipped");
    let pairs = params.query_pairs();
    assert!(pairs.contains(&("search".to_string(), "jane".to_string())));
    assert!(pairs.contains(&("status".to_string(), "shipped".to_string())));
  }

  #[test]
  fn test_list_params_clamp_to_one() {
    let params = ListParams::new(0, 0);
    assert_eq!(params.page, 1);
    assert_eq!(params.limit, 1);
  }

  #[test]
  fn test_user_accepts_numeric_id_and_missing_optionals() {
    let user: User = serde_json::from_value(json!({
      "id": 7,
      "name": "Jane Smith",
      "email": "jane@example.com",
      "role": "admin"
    }))
    .unwrap();
    assert_eq!(user.id, "7");
    assert_eq!(user.role, Role::Admin);
    assert_eq!(user.gender, None);
  }

  #[test]
  fn test_user_payload_sends_null_gender_and_omits_password() {
    let payload = UserPayload {
      name: "Jane".into(),
      email: "jane@example.com".into(),
      role: Role::Customer,
      gender: None,
      dob: None,
      password_hash: None,
    };
    let value = serde_json::to_value(&payload).unwrap();
    assert_eq!(value["gender"], serde_json::Value::Null);
    assert_eq!(value["dob"], serde_json::Value::Null);
    assert!(value.get("passwordHash").is_none());
  }

  #[test]
  fn test_order_helpers() {
    let order: Order = serde_json::from_value(json!({
      "id": "1",
      "status": "confirmed",
      "totalPrice": 109.97,
      "items": [
        {"id": "1", "quantity": 2, "price": 29.99},
        {"id": "2", "quantity": 1, "price": 79.99}
      ]
    }))
    .unwrap();
    assert_eq!(order.item_count(), 3);
    assert!(order.can_ship());
  }

  #[test]
  fn test_category_accepts_products_alias() {
    let category: Category =
      serde_json::from_value(json!({"id": 1, "name": "Electronics", "products": 45})).unwrap();
    assert_eq!(category.product_count, 45);
  }
}
