//! How each resource shows up in lists and detail panes, and which
//! dialogs it offers.

use ratatui::prelude::Color;

use super::FormView;
use crate::api::types::{Category, Order, OrderPayload, Product, Resource, User};
use crate::app::Services;
use crate::form::{ProductForm, UserForm};
use crate::ui::renderfns::{format_date, format_money, status_color};
use crate::ui::view::View;

/// A list column: heading and width in characters
pub type Column = (&'static str, usize);

/// A rendered cell: text and color
pub type Cell = (String, Color);

/// Called with the record a create/edit dialog saved
pub type OnSaved<R> = Box<dyn FnOnce(&R) + Send>;

pub trait ListRow: Resource {
  const COLUMNS: &'static [Column];

  /// Whether create/edit dialogs exist for this resource
  const EDITABLE: bool = false;

  /// Filter cycled with `f`: query parameter name and its values
  const FILTER: Option<(&'static str, &'static [&'static str])> = None;

  fn cells(&self) -> Vec<Cell>;

  /// Heading of the detail view
  fn title(&self) -> String;

  /// Labelled fields for the detail view
  fn detail(&self) -> Vec<(&'static str, String)>;

  /// Single-key update offered on this row (e.g. shipping an order)
  fn quick_update(&self) -> Option<(&'static str, Self::Payload)> {
    None
  }

  fn create_view(_services: &Services, _on_saved: OnSaved<Self>) -> Option<Box<dyn View>> {
    None
  }

  fn edit_view(&self, _services: &Services, _on_saved: OnSaved<Self>) -> Option<Box<dyn View>> {
    None
  }
}

fn plain(text: impl Into<String>) -> Cell {
  (text.into(), Color::White)
}

fn status_cell(status: Option<&str>) -> Cell {
  let status = status.unwrap_or("-");
  (status.to_string(), status_color(status))
}

fn optional<T: ToString>(value: Option<T>) -> String {
  value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

impl ListRow for User {
  const EDITABLE: bool = true;

  const COLUMNS: &'static [Column] = &[
    ("NAME", 22),
    ("EMAIL", 28),
    ("ROLE", 10),
    ("STATUS", 10),
    ("JOINED", 12),
  ];

  fn cells(&self) -> Vec<Cell> {
    vec![
      plain(&self.name),
      (self.email.clone(), Color::Cyan),
      plain(self.role.as_str()),
      status_cell(self.status.as_deref()),
      (format_date(self.created_at.as_ref()), Color::DarkGray),
    ]
  }

  fn title(&self) -> String {
    self.name.clone()
  }

  fn detail(&self) -> Vec<(&'static str, String)> {
    vec![
      ("Name", self.name.clone()),
      ("Email", self.email.clone()),
      ("Role", self.role.as_str().to_string()),
      ("Gender", optional(self.gender.map(|g| g.as_str()))),
      ("Date of birth", format_date(self.dob.as_ref())),
      ("Status", optional(self.status.as_deref())),
      ("Joined", format_date(self.created_at.as_ref())),
      ("Updated", format_date(self.updated_at.as_ref())),
    ]
  }

  fn create_view(services: &Services, on_saved: OnSaved<Self>) -> Option<Box<dyn View>> {
    Some(Box::new(FormView::<UserForm>::create(services, on_saved)))
  }

  fn edit_view(&self, services: &Services, on_saved: OnSaved<Self>) -> Option<Box<dyn View>> {
    Some(Box::new(FormView::<UserForm>::edit(services, self, on_saved)))
  }
}

impl ListRow for Product {
  const EDITABLE: bool = true;

  const COLUMNS: &'static [Column] = &[
    ("NAME", 28),
    ("SKU", 10),
    ("CATEGORY", 14),
    ("PRICE", 10),
    ("STOCK", 6),
    ("STATUS", 10),
  ];

  fn cells(&self) -> Vec<Cell> {
    let status = if self.is_published { "published" } else { "draft" };
    let stock_color = match self.stock {
      Some(0) => Color::Red,
      _ => Color::White,
    };
    vec![
      plain(&self.name),
      (self.sku.clone(), Color::Cyan),
      plain(&self.category),
      plain(format_money(self.price)),
      (optional(self.stock), stock_color),
      status_cell(Some(self.status.as_deref().unwrap_or(status))),
    ]
  }

  fn title(&self) -> String {
    self.name.clone()
  }

  fn detail(&self) -> Vec<(&'static str, String)> {
    let dims = &self.dimensions;
    vec![
      ("Name", self.name.clone()),
      ("SKU", self.sku.clone()),
      ("Type", self.product_type.clone()),
      ("Category", self.category.clone()),
      ("Price", format_money(self.price)),
      ("Compare price", optional(self.compare_price.map(format_money))),
      ("Cost price", optional(self.cost_price.map(format_money))),
      ("Stock", optional(self.stock)),
      ("Weight", optional(self.weight)),
      (
        "Dimensions",
        format!(
          "{} x {} x {}",
          optional(dims.length),
          optional(dims.width),
          optional(dims.height)
        ),
      ),
      ("Published", self.is_published.to_string()),
      ("Featured", self.is_featured.to_string()),
      ("SEO title", self.seo_title.clone()),
      ("SEO description", self.seo_description.clone()),
      ("Description", self.description.clone()),
    ]
  }

  fn create_view(services: &Services, on_saved: OnSaved<Self>) -> Option<Box<dyn View>> {
    Some(Box::new(FormView::<ProductForm>::create(services, on_saved)))
  }

  fn edit_view(&self, services: &Services, on_saved: OnSaved<Self>) -> Option<Box<dyn View>> {
    Some(Box::new(FormView::<ProductForm>::edit(services, self, on_saved)))
  }
}

impl ListRow for Order {
  const COLUMNS: &'static [Column] = &[
    ("ORDER", 8),
    ("CUSTOMER", 22),
    ("ITEMS", 6),
    ("TOTAL", 12),
    ("STATUS", 11),
    ("PLACED", 12),
  ];

  const FILTER: Option<(&'static str, &'static [&'static str])> = Some((
    "status",
    &["pending", "confirmed", "shipped", "delivered", "cancelled"],
  ));

  fn cells(&self) -> Vec<Cell> {
    let customer = self
      .shipping_name
      .clone()
      .or_else(|| self.user_id.as_ref().map(|id| format!("user {}", id)))
      .unwrap_or_else(|| "-".to_string());
    vec![
      (format!("#{}", self.id), Color::Cyan),
      plain(customer),
      plain(self.item_count().to_string()),
      plain(format_money(self.total_price)),
      status_cell(Some(&self.status)),
      (format_date(self.created_at.as_ref()), Color::DarkGray),
    ]
  }

  fn title(&self) -> String {
    format!("Order #{}", self.id)
  }

  fn detail(&self) -> Vec<(&'static str, String)> {
    let mut lines = vec![
      ("Status", self.status.clone()),
      ("Total", format_money(self.total_price)),
      ("Payment", optional(self.payment_method.as_deref())),
      ("Ship to", optional(self.shipping_name.as_deref())),
      (
        "Destination",
        format!(
          "{}, {}",
          self.shipping_city.as_deref().unwrap_or("-"),
          self.shipping_country.as_deref().unwrap_or("-")
        ),
      ),
      ("Placed", format_date(self.created_at.as_ref())),
    ];
    for item in &self.items {
      lines.push((
        "Item",
        format!(
          "{} x {} @ {}",
          item.quantity,
          item.variant_id.as_deref().unwrap_or(&item.id),
          format_money(item.price)
        ),
      ));
    }
    lines
  }

  fn quick_update(&self) -> Option<(&'static str, OrderPayload)> {
    self.can_ship().then(|| {
      (
        "ship",
        OrderPayload {
          status: "shipped".to_string(),
        },
      )
    })
  }
}

impl ListRow for Category {
  const COLUMNS: &'static [Column] = &[("NAME", 24), ("PRODUCTS", 10), ("STATUS", 10)];

  fn cells(&self) -> Vec<Cell> {
    vec![
      plain(&self.name),
      plain(self.product_count.to_string()),
      status_cell(self.status.as_deref()),
    ]
  }

  fn title(&self) -> String {
    self.name.clone()
  }

  fn detail(&self) -> Vec<(&'static str, String)> {
    vec![
      ("Name", self.name.clone()),
      ("Products", self.product_count.to_string()),
      ("Status", optional(self.status.as_deref())),
    ]
  }
}
