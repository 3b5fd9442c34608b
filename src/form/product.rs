use super::model::{FieldKind, FieldSpec, FormMode, FormModel};
use super::validate::{
  format_number, is_blank, parse_optional_integer, parse_optional_number, NumberError,
  ValidationErrors,
};
use crate::api::types::{Dimensions, Product, ProductPayload};

pub const CATEGORIES: &[&str] = &[
  "Electronics",
  "Clothing",
  "Education",
  "Home & Garden",
  "Sports",
];
pub const PRODUCT_TYPES: &[&str] = &["Physical Product", "Digital Product", "Service"];
const FLAG: &[&str] = &["false", "true"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductForm {
  pub name: String,
  pub sku: String,
  pub description: String,
  pub category: String,
  pub product_type: String,
  pub price: String,
  pub compare_price: String,
  pub cost_price: String,
  pub stock: String,
  pub weight: String,
  pub length: String,
  pub width: String,
  pub height: String,
  pub seo_title: String,
  pub seo_description: String,
  pub is_published: bool,
  pub is_featured: bool,
}

/// An optional amount that must be greater than zero when present.
fn positive(
  errors: &mut ValidationErrors,
  field: &'static str,
  value: &str,
  label: &str,
) -> Option<f64> {
  match parse_optional_number(value) {
    Ok(Some(n)) if n > 0.0 => Some(n),
    Ok(Some(_)) => {
      errors.add(field, format!("{} must be positive", label));
      None
    }
    Ok(None) => None,
    Err(_) => {
      errors.add(field, format!("{} must be a number", label));
      None
    }
  }
}

impl FormModel for ProductForm {
  type Record = Product;

  fn blank() -> Self {
    Self {
      name: String::new(),
      sku: String::new(),
      description: String::new(),
      category: String::new(),
      product_type: String::new(),
      price: String::new(),
      compare_price: String::new(),
      cost_price: String::new(),
      stock: String::new(),
      weight: String::new(),
      length: String::new(),
      width: String::new(),
      height: String::new(),
      seo_title: String::new(),
      seo_description: String::new(),
      is_published: false,
      is_featured: false,
    }
  }

  fn from_record(product: &Product) -> Self {
    Self {
      name: product.name.clone(),
      sku: product.sku.clone(),
      description: product.description.clone(),
      category: product.category.clone(),
      product_type: product.product_type.clone(),
      price: format_number(Some(product.price)),
      compare_price: format_number(product.compare_price),
      cost_price: format_number(product.cost_price),
      stock: product.stock.map(|s| s.to_string()).unwrap_or_default(),
      weight: format_number(product.weight),
      length: format_number(product.dimensions.length),
      width: format_number(product.dimensions.width),
      height: format_number(product.dimensions.height),
      seo_title: product.seo_title.clone(),
      seo_description: product.seo_description.clone(),
      is_published: product.is_published,
      is_featured: product.is_featured,
    }
  }

  fn fields(_mode: &FormMode) -> Vec<FieldSpec> {
    vec![
      FieldSpec::new("name", "Name", FieldKind::Text).required(),
      FieldSpec::new("sku", "SKU", FieldKind::Text).required(),
      FieldSpec::new("description", "Description", FieldKind::Text).required(),
      FieldSpec::new("category", "Category", FieldKind::Choice(CATEGORIES)).required(),
      FieldSpec::new("type", "Type", FieldKind::Choice(PRODUCT_TYPES)).required(),
      FieldSpec::new("price", "Price", FieldKind::Number).required(),
      FieldSpec::new("compare_price", "Compare price", FieldKind::Number),
      FieldSpec::new("cost_price", "Cost price", FieldKind::Number),
      FieldSpec::new("stock", "Stock", FieldKind::Number),
      FieldSpec::new("weight", "Weight", FieldKind::Number),
      FieldSpec::new("length", "Length", FieldKind::Number),
      FieldSpec::new("width", "Width", FieldKind::Number),
      FieldSpec::new("height", "Height", FieldKind::Number),
      FieldSpec::new("seo_title", "SEO title", FieldKind::Text),
      FieldSpec::new("seo_description", "SEO description", FieldKind::Text),
      FieldSpec::new("is_published", "Published", FieldKind::Flag),
      FieldSpec::new("is_featured", "Featured", FieldKind::Flag),
    ]
  }

  fn get(&self, field: &str) -> String {
    match field {
      "name" => self.name.clone(),
      "sku" => self.sku.clone(),
      "description" => self.description.clone(),
      "category" => self.category.clone(),
      "type" => self.product_type.clone(),
      "price" => self.price.clone(),
      "compare_price" => self.compare_price.clone(),
      "cost_price" => self.cost_price.clone(),
      "stock" => self.stock.clone(),
      "weight" => self.weight.clone(),
      "length" => self.length.clone(),
      "width" => self.width.clone(),
      "height" => self.height.clone(),
      "seo_title" => self.seo_title.clone(),
      "seo_description" => self.seo_description.clone(),
      "is_published" => self.is_published.to_string(),
      "is_featured" => self.is_featured.to_string(),
      _ => String::new(),
    }
  }

  fn set(&mut self, field: &str, value: &str) {
    let slot = match field {
      "is_published" => {
        self.is_published = value == FLAG[1];
        return;
      }
      "is_featured" => {
        self.is_featured = value == FLAG[1];
        return;
      }
      "name" => &mut self.name,
      "sku" => &mut self.sku,
      "description" => &mut self.description,
      "category" => &mut self.category,
      "type" => &mut self.product_type,
      "price" => &mut self.price,
      "compare_price" => &mut self.compare_price,
      "cost_price" => &mut self.cost_price,
      "stock" => &mut self.stock,
      "weight" => &mut self.weight,
      "length" => &mut self.length,
      "width" => &mut self.width,
      "height" => &mut self.height,
      "seo_title" => &mut self.seo_title,
      "seo_description" => &mut self.seo_description,
      _ => return,
    };
    *slot = value.to_string();
  }

  fn payload(&self, _mode: &FormMode) -> Result<ProductPayload, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let required = [
      ("name", &self.name, "Product name is required"),
      ("sku", &self.sku, "SKU is required"),
      ("description", &self.description, "Description is required"),
      ("category", &self.category, "Category is required"),
      ("type", &self.product_type, "Product type is required"),
    ];
    for (field, value, message) in required {
      if is_blank(value) {
        errors.add(field, message);
      }
    }

    let price = match parse_optional_number(&self.price) {
      Ok(None) => {
        errors.add("price", "Price is required");
        None
      }
      Ok(Some(n)) if n <= 0.0 => {
        errors.add("price", "Price must be positive");
        None
      }
      Ok(price) => price,
      Err(_) => {
        errors.add("price", "Price must be a number");
        None
      }
    };
    let compare_price = positive(&mut errors, "compare_price", &self.compare_price, "Compare price");
    let cost_price = positive(&mut errors, "cost_price", &self.cost_price, "Cost price");

    let stock = match parse_optional_integer(&self.stock) {
      Ok(Some(n)) if n < 0 => {
        errors.add("stock", "Stock cannot be negative");
        None
      }
      Ok(Some(n)) => match u32::try_from(n) {
        Ok(n) => Some(n),
        Err(_) => {
          errors.add("stock", "Stock is too large");
          None
        }
      },
      Ok(None) => None,
      Err(NumberError::NotWhole) => {
        errors.add("stock", "Stock must be a whole number");
        None
      }
      Err(NumberError::NotANumber) => {
        errors.add("stock", "Stock must be a number");
        None
      }
    };

    let weight = positive(&mut errors, "weight", &self.weight, "Weight");
    let dimensions = Dimensions {
      length: positive(&mut errors, "length", &self.length, "Length"),
      width: positive(&mut errors, "width", &self.width, "Width"),
      height: positive(&mut errors, "height", &self.height, "Height"),
    };

    errors.into_result()?;
    Ok(ProductPayload {
      name: self.name.trim().to_string(),
      sku: self.sku.trim().to_string(),
      description: self.description.trim().to_string(),
      category: self.category.trim().to_string(),
      product_type: self.product_type.trim().to_string(),
      price: price.unwrap_or_default(),
      compare_price,
      cost_price,
      stock,
      weight,
      dimensions,
      seo_title: self.seo_title.trim().to_string(),
      seo_description: self.seo_description.trim().to_string(),
      is_published: self.is_published,
      is_featured: self.is_featured,
    })
  }
}
