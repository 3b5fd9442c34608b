//! Field-level validation results and the small rules forms share.

use chrono::NaiveDate;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Validation failures keyed by field, in the order fields were checked.
/// Each field keeps only its first failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
  errors: Vec<(&'static str, String)>,
}

impl ValidationErrors {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record a failure for `field` unless it already has one.
  pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
    if !self.contains(field) {
      self.errors.push((field, message.into()));
    }
  }

  pub fn get(&self, field: &str) -> Option<&str> {
    self
      .errors
      .iter()
      .find(|(name, _)| *name == field)
      .map(|(_, message)| message.as_str())
  }

  pub fn contains(&self, field: &str) -> bool {
    self.errors.iter().any(|(name, _)| *name == field)
  }

  pub fn remove(&mut self, field: &str) {
    self.errors.retain(|(name, _)| *name != field);
  }

  pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
    self.errors.iter().map(|(name, _)| *name)
  }

  pub fn is_empty(&self) -> bool {
    self.errors.is_empty()
  }

  pub fn len(&self) -> usize {
    self.errors.len()
  }

  pub fn into_result(self) -> Result<(), Self> {
    if self.is_empty() {
      Ok(())
    } else {
      Err(self)
    }
  }
}

impl fmt::Display for ValidationErrors {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, (field, message)) in self.errors.iter().enumerate() {
      if i > 0 {
        f.write_str("; ")?;
      }
      write!(f, "{}: {}", field, message)?;
    }
    Ok(())
  }
}

impl std::error::Error for ValidationErrors {}

pub fn is_blank(value: &str) -> bool {
  value.trim().is_empty()
}

pub fn is_valid_email(value: &str) -> bool {
  static EMAIL: OnceLock<Regex> = OnceLock::new();
  EMAIL
    .get_or_init(|| {
      Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
    })
    .is_match(value.trim())
}

/// At least one lowercase letter, one uppercase letter and one digit
pub fn has_mixed_case_and_digit(value: &str) -> bool {
  value.chars().any(|c| c.is_lowercase())
    && value.chars().any(|c| c.is_uppercase())
    && value.chars().any(|c| c.is_ascii_digit())
}

/// Why a numeric field failed to parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberError {
  NotANumber,
  NotWhole,
}

/// Empty means "no value"; anything else must parse as a finite number.
pub fn parse_optional_number(value: &str) -> Result<Option<f64>, NumberError> {
  let value = value.trim();
  if value.is_empty() {
    return Ok(None);
  }
  match value.parse::<f64>() {
    Ok(n) if n.is_finite() => Ok(Some(n)),
    _ => Err(NumberError::NotANumber),
  }
}

/// Like [`parse_optional_number`], but the number must be whole.
pub fn parse_optional_integer(value: &str) -> Result<Option<i64>, NumberError> {
  match parse_optional_number(value)? {
    None => Ok(None),
    Some(n) if n.fract() == 0.0 => Ok(Some(n as i64)),
    Some(_) => Err(NumberError::NotWhole),
  }
}

/// `YYYY-MM-DD`; empty means "no value".
pub fn parse_optional_date(value: &str) -> Result<Option<NaiveDate>, chrono::ParseError> {
  let value = value.trim();
  if value.is_empty() {
    return Ok(None);
  }
  NaiveDate::parse_from_str(value, "%Y-%m-%d").map(Some)
}

/// Render an optional number back into a text field.
pub fn format_number(value: Option<f64>) -> String {
  value.map(|n| n.to_string()).unwrap_or_default()
}
