//! Interpretation of the `{ success, data | message }` envelope every
//! backend response is wrapped in.
//!
//! Anything other than `success: true` on a 2xx response is a failure, and
//! `message` (when present) is the text shown to the user.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::error::ApiError;
use super::types::{Page, PaginationInfo, Resource};

/// Open the envelope and return its fields, or classify the failure.
///
/// `fallback` is the message used when a rejection carries none.
fn open(status: StatusCode, body: &[u8], fallback: &str) -> Result<Map<String, Value>, ApiError> {
  let ok_status = status.is_success();

  let rejected_without_body = || {
    let reason = status.canonical_reason().unwrap_or(fallback);
    ApiError::rejected(Some(status.as_u16()), format!("{} ({})", fallback, reason))
  };

  let value: Value = match serde_json::from_slice(body) {
    Ok(v) => v,
    Err(e) if ok_status => return Err(ApiError::shape(format!("body is not JSON: {}", e))),
    Err(_) => return Err(rejected_without_body()),
  };

  let fields = match value {
    Value::Object(fields) => fields,
    _ if ok_status => return Err(ApiError::shape("body is not a JSON object")),
    _ => return Err(rejected_without_body()),
  };

  let succeeded = fields.get("success").and_then(Value::as_bool) == Some(true);
  if !ok_status || !succeeded {
    let message = fields
      .get("message")
      .and_then(Value::as_str)
      .filter(|m| !m.trim().is_empty())
      .unwrap_or(fallback);
    let status = if ok_status { None } else { Some(status.as_u16()) };
    return Err(ApiError::rejected(status, message));
  }

  Ok(fields)
}

/// Decode `data` from a successful envelope.
pub fn parse_data<T: DeserializeOwned>(
  status: StatusCode,
  body: &[u8],
  fallback: &str,
) -> Result<T, ApiError> {
  let mut fields = open(status, body, fallback)?;
  let data = fields
    .remove("data")
    .ok_or_else(|| ApiError::shape("missing `data` field"))?;
  serde_json::from_value(data).map_err(|e| ApiError::shape(format!("malformed `data`: {}", e)))
}

/// Accept a successful envelope whose payload we don't need (deletes).
pub fn parse_ack(status: StatusCode, body: &[u8], fallback: &str) -> Result<(), ApiError> {
  open(status, body, fallback).map(|_| ())
}

/// Decode a list response: `data.{LIST_FIELD}` rows plus `data.pagination`.
pub fn parse_page<R: Resource>(
  status: StatusCode,
  body: &[u8],
  fallback: &str,
) -> Result<Page<R>, ApiError> {
  let mut data: Map<String, Value> = parse_data(status, body, fallback)?;

  let rows = data
    .remove(R::LIST_FIELD)
    .ok_or_else(|| ApiError::shape(format!("missing `data.{}` field", R::LIST_FIELD)))?;
  let items: Vec<R> = serde_json::from_value(rows)
    .map_err(|e| ApiError::shape(format!("malformed `data.{}`: {}", R::LIST_FIELD, e)))?;

  let pagination = data
    .remove("pagination")
    .ok_or_else(|| ApiError::shape("missing `data.pagination` field"))?;
  let pagination: PaginationInfo = serde_json::from_value(pagination)
    .map_err(|e| ApiError::shape(format!("malformed `data.pagination`: {}", e)))?;

  Ok(Page {
    items,
    total: pagination.total,
    total_pages: pagination.total_pages,
  })
}
