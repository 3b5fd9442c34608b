use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{RequestBuilder, StatusCode};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

use super::envelope::{parse_ack, parse_data, parse_page};
use super::error::ApiError;
use super::types::{ListParams, Page, Resource};
use crate::config::Config;

/// CRUD operations against one backend collection.
///
/// Implemented over HTTP by [`ApiClient`]; controllers only see this trait.
#[async_trait]
pub trait ResourceService<R: Resource>: Send + Sync {
  /// `GET /{resource}?page=&limit=&search=`
  async fn list(&self, params: &ListParams) -> Result<Page<R>, ApiError>;

  /// `GET /{resource}/{id}`
  async fn get(&self, id: &str) -> Result<R, ApiError>;

  /// `POST /{resource}`
  async fn create(&self, payload: &R::Payload) -> Result<R, ApiError>;

  /// `PUT /{resource}/{id}`
  async fn update(&self, id: &str, payload: &R::Payload) -> Result<R, ApiError>;

  /// `DELETE /{resource}/{id}`
  async fn delete(&self, id: &str) -> Result<(), ApiError>;
}

/// HTTP client for the admin REST backend
#[derive(Debug, Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base: Url,
}

impl ApiClient {
  pub fn new(base_url: &str, timeout: Duration, token: Option<&str>) -> Result<Self> {
    let base =
      Url::parse(base_url).map_err(|e| eyre!("Invalid API base URL {}: {}", base_url, e))?;
    if base.cannot_be_a_base() {
      return Err(eyre!("Invalid API base URL {}: not a base URL", base_url));
    }

    let mut headers = HeaderMap::new();
    if let Some(token) = token {
      let value = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|e| eyre!("Invalid API token: {}", e))?;
      headers.insert(AUTHORIZATION, value);
    }

    let http = reqwest::Client::builder()
      .user_agent(concat!("shopdesk/", env!("CARGO_PKG_VERSION")))
      .timeout(timeout)
      .default_headers(headers)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, base })
  }

  pub fn from_config(config: &Config) -> Result<Self> {
    let token = Config::get_api_token();
    Self::new(
      &config.api.base_url,
      Duration::from_secs(config.api.timeout_secs),
      token.as_deref(),
    )
  }

  /// Base URL with `segments` appended as path segments.
  fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
    let mut url = self.base.clone();
    url
      .path_segments_mut()
      .map_err(|_| ApiError::Transport(format!("cannot build URL from {}", self.base)))?
      .pop_if_empty()
      .extend(segments);
    Ok(url)
  }

  async fn send(&self, request: RequestBuilder) -> Result<(StatusCode, Vec<u8>), ApiError> {
    let response = request.send().await.map_err(|e| {
      warn!(error = %e, "request failed");
      ApiError::from(e)
    })?;
    let status = response.status();
    // A body cut off mid-stream means the connection dropped
    let body = response
      .bytes()
      .await
      .map_err(|e| ApiError::Transport(e.to_string()))?
      .to_vec();
    debug!(%status, bytes = body.len(), "response");
    Ok((status, body))
  }
}

#[async_trait]
impl<R: Resource> ResourceService<R> for ApiClient {
  #[instrument(skip(self), fields(resource = R::NAME))]
  async fn list(&self, params: &ListParams) -> Result<Page<R>, ApiError> {
    let url = self.endpoint(&[R::NAME])?;
    let request = self.http.get(url).query(&params.query_pairs());
    let (status, body) = self.send(request).await?;
    parse_page(status, &body, &format!("Failed to fetch {}", R::NAME))
  }

  #[instrument(skip(self), fields(resource = R::NAME))]
  async fn get(&self, id: &str) -> Result<R, ApiError> {
    let url = self.endpoint(&[R::NAME, id])?;
    let (status, body) = self.send(self.http.get(url)).await?;
    parse_data(status, &body, &format!("Failed to fetch {}", R::LABEL))
  }

  #[instrument(skip(self, payload), fields(resource = R::NAME))]
  async fn create(&self, payload: &R::Payload) -> Result<R, ApiError> {
    let url = self.endpoint(&[R::NAME])?;
    let (status, body) = self.send(self.http.post(url).json(payload)).await?;
    parse_data(status, &body, &format!("Failed to create {}", R::LABEL))
  }

  #[instrument(skip(self, payload), fields(resource = R::NAME))]
  async fn update(&self, id: &str, payload: &R::Payload) -> Result<R, ApiError> {
    let url = self.endpoint(&[R::NAME, id])?;
    let (status, body) = self.send(self.http.put(url).json(payload)).await?;
    parse_data(status, &body, &format!("Failed to update {}", R::LABEL))
  }

  #[instrument(skip(self), fields(resource = R::NAME))]
  async fn delete(&self, id: &str) -> Result<(), ApiError> {
    let url = self.endpoint(&[R::NAME, id])?;
    let (status, body) = self.send(self.http.delete(url)).await?;
    parse_ack(status, &body, &format!("Failed to delete {}", R::LABEL))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::{Role, User, UserPayload};
  use serde_json::json;
  use wiremock::matchers::{body_json, method, path, query_param, query_param_is_missing};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn client(server: &MockServer) -> ApiClient {
    ApiClient::new(&format!("{}/api", server.uri()), Duration::from_secs(5), None).unwrap()
  }

  #[tokio::test]
  async fn test_list_sends_params_and_parses_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/users"))
      .and(query_param("page", "2"))
      .and(query_param("limit", "10"))
      .and(query_param("search", "jane"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "data": {
          "users": [{"id": "2", "name": "Jane Smith", "email": "jane@example.com"}],
          "pagination": {"total": 11, "totalPages": 2}
        }
      })))
      .expect(1)
      .mount(&server)
      .await;

    let params = ListParams::new(2, 10).with_search("jane");
    let page: Page<User> = client(&server).list(&params).await.unwrap();
    assert_eq!(page.items[0].name, "Jane Smith");
    assert_eq!(page.total_pages, 2);
  }

  #[tokio::test]
  async fn test_list_omits_empty_search() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/users"))
      .and(query_param_is_missing("search"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "data": {"users": [], "pagination": {"total": 0, "totalPages": 0}}
      })))
      .expect(1)
      .mount(&server)
      .await;

    let page: Page<User> = client(&server)
      .list(&ListParams::new(1, 10))
      .await
      .unwrap();
    assert!(page.items.is_empty());
  }

  #[tokio::test]
  async fn test_get_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/users/404"))
      .respond_with(
        ResponseTemplate::new(404).set_body_json(json!({"success": false, "message": "User not found"})),
      )
      .mount(&server)
      .await;

    let err = ResourceService::<User>::get(&client(&server), "404")
      .await
      .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "User not found");
  }

  #[tokio::test]
  async fn test_create_posts_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/api/users"))
      .and(body_json(json!({
        "name": "Jane Smith",
        "email": "jane@example.com",
        "role": "customer",
        "gender": null,
        "dob": null,
        "passwordHash": "Secret1"
      })))
      .respond_with(ResponseTemplate::new(201).set_body_json(json!({
        "success": true,
        "data": {"id": "3", "name": "Jane Smith", "email": "jane@example.com"}
      })))
      .expect(1)
      .mount(&server)
      .await;

    let payload = UserPayload {
      name: "Jane Smith".into(),
      email: "jane@example.com".into(),
      role: Role::Customer,
      gender: None,
      dob: None,
      password_hash: Some("Secret1".into()),
    };
    let user: User = client(&server).create(&payload).await.unwrap();
    assert_eq!(user.id, "3");
  }

  #[tokio::test]
  async fn test_delete_rejected_by_server() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
      .and(path("/api/users/1"))
      .respond_with(
        ResponseTemplate::new(200)
          .set_body_json(json!({"success": false, "message": "Cannot delete the last admin"})),
      )
      .mount(&server)
      .await;

    let err = ResourceService::<User>::delete(&client(&server), "1")
      .await
      .unwrap_err();
    assert_eq!(err, ApiError::rejected(None, "Cannot delete the last admin"));
  }

  #[tokio::test]
  async fn test_unreachable_server_is_transport_error() {
    let client = ApiClient::new("http://127.0.0.1:1/api", Duration::from_secs(1), None).unwrap();
    let err = ResourceService::<User>::delete(&client, "1")
      .await
      .unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
  }

  #[test]
  fn test_rejects_non_base_url() {
    assert!(ApiClient::new("mailto:admin@example.com", Duration::from_secs(1), None).is_err());
  }
}
