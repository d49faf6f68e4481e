use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Method;

use crate::error::ClientError;

/// A request relative to a client's base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
  pub method: Method,
  /// Path relative to the base URL, e.g. `v2.0/lbaas/loadbalancers`.
  pub path: String,
  /// Sent as `X-Auth-Token` when present.
  pub token: Option<String>,
  pub body: Option<serde_json::Value>,
  pub query: Vec<(String, String)>,
}

impl ApiRequest {
  pub fn new(method: Method, path: impl Into<String>) -> Self {
    Self {
      method,
      path: path.into(),
      token: None,
      body: None,
      query: Vec::new(),
    }
  }

  pub fn get(path: impl Into<String>) -> Self {
    Self::new(Method::GET, path)
  }

  pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
    Self::new(Method::POST, path).with_body(body)
  }

  pub fn with_token(mut self, token: impl Into<String>) -> Self {
    self.token = Some(token.into());
    self
  }

  pub fn with_body(mut self, body: serde_json::Value) -> Self {
    self.body = Some(body);
    self
  }

  pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.query.push((key.into(), value.into()));
    self
  }
}

/// A response as received, whatever its status.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
  pub status: u16,
  /// Header names are lowercased.
  pub headers: HashMap<String, String>,
  pub body: String,
}

impl ApiResponse {
  pub fn new(status: u16, body: impl Into<String>) -> Self {
    Self {
      status,
      headers: HashMap::new(),
      body: body.into(),
    }
  }

  pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
    self.headers.insert(name.to_ascii_lowercase(), value.into());
    self
  }

  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// Case-insensitive header lookup.
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .get(&name.to_ascii_lowercase())
      .map(String::as_str)
  }

  pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
    serde_json::from_str(&self.body)
  }
}

/// Client for the provisioning API.
#[async_trait]
pub trait ApiClient: Send + Sync {
  /// Perform one round trip. Non-2xx statuses are returned, not raised.
  async fn request(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError>;

  /// Absolute URL for a relative path, used in logs and errors.
  fn url(&self, path: &str) -> String;
}

/// Client for the identity service.
#[async_trait]
pub trait IdentityClient: Send + Sync {
  async fn request(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError>;

  fn url(&self, path: &str) -> String;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_header_lookup_is_case_insensitive() {
    let response = ApiResponse::new(201, "").with_header("X-Subject-Token", "abc");

    assert_eq!(response.header("x-subject-token"), Some("abc"));
    assert_eq!(response.header("X-SUBJECT-TOKEN"), Some("abc"));
    assert!(response.is_success());
  }

  #[test]
  fn test_status_ranges() {
    assert!(ApiResponse::new(200, "").is_success());
    assert!(ApiResponse::new(299, "").is_success());
    assert!(!ApiResponse::new(199, "").is_success());
    assert!(!ApiResponse::new(300, "").is_success());
    assert!(!ApiResponse::new(503, "").is_success());
  }
}
