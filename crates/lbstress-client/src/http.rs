use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use tracing::debug;
use url::Url;

use crate::client::{ApiClient, ApiRequest, ApiResponse, IdentityClient};
use crate::error::ClientError;

pub const USER_AGENT: &str = "Stress_Octavia_API";

const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// reqwest-backed client bound to one base URL.
///
/// Implements both [`ApiClient`] and [`IdentityClient`]; build one per service.
#[derive(Debug, Clone)]
pub struct HttpClient {
  client: Client,
  base_url: Url,
}

impl HttpClient {
  pub fn new(base_url: &str) -> Result<Self, ClientError> {
    let client = Client::builder().user_agent(USER_AGENT).build()?;
    Self::with_client(client, base_url)
  }

  /// Use an existing reqwest client, sharing its connection pool.
  pub fn with_client(client: Client, base_url: &str) -> Result<Self, ClientError> {
    // A trailing slash keeps `join` from replacing the last path segment.
    let normalized = format!("{}/", base_url.trim_end_matches('/'));
    let base_url = Url::parse(&normalized).map_err(|source| ClientError::InvalidUrl {
      url: base_url.to_string(),
      source,
    })?;
    Ok(Self { client, base_url })
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  fn resolve(&self, path: &str) -> Result<Url, ClientError> {
    self
      .base_url
      .join(path.trim_start_matches('/'))
      .map_err(|source| ClientError::InvalidUrl {
        url: path.to_string(),
        source,
      })
  }

  async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
    let url = self.resolve(&request.path)?;

    let mut builder = self
      .client
      .request(request.method.clone(), url.clone())
      .header(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    if let Some(token) = &request.token {
      builder = builder.header(AUTH_TOKEN_HEADER, token);
    }
    if !request.query.is_empty() {
      builder = builder.query(&request.query);
    }
    if let Some(body) = &request.body {
      debug!(method = %request.method, url = %url, body = %body, "request_body");
      builder = builder.json(body);
    }

    let response = builder.send().await?;

    let status = response.status().as_u16();
    let headers: HashMap<String, String> = response
      .headers()
      .iter()
      .filter_map(|(k, v)| {
        v.to_str()
          .ok()
          .map(|val| (k.as_str().to_ascii_lowercase(), val.to_string()))
      })
      .collect();
    let body = response.text().await?;

    debug!(
      method = %request.method,
      url = %url,
      status = status,
      body = %body,
      "response_received"
    );

    Ok(ApiResponse {
      status,
      headers,
      body,
    })
  }

  fn join_display(&self, path: &str) -> String {
    self
      .resolve(path)
      .map(String::from)
      .unwrap_or_else(|_| format!("{}{}", self.base_url, path.trim_start_matches('/')))
  }
}

#[async_trait]
impl ApiClient for HttpClient {
  async fn request(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
    self.send(request).await
  }

  fn url(&self, path: &str) -> String {
    self.join_display(path)
  }
}

#[async_trait]
impl IdentityClient for HttpClient {
  async fn request(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
    self.send(request).await
  }

  fn url(&self, path: &str) -> String {
    self.join_display(path)
  }
}
