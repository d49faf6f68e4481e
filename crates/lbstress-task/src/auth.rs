use std::fmt;

use lbstress_client::{ApiRequest, IdentityClient};
use lbstress_config::IdentityConfig;
use serde_json::json;
use tracing::{error, info};

use crate::error::TaskError;

const TOKEN_PATH: &str = "v3/auth/tokens";
const SUBJECT_TOKEN_HEADER: &str = "x-subject-token";

/// Password credentials scoped to a project.
#[derive(Clone)]
pub struct Credentials {
  pub username: String,
  pub password: String,
  pub project_name: String,
  /// Used for both the user and the project domain.
  pub domain: String,
}

impl From<&IdentityConfig> for Credentials {
  fn from(config: &IdentityConfig) -> Self {
    Self {
      username: config.username.clone(),
      password: config.password.clone(),
      project_name: config.project_name.clone(),
      domain: config.project_domain_name.clone(),
    }
  }
}

impl fmt::Debug for Credentials {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Credentials")
      .field("username", &self.username)
      .field("password", &"<redacted>")
      .field("project_name", &self.project_name)
      .field("domain", &self.domain)
      .finish()
  }
}

impl Credentials {
  fn request_body(&self) -> serde_json::Value {
    json!({
      "auth": {
        "identity": {
          "methods": ["password"],
          "password": {
            "user": {
              "name": self.username,
              "domain": { "name": self.domain },
              "password": self.password,
            }
          }
        },
        "scope": {
          "project": {
            "name": self.project_name,
            "domain": { "name": self.domain },
          }
        }
      }
    })
  }
}

/// Request a project-scoped token. The token is read from the
/// `X-Subject-Token` response header. Not retried.
pub async fn authenticate<I: IdentityClient + ?Sized>(
  client: &I,
  credentials: &Credentials,
) -> Result<String, TaskError> {
  let request = ApiRequest::post(TOKEN_PATH, credentials.request_body());
  let url = client.url(TOKEN_PATH);

  let response = client.request(&request).await.map_err(|e| TaskError::Auth {
    message: format!("POST {url}: {e}"),
  })?;

  if !response.is_success() {
    error!(url = %url, status = response.status, body = %response.body, "authentication_failed");
    return Err(TaskError::Auth {
      message: format!("POST {url} returned {}", response.status),
    });
  }

  let token = response
    .header(SUBJECT_TOKEN_HEADER)
    .filter(|token| !token.is_empty())
    .ok_or_else(|| TaskError::Auth {
      message: format!("POST {url} returned no X-Subject-Token header"),
    })?;

  info!(url = %url, user = %credentials.username, "token_issued");
  Ok(token.to_string())
}
