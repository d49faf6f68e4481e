use std::sync::Arc;

use lbstress_client::{ApiClient, ApiRequest, ApiResponse};
use tracing::{debug, error, info};

use crate::context::TaskContext;
use crate::error::TaskError;
use crate::events::ExecutionEvent;
use crate::retry::RetryPolicy;

/// 409 and 503 mean the service is busy with the parent resource.
pub fn is_transient(status: u16) -> bool {
  matches!(status, 409 | 503)
}

/// A successful round trip and how many transient responses preceded it.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCall {
  pub response: ApiResponse,
  pub retries: u32,
}

/// The id of a created resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Created {
  pub id: String,
  pub retries: u32,
}

/// Performs one logical remote call, re-sending the identical request while
/// the service answers with a transient status.
pub struct ApiTask<A: ?Sized> {
  client: Arc<A>,
  retry: RetryPolicy,
}

impl<A: ?Sized> Clone for ApiTask<A> {
  fn clone(&self) -> Self {
    Self {
      client: self.client.clone(),
      retry: self.retry.clone(),
    }
  }
}

impl<A: ApiClient + ?Sized> ApiTask<A> {
  pub fn new(client: Arc<A>, retry: RetryPolicy) -> Self {
    Self { client, retry }
  }

  pub fn client(&self) -> &A {
    &self.client
  }

  /// Send `request` until it gets a 2xx.
  ///
  /// Any status other than 2xx, 409 or 503 fails after that single attempt.
  pub async fn call(
    &self,
    ctx: &TaskContext<'_>,
    request: &ApiRequest,
  ) -> Result<ApiCall, TaskError> {
    let url = self.client.url(&request.path);
    let method = request.method.to_string();
    let mut retries = 0u32;

    loop {
      let attempt = retries + 1;
      let response = self.client.request(request).await?;

      ctx.notify(ExecutionEvent::RequestAttempted {
        run_id: ctx.run_id.to_string(),
        node: ctx.node.to_string(),
        method: method.clone(),
        url: url.clone(),
        status: response.status,
        attempt,
      });

      if response.is_success() {
        if retries > 0 {
          info!(
            node = %ctx.node,
            method = %method,
            url = %url,
            retries = retries,
            "request_retried"
          );
        }
        ctx.notify(ExecutionEvent::RequestSucceeded {
          run_id: ctx.run_id.to_string(),
          node: ctx.node.to_string(),
          method: method.clone(),
          url: url.clone(),
          status: response.status,
          retries,
        });
        return Ok(ApiCall { response, retries });
      }

      if !is_transient(response.status) {
        error!(
          node = %ctx.node,
          method = %method,
          url = %url,
          status = response.status,
          body = %response.body,
          "request_failed"
        );
        return Err(TaskError::RemoteCall {
          method,
          url,
          status: response.status,
          body: response.body,
        });
      }

      if !self.retry.allows_retry(attempt) {
        error!(
          node = %ctx.node,
          method = %method,
          url = %url,
          status = response.status,
          attempts = attempt,
          "retries_exhausted"
        );
        return Err(TaskError::RetriesExhausted {
          method,
          url,
          status: response.status,
          attempts: attempt,
        });
      }

      let delay = self.retry.delay(retries);
      debug!(
        node = %ctx.node,
        method = %method,
        url = %url,
        status = response.status,
        delay_ms = delay.as_millis() as u64,
        "request_transient"
      );
      ctx.pause(delay).await?;
      retries += 1;
    }
  }

  /// Create a resource and return `<result_key>.id` from the response body.
  pub async fn execute(
    &self,
    ctx: &TaskContext<'_>,
    request: &ApiRequest,
    result_key: &str,
  ) -> Result<Created, TaskError> {
    let call = self.call(ctx, request).await?;
    let url = self.client.url(&request.path);

    let body = call
      .response
      .json()
      .map_err(|e| TaskError::InvalidResponse {
        url: url.clone(),
        message: e.to_string(),
      })?;

    let id = body
      .get(result_key)
      .and_then(|resource| resource.get("id"))
      .and_then(|id| id.as_str())
      .ok_or_else(|| TaskError::InvalidResponse {
        url,
        message: format!("missing '{result_key}.id'"),
      })?;

    Ok(Created {
      id: id.to_string(),
      retries: call.retries,
    })
  }
}
