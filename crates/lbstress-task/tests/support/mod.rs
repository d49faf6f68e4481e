#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use lbstress_client::{ApiClient, ApiRequest, ApiResponse, ClientError, IdentityClient};
use lbstress_task::{ExecutionEvent, ExecutionNotifier};
use serde_json::json;

/// Replays a fixed list of responses and records every request.
#[derive(Default)]
pub struct ScriptedClient {
  responses: Mutex<VecDeque<ApiResponse>>,
  requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedClient {
  pub fn new(responses: impl IntoIterator<Item = ApiResponse>) -> Self {
    Self {
      responses: Mutex::new(responses.into_iter().collect()),
      requests: Mutex::new(Vec::new()),
    }
  }

  pub fn requests(&self) -> Vec<ApiRequest> {
    self.requests.lock().unwrap().clone()
  }

  fn next(&self, request: &ApiRequest) -> ApiResponse {
    self.requests.lock().unwrap().push(request.clone());
    self
      .responses
      .lock()
      .unwrap()
      .pop_front()
      .unwrap_or_else(|| ApiResponse::new(599, "script exhausted"))
  }
}

#[async_trait]
impl ApiClient for ScriptedClient {
  async fn request(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
    Ok(self.next(request))
  }

  fn url(&self, path: &str) -> String {
    format!("http://stub/{path}")
  }
}

#[async_trait]
impl IdentityClient for ScriptedClient {
  async fn request(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
    Ok(self.next(request))
  }

  fn url(&self, path: &str) -> String {
    format!("http://identity/{path}")
  }
}

/// Collects events for assertions.
#[derive(Default)]
pub struct RecordingNotifier {
  events: Mutex<Vec<ExecutionEvent>>,
}

impl RecordingNotifier {
  pub fn events(&self) -> Vec<ExecutionEvent> {
    self.events.lock().unwrap().clone()
  }
}

impl ExecutionNotifier for RecordingNotifier {
  fn notify(&self, event: ExecutionEvent) {
    self.events.lock().unwrap().push(event);
  }
}

pub fn status(code: u16) -> ApiResponse {
  ApiResponse::new(code, "")
}

pub fn created(key: &str, id: &str) -> ApiResponse {
  ApiResponse::new(201, json!({ key: { "id": id } }).to_string())
}

pub fn lb_status(provisioning_status: &str) -> ApiResponse {
  ApiResponse::new(
    200,
    json!({ "loadbalancer": { "id": "lb-1", "provisioning_status": provisioning_status } })
      .to_string(),
  )
}
