use lbstress_client::ClientError;
use thiserror::Error;

/// Errors that can occur during task execution.
#[derive(Debug, Error)]
pub enum TaskError {
  /// The identity service did not hand out a token.
  #[error("authentication failed: {message}")]
  Auth { message: String },

  /// A non-transient failure response.
  #[error("{method} {url} failed with status {status}: {body}")]
  RemoteCall {
    method: String,
    url: String,
    status: u16,
    body: String,
  },

  /// A polled resource reported ERROR.
  #[error("resource {resource_id} went into {status}")]
  Resource { resource_id: String, status: String },

  #[error("resource {resource_id} did not become ACTIVE after {attempts} attempts")]
  PollTimeout { resource_id: String, attempts: u32 },

  /// Transient statuses persisted past the retry budget.
  #[error("{method} {url} still returned {status} after {attempts} attempts")]
  RetriesExhausted {
    method: String,
    url: String,
    status: u16,
    attempts: u32,
  },

  #[error("missing required input: {field}")]
  MissingInput { field: String },

  #[error("invalid input '{field}': {message}")]
  InvalidInput { field: String, message: String },

  #[error("invalid response from {url}: {message}")]
  InvalidResponse { url: String, message: String },

  #[error("transport error: {0}")]
  Transport(#[from] ClientError),

  /// The run was aborted while this task was waiting to retry or poll.
  #[error("task cancelled")]
  Cancelled,
}
