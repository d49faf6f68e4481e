//! Runtime error types.

use lbstress_task::TaskError;
use lbstress_workflow::{SlotKey, SlotType};

/// Errors from the slot registry and slot bookkeeping.
#[derive(Debug, thiserror::Error)]
pub enum SlotError {
  #[error("slot '{key}' was already written")]
  AlreadyWritten { key: SlotKey },

  #[error("slot '{key}' has not been written")]
  NotWritten { key: SlotKey },

  #[error("slot '{key}' expects a {expected} but the task produced a {found}")]
  TypeMismatch {
    key: SlotKey,
    expected: SlotType,
    found: SlotType,
  },

  #[error("task finished without producing slot '{key}'")]
  NotProduced { key: SlotKey },
}

/// Errors that end a run.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
  /// A task body failed. This is the first failure of the run.
  #[error("task '{node}' ({path}) failed: {source}")]
  TaskFailed {
    node: String,
    path: String,
    #[source]
    source: TaskError,
  },

  /// Slot bookkeeping around a task failed.
  #[error("task '{node}' ({path}): {source}")]
  Slot {
    node: String,
    path: String,
    #[source]
    source: SlotError,
  },

  /// A spawned task panicked.
  #[error("node '{node}' ({path}) panicked: {message}")]
  Panicked {
    node: String,
    path: String,
    message: String,
  },

  /// The run ended without failure but not every task completed.
  #[error("run incomplete: {executed} of {expected} tasks executed")]
  Incomplete { executed: usize, expected: usize },

  /// Execution was cancelled.
  #[error("execution cancelled")]
  Cancelled,
}

impl RuntimeError {
  /// Name of the node that failed, if the error is tied to one.
  pub fn node(&self) -> Option<&str> {
    match self {
      RuntimeError::TaskFailed { node, .. }
      | RuntimeError::Slot { node, .. }
      | RuntimeError::Panicked { node, .. } => Some(node),
      _ => None,
    }
  }

  /// Path of the node that failed, if the error is tied to one.
  pub fn path(&self) -> Option<&str> {
    match self {
      RuntimeError::TaskFailed { path, .. }
      | RuntimeError::Slot { path, .. }
      | RuntimeError::Panicked { path, .. } => Some(path),
      _ => None,
    }
  }
}
