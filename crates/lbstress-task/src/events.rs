//! Execution events and notifiers for observability.
//!
//! Events are emitted while a plan runs so consumers can report progress,
//! collect statistics or assert on ordering in tests. Notifiers have no
//! influence on execution.

use lbstress_workflow::NodeKind;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Events emitted during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutionEvent {
  /// A run has started.
  RunStarted {
    run_id: String,
    root: String,
    tasks: usize,
  },

  /// A task body acquired a worker and is about to execute.
  NodeStarted {
    run_id: String,
    node: String,
    path: String,
  },

  /// A task completed and its slot, if any, was written.
  NodeSucceeded {
    run_id: String,
    node: String,
    path: String,
    /// Produced resource id. Tokens are never reported.
    output: Option<String>,
  },

  /// A task failed.
  NodeFailed {
    run_id: String,
    node: String,
    path: String,
    error: String,
  },

  /// A sequential or parallel group began dispatching its children.
  GroupStarted {
    run_id: String,
    node: String,
    path: String,
    kind: NodeKind,
  },

  /// Every child of a group succeeded.
  GroupSucceeded {
    run_id: String,
    node: String,
    path: String,
  },

  /// A group stopped early because the run aborted.
  GroupFailed {
    run_id: String,
    node: String,
    path: String,
    error: String,
  },

  /// One HTTP round trip made by an API task.
  RequestAttempted {
    run_id: String,
    node: String,
    method: String,
    url: String,
    status: u16,
    attempt: u32,
  },

  /// An API task got a 2xx response.
  RequestSucceeded {
    run_id: String,
    node: String,
    method: String,
    url: String,
    status: u16,
    retries: u32,
  },

  /// A polled load balancer reached ACTIVE.
  ResourceActive {
    run_id: String,
    node: String,
    resource_id: String,
    attempts: u32,
    elapsed_ms: u64,
  },

  /// Every task completed.
  RunCompleted {
    run_id: String,
    tasks_executed: usize,
    elapsed_ms: u64,
  },

  /// The run stopped on a failure or cancellation.
  RunFailed { run_id: String, error: String },
}

/// Trait for receiving execution events.
///
/// The runtime and tasks call `notify` for each event. Implementations decide
/// what to do with them (log, collect, forward, ignore).
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ExecutionEvent);
}

/// A no-op notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// A notifier that sends events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}

/// Renders per-node progress as log lines.
///
/// Run lifecycle, retry summaries and poll results are already logged where
/// they happen, so only node and request-attempt events are rendered here.
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

impl ExecutionNotifier for TracingNotifier {
  fn notify(&self, event: ExecutionEvent) {
    match event {
      ExecutionEvent::NodeStarted { run_id, node, path } => {
        debug!(run_id = %run_id, node = %node, path = %path, "task_started");
      }
      ExecutionEvent::NodeSucceeded {
        run_id,
        node,
        output,
        ..
      } => match output {
        Some(output) => info!(run_id = %run_id, node = %node, output = %output, "task_completed"),
        None => info!(run_id = %run_id, node = %node, "task_completed"),
      },
      ExecutionEvent::NodeFailed {
        run_id,
        node,
        path,
        error,
      } => {
        error!(run_id = %run_id, node = %node, path = %path, error = %error, "task_failed");
      }
      ExecutionEvent::GroupStarted {
        run_id,
        node,
        path,
        kind,
      } => {
        debug!(run_id = %run_id, node = %node, path = %path, kind = ?kind, "group_started");
      }
      ExecutionEvent::GroupSucceeded { run_id, node, path } => {
        debug!(run_id = %run_id, node = %node, path = %path, "group_completed");
      }
      ExecutionEvent::GroupFailed {
        run_id,
        node,
        path,
        error,
      } => {
        debug!(run_id = %run_id, node = %node, path = %path, error = %error, "group_failed");
      }
      ExecutionEvent::RequestAttempted {
        run_id,
        node,
        method,
        url,
        status,
        attempt,
      } => {
        debug!(
          run_id = %run_id,
          node = %node,
          method = %method,
          url = %url,
          status = status,
          attempt = attempt,
          "request_attempted"
        );
      }
      ExecutionEvent::RunStarted { .. }
      | ExecutionEvent::RequestSucceeded { .. }
      | ExecutionEvent::ResourceActive { .. }
      | ExecutionEvent::RunCompleted { .. }
      | ExecutionEvent::RunFailed { .. } => {}
    }
  }
}
