use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::events::{ExecutionEvent, ExecutionNotifier};

/// Where a task body is running and who is listening.
#[derive(Clone, Copy)]
pub struct TaskContext<'a> {
  pub run_id: &'a str,
  pub node: &'a str,
  pub notifier: &'a dyn ExecutionNotifier,
  pub cancel: &'a CancellationToken,
}

impl<'a> TaskContext<'a> {
  pub fn new(
    run_id: &'a str,
    node: &'a str,
    notifier: &'a dyn ExecutionNotifier,
    cancel: &'a CancellationToken,
  ) -> Self {
    Self {
      run_id,
      node,
      notifier,
      cancel,
    }
  }

  pub fn notify(&self, event: ExecutionEvent) {
    self.notifier.notify(event);
  }

  /// Wait before the next attempt. Returns early with `Cancelled` on abort.
  pub async fn pause(&self, delay: Duration) -> Result<(), TaskError> {
    if self.cancel.is_cancelled() {
      return Err(TaskError::Cancelled);
    }
    if delay.is_zero() {
      return Ok(());
    }
    tokio::select! {
      _ = tokio::time::sleep(delay) => Ok(()),
      _ = self.cancel.cancelled() => Err(TaskError::Cancelled),
    }
  }
}
