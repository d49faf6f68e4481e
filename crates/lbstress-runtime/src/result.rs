//! Execution result types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
  /// Unique run ID.
  pub run_id: String,
  pub tasks_executed: usize,
  pub slots_written: usize,
  pub elapsed: Duration,
}
