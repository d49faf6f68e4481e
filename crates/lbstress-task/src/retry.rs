use std::time::Duration;

use lbstress_config::RetryConfig;

const MAX_EXPONENT: u32 = 1023;

/// Backoff schedule for transient responses.
///
/// The delay before retry `n` (0-based) is `min(initial * multiplier^n, max)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
  /// Total attempts including the first. `None` retries forever.
  pub max_attempts: Option<u32>,
  pub initial_backoff: Duration,
  pub max_backoff: Duration,
  pub multiplier: f64,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self::from(&RetryConfig::default())
  }
}

impl From<&RetryConfig> for RetryPolicy {
  fn from(config: &RetryConfig) -> Self {
    Self {
      max_attempts: config.attempt_limit(),
      initial_backoff: Duration::from_millis(config.initial_backoff_ms),
      max_backoff: Duration::from_millis(config.max_backoff_ms),
      multiplier: config.multiplier,
    }
  }
}

impl RetryPolicy {
  /// Retry forever with no delay between attempts.
  pub fn unbounded() -> Self {
    Self {
      max_attempts: None,
      initial_backoff: Duration::ZERO,
      max_backoff: Duration::ZERO,
      multiplier: 1.0,
    }
  }

  /// Same attempt budget, no delays.
  pub fn immediate(max_attempts: u32) -> Self {
    Self {
      max_attempts: Some(max_attempts),
      ..Self::unbounded()
    }
  }

  /// Whether another attempt may follow `attempts` failed ones.
  pub fn allows_retry(&self, attempts: u32) -> bool {
    self.max_attempts.is_none_or(|max| attempts < max)
  }

  /// Delay before retry `retry` (0-indexed).
  pub fn delay(&self, retry: u32) -> Duration {
    if self.initial_backoff.is_zero() || self.max_backoff.is_zero() {
      return Duration::ZERO;
    }

    // Any multiplier above 1 has long passed the cap by this exponent.
    let exponent = retry.min(MAX_EXPONENT) as i32;
    let base = self.initial_backoff.as_millis() as f64 * self.multiplier.powi(exponent);
    let capped = base.min(self.max_backoff.as_millis() as f64);
    Duration::from_millis(capped as u64)
  }
}
