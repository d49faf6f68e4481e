use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration, one section per concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
  pub identity: IdentityConfig,
  #[serde(default)]
  pub engine: EngineConfig,
  pub test_params: TestParams,
  #[serde(default)]
  pub retry: RetryConfig,
}

/// Credentials and endpoint for the identity service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityConfig {
  /// Base URL of the identity service, e.g. `http://keystone:5000`.
  pub auth_url: String,
  pub username: String,
  pub password: String,
  pub project_name: String,
  pub project_domain_name: String,
}

/// Which scheduling mode the runtime uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
  /// One task body at a time, regardless of `max_workers`.
  Serial,
  /// Up to `max_workers` task bodies at once.
  #[default]
  Parallel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
  #[serde(default)]
  pub kind: EngineKind,
  #[serde(default = "default_max_workers")]
  pub max_workers: usize,
  /// Accepted for compatibility. No task defines a revert action, so this
  /// flag currently has no effect.
  #[serde(default)]
  pub disable_revert: bool,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      kind: EngineKind::default(),
      max_workers: default_max_workers(),
      disable_revert: false,
    }
  }
}

impl EngineConfig {
  /// Number of task bodies allowed to run at the same time.
  pub fn concurrency_limit(&self) -> usize {
    match self.kind {
      EngineKind::Serial => 1,
      EngineKind::Parallel => self.max_workers,
    }
  }
}

/// Parameters of the generated load: endpoints, cardinalities and the
/// constants injected into create tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestParams {
  /// Base URL of the provisioning API.
  pub api_endpoint: String,
  /// Name of the flow builder to run.
  pub test_flow: String,
  pub vip_subnet_id: String,
  pub member_subnet_id: String,
  #[serde(default = "default_one")]
  pub load_balancers: u32,
  #[serde(default = "default_one")]
  pub listeners: u32,
  #[serde(default = "default_one")]
  pub pools: u32,
  /// Health monitors per pool, either 0 or 1.
  #[serde(default = "default_one")]
  pub health_monitors: u32,
  #[serde(default = "default_one")]
  pub members: u32,
  #[serde(default = "default_member_address")]
  pub member_address: String,
  /// Poll budget when waiting for the load balancer to go ACTIVE.
  #[serde(default = "default_retries_check_active")]
  pub retries_check_active: u32,
  /// Delay between status polls. Zero polls back-to-back.
  #[serde(default)]
  pub poll_interval_ms: u64,
}

impl TestParams {
  pub fn cardinalities(&self) -> Cardinalities {
    Cardinalities {
      load_balancers: self.load_balancers,
      listeners: self.listeners,
      pools: self.pools,
      health_monitor: self.health_monitors > 0,
      members: self.members,
    }
  }
}

/// How many resources of each kind a flow creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cardinalities {
  pub load_balancers: u32,
  pub listeners: u32,
  pub pools: u32,
  pub health_monitor: bool,
  pub members: u32,
}

impl Cardinalities {
  /// Number of create tasks a full build produces.
  pub fn create_task_count(&self) -> u64 {
    let member_branch = u64::from(self.members) + u64::from(self.health_monitor);
    let pool_branch = 1 + member_branch;
    let listener_branch = 1 + u64::from(self.pools) * pool_branch;
    let lb_branch = 1 + u64::from(self.listeners) * listener_branch;
    u64::from(self.load_balancers) * lb_branch
  }
}

/// Retry policy for transient (409/503) responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
  /// Total attempts per request, including the first. `0` retries forever.
  #[serde(default = "default_max_attempts")]
  pub max_attempts: u32,
  #[serde(default = "default_initial_backoff_ms")]
  pub initial_backoff_ms: u64,
  #[serde(default = "default_max_backoff_ms")]
  pub max_backoff_ms: u64,
  #[serde(default = "default_multiplier")]
  pub multiplier: f64,
}

impl RetryConfig {
  /// Attempt budget, or `None` when retrying is unbounded.
  pub fn attempt_limit(&self) -> Option<u32> {
    (self.max_attempts > 0).then_some(self.max_attempts)
  }
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      max_attempts: default_max_attempts(),
      initial_backoff_ms: default_initial_backoff_ms(),
      max_backoff_ms: default_max_backoff_ms(),
      multiplier: default_multiplier(),
    }
  }
}

fn default_max_workers() -> usize {
  5
}

fn default_one() -> u32 {
  1
}

fn default_member_address() -> String {
  "172.21.1.11".to_string()
}

fn default_retries_check_active() -> u32 {
  5000
}

fn default_max_attempts() -> u32 {
  100
}

fn default_initial_backoff_ms() -> u64 {
  100
}

fn default_max_backoff_ms() -> u64 {
  5000
}

fn default_multiplier() -> f64 {
  2.0
}

impl Config {
  /// Load and validate a config file. The format is picked from the extension.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;

    let extension = path
      .extension()
      .and_then(|ext| ext.to_str())
      .unwrap_or_default()
      .to_ascii_lowercase();

    let config = match extension.as_str() {
      "toml" => Self::from_toml(&content)?,
      "json" => Self::from_json(&content)?,
      _ => return Err(ConfigError::UnsupportedFormat { extension }),
    };

    Ok(config)
  }

  pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
    let config: Config = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
  }

  pub fn from_json(content: &str) -> Result<Self, ConfigError> {
    let config: Config = serde_json::from_str(content)?;
    config.validate()?;
    Ok(config)
  }

  /// Check value ranges and required fields.
  pub fn validate(&self) -> Result<(), ConfigError> {
    require_non_empty("identity.auth_url", &self.identity.auth_url)?;
    require_non_empty("identity.username", &self.identity.username)?;
    require_non_empty("identity.project_name", &self.identity.project_name)?;
    require_non_empty("test_params.api_endpoint", &self.test_params.api_endpoint)?;
    require_non_empty("test_params.test_flow", &self.test_params.test_flow)?;

    if self.engine.max_workers == 0 {
      return Err(ConfigError::invalid("engine.max_workers", "must be at least 1"));
    }

    let params = &self.test_params;
    if params.load_balancers < 1 {
      return Err(ConfigError::invalid(
        "test_params.load_balancers",
        "must be at least 1",
      ));
    }
    if params.health_monitors > 1 {
      return Err(ConfigError::invalid(
        "test_params.health_monitors",
        format!("must be 0 or 1, got {}", params.health_monitors),
      ));
    }
    if !(1..=65535).contains(&params.members) {
      return Err(ConfigError::invalid(
        "test_params.members",
        format!("must be between 1 and 65535, got {}", params.members),
      ));
    }

    if params.retries_check_active == 0 {
      return Err(ConfigError::invalid(
        "test_params.retries_check_active",
        "must be at least 1",
      ));
    }

    if self.retry.multiplier < 1.0 {
      return Err(ConfigError::invalid(
        "retry.multiplier",
        format!("must be >= 1.0, got {}", self.retry.multiplier),
      ));
    }

    Ok(())
  }
}

fn require_non_empty(field: &'static str, value: &str) -> Result<(), ConfigError> {
  if value.trim().is_empty() {
    return Err(ConfigError::invalid(field, "must not be empty"));
  }
  Ok(())
}
