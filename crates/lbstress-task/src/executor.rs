use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lbstress_client::{ApiClient, ApiRequest, IdentityClient};
use lbstress_config::Config;
use lbstress_workflow::{SlotName, SlotValue, TaskKind, slots};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::api::ApiTask;
use crate::auth::{Credentials, authenticate};
use crate::context::TaskContext;
use crate::error::TaskError;
use crate::events::ExecutionNotifier;
use crate::poll::PollTask;
use crate::retry::RetryPolicy;

/// Everything a task body needs, resolved by the runtime before dispatch.
#[derive(Debug, Clone)]
pub struct TaskInput {
  pub run_id: String,
  pub node: String,
  pub kind: TaskKind,
  pub inject: BTreeMap<String, serde_json::Value>,
  /// Values of the required slots, keyed by slot name.
  pub slots: HashMap<SlotName, SlotValue>,
  /// Cancelled when the run aborts.
  pub cancel: CancellationToken,
}

impl TaskInput {
  pub fn slot(&self, name: &str) -> Result<&SlotValue, TaskError> {
    self.slots.get(name).ok_or_else(|| TaskError::MissingInput {
      field: name.to_string(),
    })
  }

  pub fn token(&self) -> Result<&str, TaskError> {
    match self.slot(slots::TOKEN)? {
      SlotValue::Token(token) => Ok(token),
      other => Err(TaskError::InvalidInput {
        field: slots::TOKEN.to_string(),
        message: format!("expected a token, got {}", other.slot_type()),
      }),
    }
  }

  pub fn resource_id(&self, name: &str) -> Result<&str, TaskError> {
    match self.slot(name)? {
      SlotValue::ResourceId(id) => Ok(id),
      other => Err(TaskError::InvalidInput {
        field: name.to_string(),
        message: format!("expected a resource id, got {}", other.slot_type()),
      }),
    }
  }

  pub fn inject_str(&self, key: &str) -> Result<&str, TaskError> {
    let value = self.inject.get(key).ok_or_else(|| TaskError::MissingInput {
      field: key.to_string(),
    })?;
    value.as_str().ok_or_else(|| TaskError::InvalidInput {
      field: key.to_string(),
      message: format!("expected a string, got {value}"),
    })
  }

  pub fn inject_port(&self, key: &str) -> Result<u16, TaskError> {
    let value = self.inject.get(key).ok_or_else(|| TaskError::MissingInput {
      field: key.to_string(),
    })?;
    value
      .as_u64()
      .and_then(|port| u16::try_from(port).ok())
      .filter(|port| *port > 0)
      .ok_or_else(|| TaskError::InvalidInput {
        field: key.to_string(),
        message: format!("expected a port between 1 and 65535, got {value}"),
      })
  }
}

/// Executes one task of a plan.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
  /// Run the task body and return the value for its provided slot, if any.
  async fn execute(
    &self,
    input: TaskInput,
    notifier: &dyn ExecutionNotifier,
  ) -> Result<Option<SlotValue>, TaskError>;
}

/// Runs provisioning tasks against the load-balancer API.
pub struct ProvisioningExecutor<A: ?Sized, I: ?Sized> {
  api: ApiTask<A>,
  poll: PollTask<A>,
  identity: Arc<I>,
  credentials: Credentials,
}

impl<A, I> ProvisioningExecutor<A, I>
where
  A: ApiClient + ?Sized,
  I: IdentityClient + ?Sized,
{
  pub fn new(api: Arc<A>, identity: Arc<I>, config: &Config) -> Self {
    let api = ApiTask::new(api, RetryPolicy::from(&config.retry));
    let poll = PollTask::new(api.clone(), config.test_params.retries_check_active)
      .with_interval(Duration::from_millis(config.test_params.poll_interval_ms));

    Self {
      api,
      poll,
      identity,
      credentials: Credentials::from(&config.identity),
    }
  }

  async fn create(
    &self,
    ctx: &TaskContext<'_>,
    token: &str,
    path: &str,
    result_key: &str,
    body: serde_json::Value,
  ) -> Result<Option<SlotValue>, TaskError> {
    let request = ApiRequest::post(path, body).with_token(token);
    let created = self.api.execute(ctx, &request, result_key).await?;
    Ok(Some(SlotValue::ResourceId(created.id)))
  }
}

#[async_trait]
impl<A, I> NodeExecutor for ProvisioningExecutor<A, I>
where
  A: ApiClient + ?Sized,
  I: IdentityClient + ?Sized,
{
  #[instrument(
    name = "task_execute",
    skip(self, input, notifier),
    fields(run_id = %input.run_id, node = %input.node, kind = %input.kind)
  )]
  async fn execute(
    &self,
    input: TaskInput,
    notifier: &dyn ExecutionNotifier,
  ) -> Result<Option<SlotValue>, TaskError> {
    let ctx = TaskContext::new(&input.run_id, &input.node, notifier, &input.cancel);

    match input.kind {
      TaskKind::Authenticate => {
        let token = authenticate(self.identity.as_ref(), &self.credentials).await?;
        Ok(Some(SlotValue::Token(token)))
      }
      TaskKind::CreateLoadBalancer => {
        let name = input.inject_str("name")?;
        info!(node = %input.node, name = %name, "creating_load_balancer");
        let body = json!({
          "loadbalancer": {
            "vip_subnet_id": input.inject_str("vip_subnet_id")?,
            "name": name,
          }
        });
        self.create(&ctx, input.token()?, "v2.0/lbaas/loadbalancers", "loadbalancer", body).await
      }
      TaskKind::CreateListener => {
        let name = input.inject_str("name")?;
        info!(node = %input.node, name = %name, "creating_listener");
        let body = json!({
          "listener": {
            "protocol": "HTTP",
            "protocol_port": input.inject_port("port")?,
            "name": name,
            "loadbalancer_id": input.resource_id(slots::LB_ID)?,
          }
        });
        self.create(&ctx, input.token()?, "v2.0/lbaas/listeners", "listener", body).await
      }
      TaskKind::CreatePool => {
        let name = input.inject_str("name")?;
        info!(node = %input.node, name = %name, "creating_pool");
        let body = json!({
          "pool": {
            "listener_id": input.resource_id(slots::LISTENER_ID)?,
            "lb_algorithm": "ROUND_ROBIN",
            "protocol": "HTTP",
            "name": name,
          }
        });
        self.create(&ctx, input.token()?, "v2.0/lbaas/pools", "pool", body).await
      }
      TaskKind::CreateHealthMonitor => {
        let name = input.inject_str("name")?;
        info!(node = %input.node, name = %name, "creating_health_monitor");
        let body = json!({
          "healthmonitor": {
            "pool_id": input.resource_id(slots::POOL_ID)?,
            "delay": 5,
            "max_retries": 1,
            "timeout": 1,
            "type": "PING",
            "name": name,
          }
        });
        self.create(&ctx, input.token()?, "v2.0/lbaas/healthmonitors", "healthmonitor", body).await
      }
      TaskKind::CreateMember => {
        let name = input.inject_str("name")?;
        let pool_id = input.resource_id(slots::POOL_ID)?;
        info!(node = %input.node, name = %name, "creating_member");
        let body = json!({
          "member": {
            "address": input.inject_str("address")?,
            "protocol_port": input.inject_port("port")?,
            "subnet_id": input.inject_str("subnet_id")?,
            "name": name,
          }
        });
        self
          .create(
            &ctx,
            input.token()?,
            &format!("v2.0/lbaas/pools/{pool_id}/members"),
            "member",
            body,
          )
          .await
      }
      TaskKind::WaitForActive => {
        let lb_id = input.resource_id(slots::LB_ID)?;
        self.poll.execute(&ctx, input.token()?, lb_id).await?;
        Ok(None)
      }
    }
  }
}
