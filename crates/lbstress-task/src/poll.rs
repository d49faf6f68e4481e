use std::time::{Duration, Instant};

use lbstress_client::{ApiClient, ApiRequest};
use tracing::{error, info};

use crate::api::ApiTask;
use crate::context::TaskContext;
use crate::error::TaskError;
use crate::events::ExecutionEvent;

const ACTIVE: &str = "ACTIVE";
const ERROR: &str = "ERROR";

/// How long a load balancer took to become ACTIVE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
  pub attempts: u32,
  pub elapsed: Duration,
}

/// Queries a load balancer until its provisioning status is terminal.
pub struct PollTask<A: ?Sized> {
  api: ApiTask<A>,
  max_attempts: u32,
  interval: Duration,
}

impl<A: ApiClient + ?Sized> PollTask<A> {
  pub fn new(api: ApiTask<A>, max_attempts: u32) -> Self {
    Self {
      api,
      max_attempts,
      interval: Duration::ZERO,
    }
  }

  /// Delay between status queries. Defaults to none.
  pub fn with_interval(mut self, interval: Duration) -> Self {
    self.interval = interval;
    self
  }

  pub async fn execute(
    &self,
    ctx: &TaskContext<'_>,
    token: &str,
    lb_id: &str,
  ) -> Result<PollOutcome, TaskError> {
    let start = Instant::now();
    let request = ApiRequest::get(format!("v2.0/lbaas/loadbalancers/{lb_id}")).with_token(token);

    for attempt in 1..=self.max_attempts {
      if attempt > 1 {
        ctx.pause(self.interval).await?;
      }

      let call = self.api.call(ctx, &request).await?;
      let status = provisioning_status(call.response.json().ok().as_ref()).ok_or_else(|| {
        TaskError::InvalidResponse {
          url: self.api.client().url(&request.path),
          message: "missing 'loadbalancer.provisioning_status'".to_string(),
        }
      })?;

      match status.as_str() {
        ACTIVE => {
          let outcome = PollOutcome {
            attempts: attempt,
            elapsed: start.elapsed(),
          };
          info!(
            node = %ctx.node,
            lb_id = %lb_id,
            attempts = attempt,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "load_balancer_active"
          );
          ctx.notify(ExecutionEvent::ResourceActive {
            run_id: ctx.run_id.to_string(),
            node: ctx.node.to_string(),
            resource_id: lb_id.to_string(),
            attempts: attempt,
            elapsed_ms: outcome.elapsed.as_millis() as u64,
          });
          return Ok(outcome);
        }
        ERROR => {
          error!(node = %ctx.node, lb_id = %lb_id, "load_balancer_error");
          return Err(TaskError::Resource {
            resource_id: lb_id.to_string(),
            status: ERROR.to_string(),
          });
        }
        _ => {}
      }
    }

    error!(
      node = %ctx.node,
      lb_id = %lb_id,
      attempts = self.max_attempts,
      "load_balancer_poll_expired"
    );
    Err(TaskError::PollTimeout {
      resource_id: lb_id.to_string(),
      attempts: self.max_attempts,
    })
  }
}

fn provisioning_status(body: Option<&serde_json::Value>) -> Option<String> {
  body?
    .get("loadbalancer")?
    .get("provisioning_status")?
    .as_str()
    .map(str::to_string)
}
