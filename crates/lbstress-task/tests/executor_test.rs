mod support;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use lbstress_client::ApiResponse;
use lbstress_config::Config;
use lbstress_task::{NodeExecutor, NoopNotifier, ProvisioningExecutor, TaskError, TaskInput};
use lbstress_workflow::{SlotName, SlotValue, TaskKind, slots};
use serde_json::json;
use support::{ScriptedClient, created, lb_status};
use tokio_util::sync::CancellationToken;

const CONFIG: &str = r#"
[identity]
auth_url = "http://keystone:5000"
username = "stress"
password = "secret"
project_name = "stress-project"
project_domain_name = "Default"

[test_params]
api_endpoint = "http://octavia:9876"
test_flow = "multiple_members_flow"
vip_subnet_id = "vip-subnet"
member_subnet_id = "member-subnet"
retries_check_active = 3

[retry]
max_attempts = 5
initial_backoff_ms = 0
"#;

fn executor(
  api: Arc<ScriptedClient>,
  identity: Arc<ScriptedClient>,
) -> ProvisioningExecutor<ScriptedClient, ScriptedClient> {
  let config = Config::from_toml(CONFIG).unwrap();
  ProvisioningExecutor::new(api, identity, &config)
}

fn input(kind: TaskKind, inject: serde_json::Value, slots: &[(&str, SlotValue)]) -> TaskInput {
  let inject: BTreeMap<String, serde_json::Value> = serde_json::from_value(inject).unwrap();
  TaskInput {
    run_id: "run-1".to_string(),
    node: format!("{kind}-node"),
    kind,
    inject,
    slots: slots
      .iter()
      .map(|(name, value)| (SlotName::from(*name), value.clone()))
      .collect::<HashMap<_, _>>(),
    cancel: CancellationToken::new(),
  }
}

fn token() -> (&'static str, SlotValue) {
  (slots::TOKEN, SlotValue::Token("tok".to_string()))
}

fn id(slot: &'static str, value: &str) -> (&'static str, SlotValue) {
  (slot, SlotValue::ResourceId(value.to_string()))
}

#[tokio::test]
async fn test_authenticate_produces_token() {
  let api = Arc::new(ScriptedClient::default());
  let identity = Arc::new(ScriptedClient::new([
    ApiResponse::new(201, "{}").with_header("X-Subject-Token", "tok-9")
  ]));

  let output = executor(api, identity)
    .execute(input(TaskKind::Authenticate, json!({}), &[]), &NoopNotifier)
    .await
    .unwrap();

  assert_eq!(output, Some(SlotValue::Token("tok-9".to_string())));
}

#[tokio::test]
async fn test_create_load_balancer_payload() {
  let api = Arc::new(ScriptedClient::new([created("loadbalancer", "lb-1")]));
  let identity = Arc::new(ScriptedClient::default());

  let output = executor(api.clone(), identity)
    .execute(
      input(
        TaskKind::CreateLoadBalancer,
        json!({"name": "lb-0", "vip_subnet_id": "vip-subnet"}),
        &[token()],
      ),
      &NoopNotifier,
    )
    .await
    .unwrap();

  assert_eq!(output, Some(SlotValue::ResourceId("lb-1".to_string())));
  let request = &api.requests()[0];
  assert_eq!(request.path, "v2.0/lbaas/loadbalancers");
  assert_eq!(request.token.as_deref(), Some("tok"));
  assert_eq!(
    request.body,
    Some(json!({"loadbalancer": {"vip_subnet_id": "vip-subnet", "name": "lb-0"}}))
  );
}

#[tokio::test]
async fn test_create_listener_pool_and_health_monitor_payloads() {
  let api = Arc::new(ScriptedClient::new([
    created("listener", "listener-1"),
    created("pool", "pool-1"),
    created("healthmonitor", "hm-1"),
  ]));
  let executor = executor(api.clone(), Arc::new(ScriptedClient::default()));

  executor
    .execute(
      input(
        TaskKind::CreateListener,
        json!({"name": "listener-0", "port": 1}),
        &[token(), id(slots::LB_ID, "lb-1")],
      ),
      &NoopNotifier,
    )
    .await
    .unwrap();
  executor
    .execute(
      input(
        TaskKind::CreatePool,
        json!({"name": "pool-0"}),
        &[token(), id(slots::LISTENER_ID, "listener-1")],
      ),
      &NoopNotifier,
    )
    .await
    .unwrap();
  let hm = executor
    .execute(
      input(
        TaskKind::CreateHealthMonitor,
        json!({"name": "healthmonitor1"}),
        &[token(), id(slots::POOL_ID, "pool-1")],
      ),
      &NoopNotifier,
    )
    .await
    .unwrap();

  assert_eq!(hm, Some(SlotValue::ResourceId("hm-1".to_string())));

  let requests = api.requests();
  assert_eq!(requests[0].path, "v2.0/lbaas/listeners");
  assert_eq!(
    requests[0].body,
    Some(json!({"listener": {
      "protocol": "HTTP",
      "protocol_port": 1,
      "name": "listener-0",
      "loadbalancer_id": "lb-1"
    }}))
  );
  assert_eq!(requests[1].path, "v2.0/lbaas/pools");
  assert_eq!(
    requests[1].body,
    Some(json!({"pool": {
      "listener_id": "listener-1",
      "lb_algorithm": "ROUND_ROBIN",
      "protocol": "HTTP",
      "name": "pool-0"
    }}))
  );
  assert_eq!(requests[2].path, "v2.0/lbaas/healthmonitors");
  assert_eq!(
    requests[2].body,
    Some(json!({"healthmonitor": {
      "pool_id": "pool-1",
      "delay": 5,
      "max_retries": 1,
      "timeout": 1,
      "type": "PING",
      "name": "healthmonitor1"
    }}))
  );
}

#[tokio::test]
async fn test_create_member_posts_under_pool() {
  let api = Arc::new(ScriptedClient::new([created("member", "member-1")]));
  let executor = executor(api.clone(), Arc::new(ScriptedClient::default()));

  executor
    .execute(
      input(
        TaskKind::CreateMember,
        json!({
          "name": "member-1",
          "address": "172.21.1.11",
          "port": 2,
          "subnet_id": "member-subnet"
        }),
        &[token(), id(slots::POOL_ID, "pool-1")],
      ),
      &NoopNotifier,
    )
    .await
    .unwrap();

  let request = &api.requests()[0];
  assert_eq!(request.path, "v2.0/lbaas/pools/pool-1/members");
  assert_eq!(
    request.body,
    Some(json!({"member": {
      "address": "172.21.1.11",
      "protocol_port": 2,
      "subnet_id": "member-subnet",
      "name": "member-1"
    }}))
  );
}

#[tokio::test]
async fn test_wait_uses_configured_poll_budget() {
  let api = Arc::new(ScriptedClient::new(
    (0..5).map(|_| lb_status("PENDING_UPDATE")),
  ));
  let executor = executor(api.clone(), Arc::new(ScriptedClient::default()));

  let err = executor
    .execute(
      input(
        TaskKind::WaitForActive,
        json!({}),
        &[token(), id(slots::LB_ID, "lb-1")],
      ),
      &NoopNotifier,
    )
    .await
    .unwrap_err();

  assert!(matches!(err, TaskError::PollTimeout { attempts: 3, .. }));
  assert_eq!(api.requests().len(), 3);
}

#[tokio::test]
async fn test_missing_slot_is_reported() {
  let executor = executor(
    Arc::new(ScriptedClient::default()),
    Arc::new(ScriptedClient::default()),
  );

  let err = executor
    .execute(
      input(TaskKind::CreatePool, json!({"name": "pool-0"}), &[token()]),
      &NoopNotifier,
    )
    .await
    .unwrap_err();

  assert!(matches!(err, TaskError::MissingInput { ref field } if field == "listener_id"));
}

#[tokio::test]
async fn test_invalid_port_is_rejected() {
  let executor = executor(
    Arc::new(ScriptedClient::default()),
    Arc::new(ScriptedClient::default()),
  );

  let err = executor
    .execute(
      input(
        TaskKind::CreateListener,
        json!({"name": "listener-0", "port": 70000}),
        &[token(), id(slots::LB_ID, "lb-1")],
      ),
      &NoopNotifier,
    )
    .await
    .unwrap_err();

  assert!(matches!(err, TaskError::InvalidInput { ref field, .. } if field == "port"));
}
