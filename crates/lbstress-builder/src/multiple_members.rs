use lbstress_config::TestParams;
use lbstress_workflow::{FlowNode, TaskKind, TaskNode, slots};

use crate::builder::FlowBuilder;

const HEALTH_MONITOR_NAME: &str = "healthmonitor1";

/// Builds load balancers with listeners, pools, an optional health monitor and
/// multiple members per pool.
///
/// Layout, with `lb-0` standing for the i-th load balancer:
///
/// ```text
/// base_flow                                  sequential
///   get-token                                -> token
///   create_lbs_flow                          parallel, one entry per lb
///     create-lb-0-subflow                    sequential
///       create-lb-0                          -> lb_id
///       wait-lb-0-create
///       lb-0-create-listeners-flow           parallel, one entry per listener
///         create-lb-0-listener-0-subflow     sequential
///           create-lb-0-listener-0           -> listener_id
///           wait-lb-0-listener-0-create
///           lb-0-listener-0-create-pools-flow
///             ...pool subflows, then a parallel of hm and member subflows
/// ```
///
/// Every wait polls the load balancer, whose status covers all of its children.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultipleMembersFlow;

impl FlowBuilder for MultipleMembersFlow {
  fn name(&self) -> &'static str {
    "multiple_members_flow"
  }

  fn build(&self, params: &TestParams) -> FlowNode {
    let get_token = TaskNode::new("get-token", TaskKind::Authenticate).provides(slots::TOKEN);

    let lbs = (0..params.load_balancers)
      .map(|i| lb_subflow(params, &format!("lb-{i}")))
      .collect();

    FlowNode::sequential(
      "base_flow",
      vec![get_token.into(), FlowNode::parallel("create_lbs_flow", lbs)],
    )
  }
}

fn wait(name: String) -> FlowNode {
  TaskNode::new(name, TaskKind::WaitForActive)
    .requires([slots::TOKEN, slots::LB_ID])
    .into()
}

fn lb_subflow(params: &TestParams, lb: &str) -> FlowNode {
  let create = TaskNode::new(format!("create-{lb}"), TaskKind::CreateLoadBalancer)
    .requires([slots::TOKEN])
    .provides(slots::LB_ID)
    .inject("name", lb)
    .inject("vip_subnet_id", params.vip_subnet_id.as_str());

  let listeners = (0..params.listeners)
    .map(|j| listener_subflow(params, lb, j))
    .collect();

  FlowNode::sequential(
    format!("create-{lb}-subflow"),
    vec![
      create.into(),
      wait(format!("wait-{lb}-create")),
      FlowNode::parallel(format!("{lb}-create-listeners-flow"), listeners),
    ],
  )
}

fn listener_subflow(params: &TestParams, lb: &str, index: u32) -> FlowNode {
  let listener = format!("listener-{index}");
  let prefix = format!("{lb}-{listener}");

  let create = TaskNode::new(format!("create-{prefix}"), TaskKind::CreateListener)
    .requires([slots::TOKEN, slots::LB_ID])
    .provides(slots::LISTENER_ID)
    .inject("name", listener.as_str())
    .inject("port", index + 1);

  let pools = (0..params.pools)
    .map(|k| pool_subflow(params, &prefix, k))
    .collect();

  FlowNode::sequential(
    format!("create-{prefix}-subflow"),
    vec![
      create.into(),
      wait(format!("wait-{prefix}-create")),
      FlowNode::parallel(format!("{prefix}-create-pools-flow"), pools),
    ],
  )
}

fn pool_subflow(params: &TestParams, parent: &str, index: u32) -> FlowNode {
  let pool = format!("pool-{index}");
  let prefix = format!("{parent}-{pool}");

  let create = TaskNode::new(format!("create-{prefix}"), TaskKind::CreatePool)
    .requires([slots::TOKEN, slots::LISTENER_ID])
    .provides(slots::POOL_ID)
    .inject("name", pool.as_str());

  let mut children = Vec::with_capacity(params.members as usize + 1);
  if params.cardinalities().health_monitor {
    children.push(health_monitor_subflow(&prefix));
  }
  children.extend((0..params.members).map(|m| member_subflow(params, &prefix, m)));

  FlowNode::sequential(
    format!("create-{prefix}-subflow"),
    vec![
      create.into(),
      wait(format!("wait-{prefix}-create")),
      FlowNode::parallel(format!("{prefix}-create-children-flow"), children),
    ],
  )
}

fn health_monitor_subflow(pool: &str) -> FlowNode {
  let prefix = format!("{pool}-hm");

  let create = TaskNode::new(format!("create-{prefix}"), TaskKind::CreateHealthMonitor)
    .requires([slots::TOKEN, slots::POOL_ID])
    .provides(slots::HEALTH_MONITOR_ID)
    .inject("name", HEALTH_MONITOR_NAME);

  FlowNode::sequential(
    format!("create-{prefix}-subflow"),
    vec![create.into(), wait(format!("wait-{prefix}-create"))],
  )
}

fn member_subflow(params: &TestParams, pool: &str, index: u32) -> FlowNode {
  let member = format!("member-{index}");
  let prefix = format!("{pool}-{member}");

  let create = TaskNode::new(format!("create-{prefix}"), TaskKind::CreateMember)
    .requires([slots::TOKEN, slots::POOL_ID])
    .provides(slots::MEMBER_ID)
    .inject("name", member.as_str())
    .inject("address", params.member_address.as_str())
    .inject("port", index + 1)
    .inject("subnet_id", params.member_subnet_id.as_str());

  FlowNode::sequential(
    format!("create-{prefix}-subflow"),
    vec![create.into(), wait(format!("wait-{prefix}-create"))],
  )
}
