use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::slot::{SlotName, SlotType, slots};

/// The operation a task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
  Authenticate,
  CreateLoadBalancer,
  CreateListener,
  CreatePool,
  CreateHealthMonitor,
  CreateMember,
  WaitForActive,
}

impl TaskKind {
  /// Slots this kind reads, with the type it expects for each.
  pub fn inputs(&self) -> &'static [(&'static str, SlotType)] {
    match self {
      TaskKind::Authenticate => &[],
      TaskKind::CreateLoadBalancer => &[(slots::TOKEN, SlotType::Token)],
      TaskKind::CreateListener => &[
        (slots::TOKEN, SlotType::Token),
        (slots::LB_ID, SlotType::ResourceId),
      ],
      TaskKind::CreatePool => &[
        (slots::TOKEN, SlotType::Token),
        (slots::LISTENER_ID, SlotType::ResourceId),
      ],
      TaskKind::CreateHealthMonitor | TaskKind::CreateMember => &[
        (slots::TOKEN, SlotType::Token),
        (slots::POOL_ID, SlotType::ResourceId),
      ],
      TaskKind::WaitForActive => &[
        (slots::TOKEN, SlotType::Token),
        (slots::LB_ID, SlotType::ResourceId),
      ],
    }
  }

  /// Type of the value this kind produces, if any.
  pub fn output(&self) -> Option<SlotType> {
    match self {
      TaskKind::Authenticate => Some(SlotType::Token),
      TaskKind::WaitForActive => None,
      _ => Some(SlotType::ResourceId),
    }
  }

  /// Expected type of an input slot, if this kind declares one.
  pub fn input_type(&self, slot: &SlotName) -> Option<SlotType> {
    self
      .inputs()
      .iter()
      .find(|(name, _)| slot == name)
      .map(|(_, ty)| *ty)
  }

  pub fn is_create(&self) -> bool {
    matches!(
      self,
      TaskKind::CreateLoadBalancer
        | TaskKind::CreateListener
        | TaskKind::CreatePool
        | TaskKind::CreateHealthMonitor
        | TaskKind::CreateMember
    )
  }
}

impl fmt::Display for TaskKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      TaskKind::Authenticate => "authenticate",
      TaskKind::CreateLoadBalancer => "create_load_balancer",
      TaskKind::CreateListener => "create_listener",
      TaskKind::CreatePool => "create_pool",
      TaskKind::CreateHealthMonitor => "create_health_monitor",
      TaskKind::CreateMember => "create_member",
      TaskKind::WaitForActive => "wait_for_active",
    };
    f.write_str(name)
  }
}

/// A leaf unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskNode {
  pub name: String,
  pub kind: TaskKind,
  #[serde(default)]
  pub requires: BTreeSet<SlotName>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub provides: Option<SlotName>,
  /// Constant parameters that do not come from slots (names, ports, subnets).
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub inject: BTreeMap<String, serde_json::Value>,
}

impl TaskNode {
  pub fn new(name: impl Into<String>, kind: TaskKind) -> Self {
    Self {
      name: name.into(),
      kind,
      requires: BTreeSet::new(),
      provides: None,
      inject: BTreeMap::new(),
    }
  }

  pub fn requires<I, S>(mut self, slots: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<SlotName>,
  {
    self.requires.extend(slots.into_iter().map(Into::into));
    self
  }

  pub fn provides(mut self, slot: impl Into<SlotName>) -> Self {
    self.provides = Some(slot.into());
    self
  }

  pub fn inject(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
    self.inject.insert(key.into(), value.into());
    self
  }
}

/// Discriminant of a [`FlowNode`], used in events and plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
  Task,
  Sequential,
  Parallel,
}

/// A node of the flow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowNode {
  Task(TaskNode),
  /// Children run one after the other, in order.
  Sequential { name: String, children: Vec<FlowNode> },
  /// Children may run concurrently, in any order.
  Parallel { name: String, children: Vec<FlowNode> },
}

impl FlowNode {
  pub fn sequential(name: impl Into<String>, children: Vec<FlowNode>) -> Self {
    FlowNode::Sequential {
      name: name.into(),
      children,
    }
  }

  pub fn parallel(name: impl Into<String>, children: Vec<FlowNode>) -> Self {
    FlowNode::Parallel {
      name: name.into(),
      children,
    }
  }

  pub fn name(&self) -> &str {
    match self {
      FlowNode::Task(task) => &task.name,
      FlowNode::Sequential { name, .. } | FlowNode::Parallel { name, .. } => name,
    }
  }

  pub fn kind(&self) -> NodeKind {
    match self {
      FlowNode::Task(_) => NodeKind::Task,
      FlowNode::Sequential { .. } => NodeKind::Sequential,
      FlowNode::Parallel { .. } => NodeKind::Parallel,
    }
  }

  /// Direct children; empty for tasks.
  pub fn children(&self) -> &[FlowNode] {
    match self {
      FlowNode::Task(_) => &[],
      FlowNode::Sequential { children, .. } | FlowNode::Parallel { children, .. } => children,
    }
  }

  /// All tasks in depth-first order.
  pub fn tasks(&self) -> Vec<&TaskNode> {
    let mut tasks = Vec::new();
    collect_tasks(self, &mut tasks);
    tasks
  }

  /// Total number of nodes, groups included.
  pub fn node_count(&self) -> usize {
    1 + self
      .children()
      .iter()
      .map(FlowNode::node_count)
      .sum::<usize>()
  }

  /// Find a node by name anywhere in the tree.
  pub fn find(&self, name: &str) -> Option<&FlowNode> {
    if self.name() == name {
      return Some(self);
    }
    self.children().iter().find_map(|child| child.find(name))
  }
}

impl From<TaskNode> for FlowNode {
  fn from(task: TaskNode) -> Self {
    FlowNode::Task(task)
  }
}

fn collect_tasks<'a>(node: &'a FlowNode, out: &mut Vec<&'a TaskNode>) {
  match node {
    FlowNode::Task(task) => out.push(task),
    FlowNode::Sequential { children, .. } | FlowNode::Parallel { children, .. } => {
      for child in children {
        collect_tasks(child, out);
      }
    }
  }
}
