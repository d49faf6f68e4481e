use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::error::GraphError;
use crate::node::{FlowNode, NodeKind, TaskKind, TaskNode};
use crate::slot::{SlotKey, SlotName, SlotType};

/// Position of a node in a [`Plan`].
pub type NodeIndex = usize;

/// A task with every input resolved to the task that produces it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedTask {
  pub kind: TaskKind,
  pub inject: BTreeMap<String, serde_json::Value>,
  /// Required slot name and the concrete slot it reads.
  pub inputs: Vec<(SlotName, SlotKey)>,
  /// Slot written after the task succeeds.
  pub output: Option<SlotKey>,
}

impl PlannedTask {
  /// Key of a resolved input by slot name.
  pub fn input(&self, name: &str) -> Option<&SlotKey> {
    self
      .inputs
      .iter()
      .find(|(slot, _)| slot == name)
      .map(|(_, key)| key)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanNodeKind {
  Task(PlannedTask),
  Sequential(Vec<NodeIndex>),
  Parallel(Vec<NodeIndex>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanNode {
  pub name: String,
  /// Slash-separated names from the root down to this node.
  pub path: String,
  pub kind: PlanNodeKind,
}

impl PlanNode {
  pub fn node_kind(&self) -> NodeKind {
    match self.kind {
      PlanNodeKind::Task(_) => NodeKind::Task,
      PlanNodeKind::Sequential(_) => NodeKind::Sequential,
      PlanNodeKind::Parallel(_) => NodeKind::Parallel,
    }
  }

  pub fn task(&self) -> Option<&PlannedTask> {
    match &self.kind {
      PlanNodeKind::Task(task) => Some(task),
      _ => None,
    }
  }
}

/// A validated, index-addressed flow graph ready for execution.
///
/// Cheap to clone; the node arena is shared.
#[derive(Debug, Clone)]
pub struct Plan {
  inner: Arc<PlanInner>,
}

#[derive(Debug)]
struct PlanInner {
  nodes: Vec<PlanNode>,
  root: NodeIndex,
}

impl Plan {
  pub fn root(&self) -> NodeIndex {
    self.inner.root
  }

  /// Get a node by index.
  ///
  /// # Panics
  /// Panics if `index` did not come from this plan.
  pub fn node(&self, index: NodeIndex) -> &PlanNode {
    &self.inner.nodes[index]
  }

  pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &PlanNode)> {
    self.inner.nodes.iter().enumerate()
  }

  /// All tasks in depth-first order.
  pub fn tasks(&self) -> impl Iterator<Item = (NodeIndex, &PlanNode, &PlannedTask)> {
    self
      .nodes()
      .filter_map(|(index, node)| node.task().map(|task| (index, node, task)))
  }

  pub fn len(&self) -> usize {
    self.inner.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.inner.nodes.is_empty()
  }

  pub fn task_count(&self) -> usize {
    self.tasks().count()
  }

  /// Number of tasks that write a slot.
  pub fn provider_count(&self) -> usize {
    self
      .tasks()
      .filter(|(_, _, task)| task.output.is_some())
      .count()
  }

  fn fmt_node(&self, f: &mut fmt::Formatter<'_>, index: NodeIndex, depth: usize) -> fmt::Result {
    let node = self.node(index);
    let indent = "  ".repeat(depth);
    match &node.kind {
      PlanNodeKind::Task(task) => {
        write!(f, "{indent}{} ({})", node.name, task.kind)?;
        if !task.inputs.is_empty() {
          let inputs: Vec<&str> = task.inputs.iter().map(|(name, _)| name.as_str()).collect();
          write!(f, " <- {}", inputs.join(", "))?;
        }
        if let Some(output) = &task.output {
          write!(f, " -> {}", output.name)?;
        }
        writeln!(f)
      }
      PlanNodeKind::Sequential(children) | PlanNodeKind::Parallel(children) => {
        let label = match node.node_kind() {
          NodeKind::Parallel => "parallel",
          _ => "sequential",
        };
        writeln!(f, "{indent}{} [{label}]", node.name)?;
        for child in children {
          self.fmt_node(f, *child, depth + 1)?;
        }
        Ok(())
      }
    }
  }
}

impl fmt::Display for Plan {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.is_empty() {
      return Ok(());
    }
    self.fmt_node(f, self.root(), 0)
  }
}

/// Validate a flow graph and flatten it into a [`Plan`].
///
/// Slot resolution is scoped. A task's `provides` becomes visible to the later
/// children of its nearest enclosing sequential group. Slots provided inside a
/// parallel group become visible to the group's enclosing scope once the whole
/// group is done. A sequential group's scope closes at its end. Declaring a slot
/// that is already visible in any open scope is ambiguous.
pub fn compile(root: &FlowNode) -> Result<Plan, GraphError> {
  let mut compiler = Compiler::default();
  let (root_index, _) = compiler.compile_node(root, "")?;
  Ok(Plan {
    inner: Arc::new(PlanInner {
      nodes: compiler.nodes,
      root: root_index,
    }),
  })
}

/// A slot visible to later tasks.
#[derive(Debug, Clone)]
struct Export {
  key: SlotKey,
  slot_type: SlotType,
  producer: String,
}

#[derive(Default)]
struct Compiler {
  nodes: Vec<PlanNode>,
  names: HashSet<String>,
  scopes: Vec<HashMap<SlotName, Export>>,
}

impl Compiler {
  /// Compile a node and return its index plus the slots it exports to its parent.
  fn compile_node(
    &mut self,
    node: &FlowNode,
    parent_path: &str,
  ) -> Result<(NodeIndex, Vec<Export>), GraphError> {
    if !self.names.insert(node.name().to_string()) {
      return Err(GraphError::DuplicateName {
        node: node.name().to_string(),
      });
    }

    let path = if parent_path.is_empty() {
      node.name().to_string()
    } else {
      format!("{parent_path}/{}", node.name())
    };

    match node {
      FlowNode::Task(task) => self.compile_task(task, path),
      FlowNode::Sequential { name, children } => {
        let index = self.reserve(name, &path);
        self.scopes.push(HashMap::new());

        let mut indices = Vec::with_capacity(children.len());
        for child in children {
          let (child_index, exports) = self.compile_node(child, &path)?;
          for export in exports {
            self.declare(export)?;
          }
          indices.push(child_index);
        }

        self.scopes.pop();
        self.nodes[index].kind = PlanNodeKind::Sequential(indices);
        Ok((index, Vec::new()))
      }
      FlowNode::Parallel { name, children } => {
        let index = self.reserve(name, &path);

        let mut indices = Vec::with_capacity(children.len());
        let mut exports: Vec<Export> = Vec::new();
        for child in children {
          let (child_index, child_exports) = self.compile_node(child, &path)?;
          for export in child_exports {
            if let Some(existing) = exports.iter().find(|e| e.key.name == export.key.name) {
              return Err(GraphError::AmbiguousProducer {
                node: export.producer,
                slot: export.key.name,
                existing: existing.producer.clone(),
              });
            }
            exports.push(export);
          }
          indices.push(child_index);
        }

        self.nodes[index].kind = PlanNodeKind::Parallel(indices);
        Ok((index, exports))
      }
    }
  }

  fn compile_task(
    &mut self,
    task: &TaskNode,
    path: String,
  ) -> Result<(NodeIndex, Vec<Export>), GraphError> {
    for (slot, _) in task.kind.inputs() {
      if !task.requires.iter().any(|required| required == slot) {
        return Err(GraphError::MissingKindInput {
          node: task.name.clone(),
          slot: SlotName::from(*slot),
        });
      }
    }

    let mut inputs = Vec::with_capacity(task.requires.len());
    for slot in &task.requires {
      let export = self
        .lookup(slot)
        .ok_or_else(|| GraphError::UnsatisfiedRequirement {
          node: task.name.clone(),
          slot: slot.clone(),
        })?;

      if let Some(expected) = task.kind.input_type(slot)
        && expected != export.slot_type
      {
        return Err(GraphError::SlotTypeMismatch {
          node: task.name.clone(),
          slot: slot.clone(),
          expected,
          found: export.slot_type,
        });
      }

      inputs.push((slot.clone(), export.key.clone()));
    }

    let index = self.nodes.len();
    let mut exports = Vec::new();
    let output = match (&task.provides, task.kind.output()) {
      (None, _) => None,
      (Some(slot), None) => {
        return Err(GraphError::NoOutput {
          node: task.name.clone(),
          slot: slot.clone(),
        });
      }
      (Some(slot), Some(slot_type)) => {
        let key = SlotKey {
          producer: index,
          name: slot.clone(),
        };
        exports.push(Export {
          key: key.clone(),
          slot_type,
          producer: task.name.clone(),
        });
        Some(key)
      }
    };

    self.nodes.push(PlanNode {
      name: task.name.clone(),
      path,
      kind: PlanNodeKind::Task(PlannedTask {
        kind: task.kind,
        inject: task.inject.clone(),
        inputs,
        output,
      }),
    });

    Ok((index, exports))
  }

  /// Push a group node whose children are filled in once compiled.
  fn reserve(&mut self, name: &str, path: &str) -> NodeIndex {
    let index = self.nodes.len();
    self.nodes.push(PlanNode {
      name: name.to_string(),
      path: path.to_string(),
      kind: PlanNodeKind::Sequential(Vec::new()),
    });
    index
  }

  fn lookup(&self, slot: &SlotName) -> Option<&Export> {
    self.scopes.iter().rev().find_map(|scope| scope.get(slot))
  }

  /// Make a slot visible in the innermost scope.
  fn declare(&mut self, export: Export) -> Result<(), GraphError> {
    if let Some(existing) = self.lookup(&export.key.name) {
      return Err(GraphError::AmbiguousProducer {
        node: export.producer,
        slot: export.key.name,
        existing: existing.producer.clone(),
      });
    }
    if let Some(scope) = self.scopes.last_mut() {
      scope.insert(export.key.name.clone(), export);
    }
    Ok(())
  }
}
