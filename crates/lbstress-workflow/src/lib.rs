//! lbstress Workflow
//!
//! This crate provides the flow graph model and its compiled form.
//!
//! A [`FlowNode`] tree is an immutable description of the work: leaf tasks,
//! sequential groups (program order) and parallel groups (no order). Tasks
//! pass results to each other through named, typed slots.
//!
//! [`compile`] validates a tree and flattens it into a [`Plan`]:
//! - Node names are unique
//! - Every required slot resolves to exactly one producer that runs earlier
//! - Producer and consumer agree on the slot's type
//! - Every task input is resolved to a concrete [`SlotKey`]

mod error;
mod node;
mod plan;
mod slot;

pub use error::GraphError;
pub use node::{FlowNode, NodeKind, TaskKind, TaskNode};
pub use plan::{NodeIndex, Plan, PlanNode, PlanNodeKind, PlannedTask, compile};
pub use slot::{SlotKey, SlotName, SlotType, SlotValue, slots};
