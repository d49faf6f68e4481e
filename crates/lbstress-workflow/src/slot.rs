//! Named, typed slots that carry results between tasks.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::plan::NodeIndex;

/// Well-known slot names used by the provisioning flows.
pub mod slots {
  pub const TOKEN: &str = "token";
  pub const LB_ID: &str = "lb_id";
  pub const LISTENER_ID: &str = "listener_id";
  pub const POOL_ID: &str = "pool_id";
  pub const HEALTH_MONITOR_ID: &str = "healthmonitor_id";
  pub const MEMBER_ID: &str = "member_id";
}

/// Name of a slot, e.g. `lb_id`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotName(String);

impl SlotName {
  pub fn new(name: impl Into<String>) -> Self {
    Self(name.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for SlotName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for SlotName {
  fn from(name: &str) -> Self {
    Self::new(name)
  }
}

impl From<String> for SlotName {
  fn from(name: String) -> Self {
    Self(name)
  }
}

impl Borrow<str> for SlotName {
  fn borrow(&self) -> &str {
    &self.0
  }
}

impl PartialEq<str> for SlotName {
  fn eq(&self, other: &str) -> bool {
    self.0 == other
  }
}

impl PartialEq<&str> for SlotName {
  fn eq(&self, other: &&str) -> bool {
    self.0 == *other
  }
}

/// The type of value a slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotType {
  /// An opaque identity token.
  Token,
  /// The id of a remote resource.
  ResourceId,
}

impl fmt::Display for SlotType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SlotType::Token => f.write_str("token"),
      SlotType::ResourceId => f.write_str("resource id"),
    }
  }
}

/// A value stored in a slot.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SlotValue {
  Token(String),
  ResourceId(String),
}

impl SlotValue {
  pub fn slot_type(&self) -> SlotType {
    match self {
      SlotValue::Token(_) => SlotType::Token,
      SlotValue::ResourceId(_) => SlotType::ResourceId,
    }
  }

  pub fn as_str(&self) -> &str {
    match self {
      SlotValue::Token(value) | SlotValue::ResourceId(value) => value,
    }
  }
}

// Tokens are credentials; keep them out of logs.
impl fmt::Debug for SlotValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SlotValue::Token(_) => f.write_str("Token(<redacted>)"),
      SlotValue::ResourceId(id) => f.debug_tuple("ResourceId").field(id).finish(),
    }
  }
}

/// Identifies one slot instance within a run: the slot name plus the task
/// that produces it. Two branches may both provide `lb_id`; their keys differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotKey {
  pub producer: NodeIndex,
  pub name: SlotName,
}

impl fmt::Display for SlotKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}@{}", self.name, self.producer)
  }
}
