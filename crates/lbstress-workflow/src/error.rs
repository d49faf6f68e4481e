use thiserror::Error;

use crate::slot::{SlotName, SlotType};

/// Structural defects found while compiling a flow graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
  #[error("duplicate node name '{node}'")]
  DuplicateName { node: String },

  #[error("node '{node}' requires slot '{slot}' but no earlier task provides it")]
  UnsatisfiedRequirement { node: String, slot: SlotName },

  #[error("node '{node}' provides slot '{slot}' which is already provided by '{existing}'")]
  AmbiguousProducer {
    node: String,
    slot: SlotName,
    existing: String,
  },

  #[error("node '{node}' needs slot '{slot}' for its task kind but does not require it")]
  MissingKindInput { node: String, slot: SlotName },

  #[error("node '{node}' declares slot '{slot}' but its task kind produces no value")]
  NoOutput { node: String, slot: SlotName },

  #[error("node '{node}' expects slot '{slot}' as {expected}, but it is produced as {found}")]
  SlotTypeMismatch {
    node: String,
    slot: SlotName,
    expected: SlotType,
    found: SlotType,
  },
}
