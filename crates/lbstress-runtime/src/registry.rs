use std::collections::HashMap;
use std::sync::RwLock;

use lbstress_workflow::{SlotKey, SlotValue};

use crate::error::SlotError;

/// Write-once store of slot values for a single run.
#[derive(Debug, Default)]
pub struct SlotRegistry {
  slots: RwLock<HashMap<SlotKey, SlotValue>>,
}

impl SlotRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Store a value. Each key may be written once.
  pub fn write(&self, key: SlotKey, value: SlotValue) -> Result<(), SlotError> {
    let mut slots = self.slots.write().unwrap();
    if slots.contains_key(&key) {
      return Err(SlotError::AlreadyWritten { key });
    }
    slots.insert(key, value);
    Ok(())
  }

  pub fn read(&self, key: &SlotKey) -> Result<SlotValue, SlotError> {
    self
      .slots
      .read()
      .unwrap()
      .get(key)
      .cloned()
      .ok_or_else(|| SlotError::NotWritten { key: key.clone() })
  }

  pub fn len(&self) -> usize {
    self.slots.read().unwrap().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
