use std::collections::BTreeMap;
use std::sync::Arc;

use crate::builder::FlowBuilder;
use crate::error::BuildError;
use crate::multiple_members::MultipleMembersFlow;

/// Flow builders registered by name.
#[derive(Clone, Default)]
pub struct FlowCatalog {
  builders: BTreeMap<&'static str, Arc<dyn FlowBuilder>>,
}

impl FlowCatalog {
  pub fn new() -> Self {
    Self::default()
  }

  /// Catalog with every built-in flow registered.
  pub fn standard() -> Self {
    let mut catalog = Self::new();
    catalog.register(MultipleMembersFlow);
    catalog
  }

  /// Register a builder, replacing any builder with the same name.
  pub fn register(&mut self, builder: impl FlowBuilder + 'static) {
    self.builders.insert(builder.name(), Arc::new(builder));
  }

  pub fn get(&self, name: &str) -> Result<Arc<dyn FlowBuilder>, BuildError> {
    self
      .builders
      .get(name)
      .cloned()
      .ok_or_else(|| BuildError::UnknownFlow {
        name: name.to_string(),
        available: self.names().map(str::to_string).collect(),
      })
  }

  /// Registered names in sorted order.
  pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
    self.builders.keys().copied()
  }
}
