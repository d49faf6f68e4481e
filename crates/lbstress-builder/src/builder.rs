use lbstress_config::TestParams;
use lbstress_workflow::FlowNode;

/// Produces a flow graph from test parameters.
pub trait FlowBuilder: Send + Sync {
  /// Name used to select this builder in configuration.
  fn name(&self) -> &'static str;

  /// Build the flow graph. Must be deterministic.
  fn build(&self, params: &TestParams) -> FlowNode;
}
