//! lbstress Builder
//!
//! Builders turn [`TestParams`](lbstress_config::TestParams) into a
//! [`FlowNode`](lbstress_workflow::FlowNode) tree. Builds are deterministic:
//! the same parameters always produce structurally equal graphs.
//!
//! Builders are registered by name in a [`FlowCatalog`] so the flow to run can
//! be picked from configuration.

mod builder;
mod catalog;
mod error;
mod multiple_members;

pub use builder::FlowBuilder;
pub use catalog::FlowCatalog;
pub use error::BuildError;
pub use multiple_members::MultipleMembersFlow;
