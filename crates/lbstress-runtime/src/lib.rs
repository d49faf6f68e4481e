//! lbstress Runtime
//!
//! This crate executes compiled [`Plan`]s. The [`Runtime`] walks the plan
//! tree: sequential children one after another, parallel children as spawned
//! tokio tasks. A semaphore bounds how many task bodies run at once.
//!
//! Tasks exchange values through a write-once [`SlotRegistry`] owned by the
//! run. The first failure cancels the run; work already in flight settles but
//! its results are discarded.

mod error;
mod registry;
mod result;
mod runtime;

pub use error::{RuntimeError, SlotError};
pub use registry::SlotRegistry;
pub use result::RunReport;
pub use runtime::{Runtime, RuntimeConfig};

pub use lbstress_task::{
  ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier, TracingNotifier,
};
pub use lbstress_workflow::{Plan, compile};
