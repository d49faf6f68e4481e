//! lbstress Task
//!
//! Task bodies executed by the runtime and the events they report.
//!
//! - [`ApiTask`] performs one logical remote call, retrying 409 and 503
//! - [`PollTask`] queries a load balancer until it is ACTIVE or ERROR
//! - [`authenticate`] fetches a token from the identity service
//! - [`ProvisioningExecutor`] maps each [`TaskKind`](lbstress_workflow::TaskKind)
//!   to its request payload and runs it through the tasks above

mod api;
mod auth;
mod context;
mod error;
mod events;
mod executor;
mod poll;
mod retry;

pub use api::{ApiCall, ApiTask, Created, is_transient};
pub use auth::{Credentials, authenticate};
pub use context::TaskContext;
pub use error::TaskError;
pub use events::{
  ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier, TracingNotifier,
};
pub use executor::{NodeExecutor, ProvisioningExecutor, TaskInput};
pub use poll::{PollOutcome, PollTask};
pub use retry::RetryPolicy;
