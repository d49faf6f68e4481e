//! lbstress Config
//!
//! This crate contains the serializable configuration for lbstress. A single
//! [`Config`] value is loaded once at startup, validated, and then passed by
//! reference to the flow builder, the task executor and the runtime.
//!
//! Configuration can be loaded from:
//! - TOML files (`--config=stress.toml`)
//! - JSON files (`--config=stress.json`)

mod config;
mod error;

pub use config::{
  Cardinalities, Config, EngineConfig, EngineKind, IdentityConfig, RetryConfig, TestParams,
};
pub use error::ConfigError;
