use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
  #[error("unknown test flow '{name}' (available: {})", available.join(", "))]
  UnknownFlow {
    name: String,
    available: Vec<String>,
  },
}
