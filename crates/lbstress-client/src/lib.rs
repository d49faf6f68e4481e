//! lbstress Client
//!
//! Thin request/response clients for the provisioning API and the identity
//! service. The traits are the seam tasks are written against; [`HttpClient`]
//! implements both over reqwest.
//!
//! Clients never interpret status codes. A 503 is a successful round trip as
//! far as this crate is concerned; retry and failure policy live in the tasks.

mod client;
mod error;
mod http;

pub use client::{ApiClient, ApiRequest, ApiResponse, IdentityClient};
pub use error::ClientError;
pub use http::{HttpClient, USER_AGENT};
pub use reqwest::Method;
