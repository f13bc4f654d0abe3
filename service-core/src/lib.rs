//! service-core: Shared infrastructure for the ISN services.
//!
//! Error responses, layered configuration, tracing setup and request-id
//! propagation used by every service crate in the workspace.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;

pub use axum;
