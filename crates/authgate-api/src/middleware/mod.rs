//! Cross-cutting HTTP middleware
//!
//! Token verification lives in [`crate::auth::middleware`].

pub mod metrics;

pub use metrics::metrics_middleware;
