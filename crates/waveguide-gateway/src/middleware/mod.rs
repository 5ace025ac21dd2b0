//! Middleware for the Waveguide gateway.
//!
//! # Components
//!
//! - `admission` - Rate limiting and identity checks (the admission gate)
//! - `http_metrics` - HTTP request metrics middleware

pub mod admission;
pub mod http_metrics;

pub use admission::{enforce_rate_limit, require_identity, AdmissionGate};
pub use http_metrics::http_metrics_middleware;
