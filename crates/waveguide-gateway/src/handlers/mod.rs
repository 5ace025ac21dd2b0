//! HTTP request handlers for the Waveguide gateway.

pub mod auth;
pub mod health;
pub mod metrics;

pub use auth::{login, logout, me, register};
pub use health::health_check;
pub use metrics::metrics_handler;
