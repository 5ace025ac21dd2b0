//! Waveguide Gateway Library
//!
//! Request admission for the Waveguide record API. Every request passes
//! through the admission gate before any domain handler runs:
//!
//! ```text
//! request -> rate limiter -> revocation check -> token verification -> handler
//! ```
//!
//! # Modules
//!
//! - `auth` - Token codec, claims, revocation store, password hashing
//! - `config` - Service configuration from environment
//! - `directory` - User directory collaborator
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Admission gate and HTTP metrics
//! - `observability` - Metric definitions
//! - `rate_limit` - Per-client token buckets
//! - `routes` - Axum router setup
//! - `tasks` - Revocation sweep and idle bucket eviction

pub mod audit;
pub mod auth;
pub mod config;
pub mod directory;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod rate_limit;
pub mod routes;
pub mod tasks;
