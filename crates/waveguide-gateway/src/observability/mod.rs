//! Observability for the Waveguide gateway.
//!
//! Metric definitions and recording helpers. Tracing is initialised in `main`.

pub mod metrics;
