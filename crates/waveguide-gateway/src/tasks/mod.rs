//! Background tasks for the Waveguide gateway.
//!
//! # Tasks
//!
//! - `revocation_sweeper` - Drops revocation entries whose token has expired
//! - `bucket_eviction` - Drops rate-limit buckets that have refilled completely

pub mod bucket_eviction;
pub mod revocation_sweeper;

pub use bucket_eviction::start_bucket_eviction;
pub use revocation_sweeper::start_revocation_sweeper;
