//! Common utilities and types shared across Waveguide components.

#![warn(clippy::pedantic)]

/// Module for time sources (wall clock and manually driven test clock)
pub mod clock;

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT inspection utilities (size limits, header/payload peeking, iat skew)
pub mod jwt;
