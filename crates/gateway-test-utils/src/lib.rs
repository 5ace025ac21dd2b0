//! # Gateway Test Utilities
//!
//! Shared test utilities for the Waveguide gateway.
//!
//! This crate provides:
//! - Server test harness (`TestGatewayServer` for E2E tests)
//! - Account helpers for registering and logging in test users
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gateway_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<()> {
//!     let server = TestGatewayServer::spawn().await?;
//!     let client = reqwest::Client::new();
//!
//!     let response = client
//!         .get(format!("{}/health", server.url()))
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod server_harness;

// Re-export commonly used items
pub use server_harness::{TestAccount, TestGatewayServer, TEST_JWT_SECRET};
