//! Common test infrastructure
//!
//! This module provides all the infrastructure needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestClient, TestServer, TEST_TOKEN};
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_list_tools() {
//!     let server = TestServer::spawn().await;
//!     let client = TestClient::new(server.base_url.clone());
//!
//!     let body = client.rpc("tools/list", None, Some(TEST_TOKEN)).await;
//!     assert!(body["result"]["tools"].is_array());
//! }
//! ```

mod client;
mod constants;
mod upstream;

pub use client::TestClient;
pub use constants::*;
pub use upstream::{TestServer, TestServerOptions};
