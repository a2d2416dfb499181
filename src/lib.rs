//! Plugin MCP Gateway Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod mcp;
pub mod server;
pub mod translate;
pub mod upstream;

// Re-export commonly used types for convenience
pub use cache::CredentialCache;
pub use config::{CliConfig, GatewayConfig};
pub use dispatch::{DispatchEngine, RetryPolicy};
pub use server::{make_app, run_server, GatewayState};
pub use translate::ToolDefinition;
pub use upstream::{Credential, ReqwestHttpClient, UpstreamClient};
