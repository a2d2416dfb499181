//! MCP (Model Context Protocol) gateway surface.
//!
//! Speaks JSON-RPC 2.0 over stateless HTTP. Tool definitions come from the
//! upstream plugin catalog, scoped to the caller's credential; tool calls are
//! dispatched back to the origin APIs.

pub mod handler;
pub mod protocol;

pub use handler::handle_envelope;
pub use protocol::{McpError, McpRequest, McpResponse};
