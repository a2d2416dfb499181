//! MCP request handling.
//!
//! The transport is stateless HTTP: every envelope arrives as a JSON value
//! that is either a single request object or a batch array. Credentials are
//! extracted by the server layer and passed in; this module only routes
//! methods and shapes responses.

use serde_json::Value;
use tracing::{debug, warn};

use super::protocol::{
    methods, InitializeResult, McpError, McpRequest, McpResponse, PingResult, RequestId,
    ToolDescriptor, ToolsCallParams, ToolsCallResult, ToolsListResult,
};
use crate::dispatch::ToolCallRequest;
use crate::server::state::GatewayState;
use crate::upstream::Credential;

/// Handle one JSON-RPC envelope. Returns the response value to send, or
/// `None` when the envelope consisted entirely of notifications.
pub async fn handle_envelope(
    state: &GatewayState,
    credential: Option<&Credential>,
    envelope: Value,
) -> Option<Value> {
    match envelope {
        Value::Array(items) => {
            if items.is_empty() {
                let response = McpResponse::error(
                    None,
                    McpError::InvalidRequest("empty batch".to_string()),
                );
                return serde_json::to_value(response).ok();
            }

            let mut responses = Vec::with_capacity(items.len());
            for item in items {
                if let Some(response) = handle_value(state, credential, item).await {
                    responses.push(response);
                }
            }
            if responses.is_empty() {
                None
            } else {
                serde_json::to_value(responses).ok()
            }
        }
        other => {
            let response = handle_value(state, credential, other).await?;
            serde_json::to_value(response).ok()
        }
    }
}

/// Handle a single request object from an envelope.
async fn handle_value(
    state: &GatewayState,
    credential: Option<&Credential>,
    value: Value,
) -> Option<McpResponse> {
    // Pull the id out of the raw value first so malformed requests can still
    // be answered with the right correlation id.
    let raw_id = value
        .get("id")
        .cloned()
        .and_then(|v| serde_json::from_value::<RequestId>(v).ok());

    let request: McpRequest = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(e) => {
            return Some(McpResponse::error(
                raw_id,
                McpError::InvalidRequest(e.to_string()),
            ));
        }
    };

    if request.jsonrpc != super::protocol::JSONRPC_VERSION {
        return Some(McpResponse::error(
            request.id,
            McpError::InvalidRequest(format!("unsupported jsonrpc version: {}", request.jsonrpc)),
        ));
    }

    let Some(request_id) = request.id.clone() else {
        // Notifications never get a response, even when unknown.
        match request.method.as_str() {
            methods::INITIALIZED => debug!("Client completed initialization"),
            other => debug!("Ignoring notification '{}'", other),
        }
        return None;
    };

    let result = match request.method.as_str() {
        methods::INITIALIZE => handle_initialize(state),
        methods::PING => serde_json::to_value(PingResult {})
            .map_err(|e| McpError::InternalError(e.to_string())),
        methods::TOOLS_LIST => handle_tools_list(state, credential).await,
        methods::TOOLS_CALL => handle_tools_call(state, credential, &request).await,
        other => Err(McpError::MethodNotFound(other.to_string())),
    };

    Some(match result {
        Ok(value) => McpResponse::success(request_id, value),
        Err(error) => McpResponse::error(Some(request_id), error),
    })
}

/// Initialize is idempotent: the transport is stateless, so repeated
/// initializations just re-advertise the same capabilities.
fn handle_initialize(state: &GatewayState) -> Result<Value, McpError> {
    let result = InitializeResult::current(&state.server_name, &state.version);
    serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
}

async fn handle_tools_list(
    state: &GatewayState,
    credential: Option<&Credential>,
) -> Result<Value, McpError> {
    let credential = credential.ok_or(McpError::CredentialMissing)?;
    let tools = state.tools_for(credential).await?;

    debug!(
        "Listing {} tools for credential {}",
        tools.len(),
        credential.redacted()
    );

    let result = ToolsListResult {
        tools: tools.iter().map(ToolDescriptor::from).collect(),
    };
    serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
}

async fn handle_tools_call(
    state: &GatewayState,
    credential: Option<&Credential>,
    request: &McpRequest,
) -> Result<Value, McpError> {
    let credential = credential.ok_or(McpError::CredentialMissing)?;

    let params: ToolsCallParams = request
        .params
        .clone()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| McpError::InvalidParams(e.to_string()))?
        .ok_or_else(|| McpError::InvalidParams("Missing params".to_string()))?;

    // Dispatch resolves against the cached definitions only; an expired or
    // absent entry means the client must list tools again first.
    let tools = state.cache.lookup(credential).unwrap_or_default();

    let arguments = match params.arguments {
        None => serde_json::Map::new(),
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(McpError::InvalidParams(
                "arguments must be an object".to_string(),
            ));
        }
    };

    let call = ToolCallRequest {
        name: params.name.clone(),
        arguments,
    };

    let outcome = state.dispatcher.dispatch(credential, &tools, &call).await;
    let result = match outcome {
        Ok(result) => result,
        Err(error) => {
            warn!("Tool call '{}' failed: {}", params.name, error);
            return Err(error.into());
        }
    };

    serde_json::to_value(ToolsCallResult::text(result.body))
        .map_err(|e| McpError::InternalError(e.to_string()))
}
