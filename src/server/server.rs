use anyhow::Result;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::mcp;
use crate::mcp::protocol::{McpError, McpResponse, MCP_PROTOCOL_VERSION};

use super::credential::MaybeCredential;
use super::state::GatewayState;

/// Session correlation header, echoed back on every `/mcp` response.
pub const SESSION_HEADER: &str = "Mcp-Session-Id";

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    server: String,
    version: String,
    uptime: String,
    cached_credentials: usize,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

fn session_id(headers: &HeaderMap) -> String {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn with_session(mut response: Response, session: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(session) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}

/// POST /mcp: one JSON-RPC envelope in, one response envelope out.
/// Notification-only envelopes get 204.
async fn post_mcp(
    State(state): State<GatewayState>,
    MaybeCredential(credential): MaybeCredential,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let session = session_id(&headers);

    let envelope: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            debug!("Rejecting unparseable envelope: {}", e);
            let response = McpResponse::error(None, McpError::ParseError(e.to_string()));
            return with_session(
                (StatusCode::BAD_REQUEST, Json(response)).into_response(),
                &session,
            );
        }
    };

    let response = match mcp::handle_envelope(&state, credential.as_ref(), envelope).await {
        Some(value) => Json(value).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    };
    with_session(response, &session)
}

/// GET /mcp: capability probe for clients that check the endpoint before
/// speaking JSON-RPC.
async fn get_mcp(State(state): State<GatewayState>, headers: HeaderMap) -> Response {
    let session = session_id(&headers);
    let payload = json!({
        "protocolVersion": MCP_PROTOCOL_VERSION,
        "serverInfo": {
            "name": state.server_name,
            "version": state.version,
        },
        "transport": "http",
        "methods": ["initialize", "tools/list", "tools/call", "ping"],
    });
    with_session(Json(payload).into_response(), &session)
}

async fn health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        server: state.server_name.clone(),
        version: state.version.clone(),
        uptime: format_uptime(state.start_time.elapsed()),
        cached_credentials: state.cache.len(),
    })
}

async fn cache_status(State(state): State<GatewayState>) -> Response {
    Json(state.cache.status()).into_response()
}

/// POST /cache/invalidate: with a credential, drop that entry; without one,
/// drop everything.
async fn cache_invalidate(
    State(state): State<GatewayState>,
    MaybeCredential(credential): MaybeCredential,
) -> Response {
    let invalidated = match credential {
        Some(credential) => {
            let existed = state.cache.invalidate(&credential);
            info!(
                "Cache invalidation requested for credential {} (existed: {})",
                credential.redacted(),
                existed
            );
            usize::from(existed)
        }
        None => {
            let count = state.cache.clear();
            info!("Full cache invalidation requested ({} entries)", count);
            count
        }
    };
    Json(json!({ "invalidated": invalidated })).into_response()
}

pub fn make_app(state: GatewayState) -> Router {
    Router::new()
        .route("/mcp", post(post_mcp))
        .route("/mcp", get(get_mcp))
        .route("/health", get(health))
        .route("/cache/status", get(cache_status))
        .route("/cache/invalidate", post(cache_invalidate))
        .with_state(state)
}

pub async fn run_server(state: GatewayState) -> Result<()> {
    let port = state.config.port;
    let app = make_app(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Listening on 0.0.0.0:{}", port);

    Ok(axum::serve(listener, app).await?)
}
