//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with helpers for speaking JSON-RPC to the gateway.
//! When request formats change, update only this file.

use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

use super::constants::*;

/// JSON-RPC test client
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the gateway under test
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    /// POST /mcp with a single request envelope, returning the parsed body.
    pub async fn rpc(&self, method: &str, params: Option<Value>, token: Option<&str>) -> Value {
        let response = self.rpc_response(method, params, token).await;
        response.json().await.expect("Response was not JSON")
    }

    /// POST /mcp with a single request envelope, returning the raw response.
    pub async fn rpc_response(
        &self,
        method: &str,
        params: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut envelope = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
        });
        if let Some(params) = params {
            envelope["params"] = params;
        }
        self.post_envelope(&envelope, token).await
    }

    /// POST /mcp with an arbitrary JSON envelope (object or batch array).
    pub async fn post_envelope(&self, envelope: &Value, token: Option<&str>) -> Response {
        let mut request = self
            .client
            .post(format!("{}/mcp", self.base_url))
            .json(envelope);
        if let Some(token) = token {
            request = request.header("token", token);
        }
        request.send().await.expect("Gateway request failed")
    }

    /// POST /mcp with a raw (possibly invalid) body.
    pub async fn post_raw(&self, body: &str) -> Response {
        self.client
            .post(format!("{}/mcp", self.base_url))
            .header("content-type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .expect("Gateway request failed")
    }

    /// Convenience: tools/call with the given tool name and arguments.
    pub async fn call_tool(&self, name: &str, arguments: Value, token: Option<&str>) -> Value {
        self.rpc(
            "tools/call",
            Some(json!({ "name": name, "arguments": arguments })),
            token,
        )
        .await
    }

    /// GET an arbitrary gateway path.
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("Gateway request failed")
    }

    /// POST an arbitrary gateway path with an optional token header.
    pub async fn post(&self, path: &str, token: Option<&str>) -> Response {
        let mut request = self.client.post(format!("{}{}", self.base_url, path));
        if let Some(token) = token {
            request = request.header("token", token);
        }
        request.send().await.expect("Gateway request failed")
    }
}
