//! End-to-end tests for the JSON-RPC protocol surface.

mod common;

use common::{TestClient, TestServer};
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn test_initialize_returns_server_info() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let body = client.rpc("initialize", None, None).await;

    assert_eq!(body["jsonrpc"], "2.0");
    assert_eq!(body["id"], 1);
    assert_eq!(body["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(body["result"]["serverInfo"]["name"], "plugin-mcp-gateway");
    assert!(body["result"]["capabilities"]["tools"].is_object());
}

#[tokio::test]
async fn test_initialize_is_idempotent() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let first = client.rpc("initialize", None, None).await;
    let second = client.rpc("initialize", None, None).await;

    assert_eq!(first["result"], second["result"]);
}

#[tokio::test]
async fn test_ping() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let body = client.rpc("ping", None, None).await;

    assert!(body["result"].is_object());
    assert!(body["error"].is_null());
}

#[tokio::test]
async fn test_unknown_method() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let body = client.rpc("tools/unknown", None, None).await;

    assert_eq!(body["error"]["code"], -32601);
}

#[tokio::test]
async fn test_unparseable_body_is_400_with_parse_error() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.post_raw("{definitely not json").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], -32700);
}

#[tokio::test]
async fn test_wrong_jsonrpc_version_is_invalid_request() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client
        .post_envelope(&json!({"jsonrpc": "1.0", "id": 7, "method": "ping"}), None)
        .await;
    let body: serde_json::Value = response.json().await.unwrap();

    assert_eq!(body["error"]["code"], -32600);
    assert_eq!(body["id"], 7);
}

#[tokio::test]
async fn test_notification_gets_no_content() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client
        .post_envelope(
            &json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            None,
        )
        .await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_batch_envelope_skips_notifications() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client
        .post_envelope(
            &json!([
                {"jsonrpc": "2.0", "id": 1, "method": "ping"},
                {"jsonrpc": "2.0", "method": "notifications/initialized"},
                {"jsonrpc": "2.0", "id": 2, "method": "nope"}
            ]),
            None,
        )
        .await;

    let body: serde_json::Value = response.json().await.unwrap();
    let responses = body.as_array().unwrap();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["id"], 1);
    assert!(responses[0]["result"].is_object());
    assert_eq!(responses[1]["id"], 2);
    assert_eq!(responses[1]["error"]["code"], -32601);
}

#[tokio::test]
async fn test_empty_batch_is_invalid_request() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.post_envelope(&json!([]), None).await;
    let body: serde_json::Value = response.json().await.unwrap();

    assert_eq!(body["error"]["code"], -32600);
}

#[tokio::test]
async fn test_string_request_ids_are_echoed() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client
        .post_envelope(
            &json!({"jsonrpc": "2.0", "id": "req-abc", "method": "ping"}),
            None,
        )
        .await;
    let body: serde_json::Value = response.json().await.unwrap();

    assert_eq!(body["id"], "req-abc");
}

#[tokio::test]
async fn test_session_header_is_echoed() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client
        .client
        .post(format!("{}/mcp", server.base_url))
        .header("Mcp-Session-Id", "my-session")
        .json(&json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}))
        .send()
        .await
        .unwrap();

    assert_eq!(
        response.headers().get("Mcp-Session-Id").unwrap(),
        "my-session"
    );
}

#[tokio::test]
async fn test_session_header_is_generated() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.rpc_response("ping", None, None).await;
    let session = response
        .headers()
        .get("Mcp-Session-Id")
        .expect("missing session header");

    assert!(!session.to_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_capability_probe() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.get("/mcp").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["protocolVersion"], "2024-11-05");
    assert!(body["methods"]
        .as_array()
        .unwrap()
        .contains(&json!("tools/call")));
}

#[tokio::test]
async fn test_health() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["server"], "plugin-mcp-gateway");
}
