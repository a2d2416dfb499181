//! Test server lifecycle management
//!
//! Spawns two servers per test: a mock upstream that serves the plugin list
//! and plays the origin APIs, and the gateway under test pointed at it. Both
//! listen on random ports and shut down when the [`TestServer`] is dropped.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use plugin_mcp_gateway::config::{CliConfig, GatewayConfig};
use plugin_mcp_gateway::dispatch::{DispatchEngine, RetryPolicy};
use plugin_mcp_gateway::server::make_app;
use plugin_mcp_gateway::{
    CredentialCache, GatewayState, ReqwestHttpClient, UpstreamClient,
};

use super::constants::*;

/// Request counters exposed to tests.
#[derive(Default)]
pub struct UpstreamCounters {
    pub list_calls: AtomicUsize,
    pub news_calls: AtomicUsize,
    pub stock_calls: AtomicUsize,
    pub flaky_calls: AtomicUsize,
}

#[derive(Clone)]
struct MockUpstreamState {
    counters: Arc<UpstreamCounters>,
    /// Remaining 503 responses for the flaky endpoint.
    flaky_failures: Arc<AtomicUsize>,
}

fn credential_of(headers: &HeaderMap) -> Option<String> {
    headers
        .get("token")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn authorized(headers: &HeaderMap) -> bool {
    matches!(credential_of(headers).as_deref(), Some(t) if t != BAD_TOKEN)
}

fn plugin_catalog() -> Value {
    json!({
        "plugins": [
            {
                "plugin": {
                    "id": "p-news",
                    "name_for_model": "news",
                    "description_for_model": "Taiwan news lookups",
                    "interface": {
                        "paths": {
                            "/news/popular": {
                                "get": {
                                    "operationId": "popular_news",
                                    "summary": "Popular news",
                                    "parameters": [
                                        {
                                            "name": "count",
                                            "in": "query",
                                            "required": false,
                                            "schema": {
                                                "type": "integer",
                                                "description": "How many items to return"
                                            }
                                        }
                                    ]
                                }
                            }
                        }
                    }
                }
            },
            {
                "plugin": {
                    "id": "p-stock",
                    "name_for_model": "stock",
                    "description_for_model": "Stock market data",
                    "interface": {
                        "paths": {
                            "/stock/details": {
                                "post": {
                                    "operationId": "stock_details",
                                    "summary": "Stock details",
                                    "requestBody": {
                                        "content": {
                                            "application/json": {
                                                "schema": {
                                                    "type": "object",
                                                    "required": ["symbol"],
                                                    "properties": {
                                                        "symbol": {
                                                            "type": "string",
                                                            "description": "Ticker symbol"
                                                        },
                                                        "market": {
                                                            "type": "string",
                                                            "enum": ["TWSE", "TPEX"]
                                                        }
                                                    }
                                                }
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            },
            {
                "plugin": {
                    "id": "p-flaky",
                    "name_for_model": "flaky",
                    "description_for_model": "Occasionally unavailable service",
                    "interface": {
                        "paths": {
                            "/flaky/status": {
                                "get": {
                                    "operationId": "flaky_status",
                                    "summary": "Flaky status"
                                }
                            }
                        }
                    }
                }
            }
        ]
    })
}

async fn list_plugins(State(state): State<MockUpstreamState>, headers: HeaderMap) -> Response {
    state.counters.list_calls.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(plugin_catalog()).into_response()
}

async fn popular_news(
    State(state): State<MockUpstreamState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    state.counters.news_calls.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({
        "news": ["headline one", "headline two"],
        "query": query,
    }))
    .into_response()
}

async fn stock_details(
    State(state): State<MockUpstreamState>,
    headers: HeaderMap,
    body: Json<Value>,
) -> Response {
    state.counters.stock_calls.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({ "received": body.0 })).into_response()
}

async fn flaky_status(State(state): State<MockUpstreamState>) -> Response {
    state.counters.flaky_calls.fetch_add(1, Ordering::SeqCst);
    let remaining = state.flaky_failures.load(Ordering::SeqCst);
    if remaining > 0 {
        state.flaky_failures.fetch_sub(1, Ordering::SeqCst);
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    Json(json!({ "status": "recovered" })).into_response()
}

fn make_mock_upstream(state: MockUpstreamState) -> Router {
    Router::new()
        .route("/manager/module/plugins/list_v3", post(list_plugins))
        .route("/news/popular", get(popular_news))
        .route("/stock/details", post(stock_details))
        .route("/flaky/status", get(flaky_status))
        .with_state(state)
}

/// Knobs for gateway behavior under test.
pub struct TestServerOptions {
    pub cache_ttl: Duration,
    pub retry_max_attempts: u32,
    /// Initial 503s served by the flaky origin endpoint.
    pub flaky_failures: usize,
}

impl Default for TestServerOptions {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(3600),
            retry_max_attempts: 3,
            flaky_failures: 0,
        }
    }
}

/// Gateway plus mock upstream, both on random ports.
///
/// When dropped, both servers shut down gracefully.
pub struct TestServer {
    /// Base URL of the gateway (e.g. "http://127.0.0.1:12345")
    pub base_url: String,

    /// Base URL of the mock upstream.
    pub upstream_base_url: String,

    /// Upstream request counters for assertions.
    pub counters: Arc<UpstreamCounters>,

    _shutdown_gateway: Option<tokio::sync::oneshot::Sender<()>>,
    _shutdown_upstream: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        Self::spawn_with(TestServerOptions::default()).await
    }

    pub async fn spawn_with(options: TestServerOptions) -> Self {
        let counters = Arc::new(UpstreamCounters::default());
        let mock_state = MockUpstreamState {
            counters: counters.clone(),
            flaky_failures: Arc::new(AtomicUsize::new(options.flaky_failures)),
        };

        // Mock upstream first, the gateway needs its address.
        let upstream_listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock upstream port");
        let upstream_base_url = format!(
            "http://127.0.0.1:{}",
            upstream_listener.local_addr().unwrap().port()
        );
        let (upstream_tx, upstream_rx) = tokio::sync::oneshot::channel::<()>();
        let upstream_app = make_mock_upstream(mock_state);
        tokio::spawn(async move {
            axum::serve(upstream_listener, upstream_app)
                .with_graceful_shutdown(async {
                    upstream_rx.await.ok();
                })
                .await
                .expect("Mock upstream failed");
        });

        let gateway_listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind gateway port");
        let port = gateway_listener.local_addr().unwrap().port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let cli = CliConfig {
            port,
            upstream_base: Some(upstream_base_url.clone()),
            cache_ttl_sec: options.cache_ttl.as_secs().max(1),
            request_timeout_sec: REQUEST_TIMEOUT_SECS,
            retry_max_attempts: options.retry_max_attempts,
            retry_base_delay_ms: 10,
            ..Default::default()
        };
        let config = GatewayConfig::resolve(&cli, None).expect("Failed to resolve config");

        let fetcher = Arc::new(UpstreamClient::new(
            &config.upstream_base,
            &config.plugins_list_path,
            config.request_timeout(),
        ));
        let dispatcher = Arc::new(DispatchEngine::new(
            Arc::new(ReqwestHttpClient::new()),
            RetryPolicy::new(config.retry.max_attempts, config.retry_base_delay()),
            config.request_timeout(),
        ));
        // Sub-second TTLs for expiry tests.
        let cache = Arc::new(CredentialCache::new(options.cache_ttl));

        let state = GatewayState::new(config, cache, fetcher, dispatcher);
        let app = make_app(state);

        let (gateway_tx, gateway_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(gateway_listener, app)
                .with_graceful_shutdown(async {
                    gateway_rx.await.ok();
                })
                .await
                .expect("Gateway failed");
        });

        let server = Self {
            base_url,
            upstream_base_url,
            counters,
            _shutdown_gateway: Some(gateway_tx),
            _shutdown_upstream: Some(upstream_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the gateway to become ready by polling /health
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client
                .get(format!("{}/health", self.base_url))
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_gateway.take() {
            let _ = tx.send(());
        }
        if let Some(tx) = self._shutdown_upstream.take() {
            let _ = tx.send(());
        }
    }
}
