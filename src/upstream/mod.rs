//! Upstream plugin catalog and origin HTTP access.
//!
//! The gateway talks to two upstream surfaces: the plugin list endpoint that
//! describes what a credential may call, and the origin APIs themselves when
//! a tool is dispatched. Both are behind traits so tests can swap in fakes.

mod client;
mod models;

pub use client::{ReqwestHttpClient, UpstreamClient};
pub use models::{extract_operations, PluginCatalogEntry, PluginListResponse};

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::translate::{self, OpenApiOperation, ToolDefinition, Verb};

/// Header carrying the credential on every upstream request.
pub const CREDENTIAL_HEADER: &str = "token";

/// Opaque bearer credential supplied per request.
///
/// Identity key for cache partitioning. Never persisted, and never logged in
/// full: use [`Credential::redacted`] anywhere a credential reaches a log
/// line or a status payload.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 characters followed by an ellipsis, safe for logs and status.
    pub fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(8).collect();
        format!("{}...", prefix)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.redacted())
    }
}

/// Errors talking to the upstream catalog or origin APIs.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    #[error("upstream request timed out")]
    Timeout,

    #[error("upstream rejected credential (status {0})")]
    Rejected(u16),

    #[error("malformed catalog: {0}")]
    MalformedCatalog(String),

    #[error("unknown plugin '{0}' in upstream catalog")]
    UnknownPlugin(String),
}

/// Retrieves the plugin catalog for a credential.
#[async_trait]
pub trait CatalogFetcher: Send + Sync {
    /// Fetch the list of plugins visible to this credential.
    async fn fetch_plugin_list(
        &self,
        credential: &Credential,
    ) -> Result<Vec<PluginCatalogEntry>, UpstreamError>;

    /// Fetch the OpenAPI operations of a single plugin.
    async fn fetch_openapi_doc(
        &self,
        credential: &Credential,
        plugin_id: &str,
    ) -> Result<Vec<OpenApiOperation>, UpstreamError>;
}

/// A request to an origin API, already fully encoded.
#[derive(Debug, Clone)]
pub struct OriginRequest {
    pub verb: Verb,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    pub timeout: Duration,
}

/// Raw origin response. Status interpretation is the dispatcher's job.
#[derive(Debug, Clone)]
pub struct OriginResponse {
    pub status: u16,
    pub body: String,
}

/// Performs a single origin HTTP exchange.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: OriginRequest) -> Result<OriginResponse, UpstreamError>;
}

/// Fetch and translate the full tool catalog for a credential.
///
/// Plugin list entries usually embed their OpenAPI document; entries that
/// come back without one are resolved through
/// [`CatalogFetcher::fetch_openapi_doc`]. Single-operation translation
/// failures are skipped inside [`translate::translate_all`], so a partially
/// malformed catalog still yields the healthy remainder.
pub async fn load_tools(
    fetcher: &dyn CatalogFetcher,
    credential: &Credential,
    base_url: &str,
) -> Result<Vec<ToolDefinition>, UpstreamError> {
    let entries = fetcher.fetch_plugin_list(credential).await?;
    debug!(
        "Fetched {} plugin(s) for credential {}",
        entries.len(),
        credential.redacted()
    );

    let mut operations = Vec::new();
    for entry in &entries {
        match &entry.document {
            Some(document) => {
                operations.extend(extract_operations(&entry.name, &entry.description, document));
            }
            None => {
                let ops = fetcher.fetch_openapi_doc(credential, &entry.id).await?;
                operations.extend(ops);
            }
        }
    }

    let tools = translate::translate_all(&operations, base_url);
    debug!(
        "Translated {} operation(s) into {} tool(s) for credential {}",
        operations.len(),
        tools.len(),
        credential.redacted()
    );
    Ok(tools)
}
