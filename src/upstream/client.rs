//! HTTP clients for the upstream catalog and origin APIs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use tracing::debug;

use super::{
    extract_operations, CatalogFetcher, Credential, HttpClient, OriginRequest, OriginResponse,
    PluginCatalogEntry, PluginListResponse, UpstreamError, CREDENTIAL_HEADER,
};
use crate::translate::{OpenApiOperation, Verb};

/// Client for the upstream plugin list endpoint.
pub struct UpstreamClient {
    client: reqwest::Client,
    list_url: String,
}

impl UpstreamClient {
    /// Create a new upstream client.
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the upstream service
    /// * `list_path` - Path of the plugin list endpoint
    /// * `timeout` - Request timeout for catalog fetches
    pub fn new(base_url: &str, list_path: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        let list_url = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            list_path.trim_start_matches('/')
        );

        Self { client, list_url }
    }

    fn map_send_error(e: reqwest::Error) -> UpstreamError {
        if e.is_timeout() {
            UpstreamError::Timeout
        } else {
            UpstreamError::Unavailable(e.to_string())
        }
    }
}

#[async_trait]
impl CatalogFetcher for UpstreamClient {
    async fn fetch_plugin_list(
        &self,
        credential: &Credential,
    ) -> Result<Vec<PluginCatalogEntry>, UpstreamError> {
        debug!(
            "Fetching plugin list for credential {}",
            credential.redacted()
        );

        // The list endpoint is a POST with an empty JSON body; the credential
        // rides in a header.
        let response = self
            .client
            .post(&self.list_url)
            .header(CREDENTIAL_HEADER, credential.as_str())
            .json(&json!({}))
            .send()
            .await
            .map_err(Self::map_send_error)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(UpstreamError::Rejected(status.as_u16()));
        }
        if !status.is_success() {
            return Err(UpstreamError::Unavailable(format!(
                "plugin list returned status {}",
                status
            )));
        }

        let parsed: PluginListResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::MalformedCatalog(e.to_string()))?;

        Ok(parsed.into_entries())
    }

    async fn fetch_openapi_doc(
        &self,
        credential: &Credential,
        plugin_id: &str,
    ) -> Result<Vec<OpenApiOperation>, UpstreamError> {
        // The upstream has no per-plugin document endpoint; re-read the list
        // and pull the document out of the matching entry.
        let entries = self.fetch_plugin_list(credential).await?;
        let entry = entries
            .into_iter()
            .find(|e| e.id == plugin_id)
            .ok_or_else(|| UpstreamError::UnknownPlugin(plugin_id.to_string()))?;

        let document = entry.document.ok_or_else(|| {
            UpstreamError::MalformedCatalog(format!("plugin '{}' has no OpenAPI document", plugin_id))
        })?;

        Ok(extract_operations(&entry.name, &entry.description, &document))
    }
}

/// [`HttpClient`] backed by reqwest, used for dispatching tool calls.
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        // Per-request timeouts come from the OriginRequest itself.
        let client = reqwest::Client::builder()
            .build()
            .expect("Failed to create HTTP client");
        Self { client }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(&self, request: OriginRequest) -> Result<OriginResponse, UpstreamError> {
        let method = match request.verb {
            Verb::Get => reqwest::Method::GET,
            Verb::Delete => reqwest::Method::DELETE,
            Verb::Post => reqwest::Method::POST,
            Verb::Put => reqwest::Method::PUT,
            Verb::Patch => reqwest::Method::PATCH,
        };

        let mut builder = self
            .client
            .request(method, &request.url)
            .timeout(request.timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                UpstreamError::Timeout
            } else {
                UpstreamError::Unavailable(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| UpstreamError::Unavailable(e.to_string()))?;

        Ok(OriginResponse { status, body })
    }
}
