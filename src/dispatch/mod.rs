//! Tool call dispatch.
//!
//! Reverses the schema translation: resolves the named tool from the
//! credential's cached definitions, validates the supplied arguments against
//! the recorded parameter specs, re-encodes them onto their query / path /
//! header / body locations and performs the origin HTTP call through the
//! [`HttpClient`] collaborator with a bounded retry.

mod retry;

pub use retry::RetryPolicy;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::translate::{ParamLocation, ToolDefinition};
use crate::upstream::{
    Credential, HttpClient, OriginRequest, OriginResponse, UpstreamError, CREDENTIAL_HEADER,
};

/// A parsed `tools/call` invocation.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub name: String,
    pub arguments: Map<String, Value>,
}

/// Successful origin exchange, before protocol-level wrapping.
#[derive(Debug, Clone)]
pub struct ToolCallResult {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown tool: {0}")]
    ToolNotFound(String),

    #[error("missing required parameter(s): {}", missing.join(", "))]
    InvalidArguments { missing: Vec<String> },

    #[error("origin rejected credential (status {0})")]
    CredentialRejected(u16),

    #[error("origin returned status {status}")]
    OriginError { status: u16, body: String },

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Executes tool calls against the origin APIs.
pub struct DispatchEngine {
    http: Arc<dyn HttpClient>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl DispatchEngine {
    pub fn new(http: Arc<dyn HttpClient>, retry: RetryPolicy, timeout: Duration) -> Self {
        Self {
            http,
            retry,
            timeout,
        }
    }

    /// Dispatch one tool call. `tools` is the credential's cached definition
    /// list; this function never refetches the catalog.
    pub async fn dispatch(
        &self,
        credential: &Credential,
        tools: &[ToolDefinition],
        request: &ToolCallRequest,
    ) -> Result<ToolCallResult, DispatchError> {
        let tool = tools
            .iter()
            .find(|t| t.name == request.name)
            .ok_or_else(|| DispatchError::ToolNotFound(request.name.clone()))?;

        validate_arguments(tool, &request.arguments)?;

        let origin_request = encode_request(tool, credential, &request.arguments, self.timeout);
        debug!(
            "Dispatching tool '{}' as {} {}",
            tool.name,
            origin_request.verb.as_str(),
            origin_request.url
        );

        self.execute_with_retry(origin_request).await
    }

    async fn execute_with_retry(
        &self,
        request: OriginRequest,
    ) -> Result<ToolCallResult, DispatchError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let outcome = self.http.send(request.clone()).await;

            match outcome {
                Ok(response) => {
                    if response.status == 401 || response.status == 403 {
                        return Err(DispatchError::CredentialRejected(response.status));
                    }
                    if !RetryPolicy::is_retryable_status(response.status) {
                        return finish(response);
                    }
                    if attempt >= self.retry.max_attempts {
                        return finish(response);
                    }
                    warn!(
                        "Origin returned status {} for {} (attempt {}/{}), retrying",
                        response.status, request.url, attempt, self.retry.max_attempts
                    );
                }
                Err(error) => {
                    let transient = matches!(
                        error,
                        UpstreamError::Timeout | UpstreamError::Unavailable(_)
                    );
                    if !transient || attempt >= self.retry.max_attempts {
                        return Err(error.into());
                    }
                    warn!(
                        "Origin call to {} failed (attempt {}/{}): {}, retrying",
                        request.url, attempt, self.retry.max_attempts, error
                    );
                }
            }

            tokio::time::sleep(self.retry.delay_for(attempt)).await;
        }
    }
}

fn finish(response: OriginResponse) -> Result<ToolCallResult, DispatchError> {
    if (200..300).contains(&response.status) {
        Ok(ToolCallResult {
            status: response.status,
            body: response.body,
        })
    } else {
        Err(DispatchError::OriginError {
            status: response.status,
            body: response.body,
        })
    }
}

/// Required parameters must be present and non-null. Path parameters are
/// always required regardless of their declared flag, since an omitted one
/// would leave its `{placeholder}` literal in the dispatched URL. Unknown
/// supplied keys are ignored for forward compatibility.
fn validate_arguments(
    tool: &ToolDefinition,
    arguments: &Map<String, Value>,
) -> Result<(), DispatchError> {
    let missing: Vec<String> = tool
        .dispatch
        .params
        .iter()
        .filter(|p| p.required || p.location == ParamLocation::Path)
        .filter(|p| matches!(arguments.get(&p.name), None | Some(Value::Null)))
        .map(|p| p.name.clone())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(DispatchError::InvalidArguments { missing })
    }
}

/// Place each argument onto its recorded location and build the origin
/// request. Body-style tools send every supplied argument as one JSON object,
/// mirroring what the advertised schema asked for.
fn encode_request(
    tool: &ToolDefinition,
    credential: &Credential,
    arguments: &Map<String, Value>,
    timeout: Duration,
) -> OriginRequest {
    let mut headers = vec![(CREDENTIAL_HEADER.to_string(), credential.as_str().to_string())];
    let mut url = tool.dispatch.url_template.clone();
    let mut query_pairs: Vec<(String, String)> = Vec::new();
    let mut body: Option<Value> = None;

    if tool.dispatch.verb.is_body_style() {
        body = Some(Value::Object(arguments.clone()));
    } else {
        for param in &tool.dispatch.params {
            let Some(value) = arguments.get(&param.name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let rendered = render_value(value);
            match param.location {
                ParamLocation::Query => query_pairs.push((param.name.clone(), rendered)),
                ParamLocation::Path => {
                    url = url.replace(&format!("{{{}}}", param.name), &rendered);
                }
                ParamLocation::Header => headers.push((param.name.clone(), rendered)),
                // Body locations do not occur on parameter-style tools.
                ParamLocation::Body => body
                    .get_or_insert_with(|| Value::Object(Map::new()))
                    .as_object_mut()
                    .map(|o| o.insert(param.name.clone(), value.clone()))
                    .map(|_| ())
                    .unwrap_or(()),
            }
        }

        if !query_pairs.is_empty() {
            let encoded: Vec<String> = query_pairs
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect();
            url = format!("{}?{}", url, encoded.join("&"));
        }
    }

    OriginRequest {
        verb: tool.dispatch.verb,
        url,
        headers,
        body,
        timeout,
    }
}

/// JSON strings go on the wire bare; everything else keeps its JSON
/// rendering.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
