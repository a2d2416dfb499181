use axum::extract::FromRef;

use std::sync::Arc;
use std::time::Instant;

use crate::cache::CredentialCache;
use crate::config::GatewayConfig;
use crate::dispatch::DispatchEngine;
use crate::translate::ToolDefinition;
use crate::upstream::{load_tools, CatalogFetcher, Credential, UpstreamError};

pub type GuardedCache = Arc<CredentialCache>;
pub type GuardedFetcher = Arc<dyn CatalogFetcher>;
pub type GuardedDispatcher = Arc<DispatchEngine>;

#[derive(Clone)]
pub struct GatewayState {
    pub config: GatewayConfig,
    pub start_time: Instant,
    pub cache: GuardedCache,
    pub fetcher: GuardedFetcher,
    pub dispatcher: GuardedDispatcher,
    pub server_name: String,
    pub version: String,
}

impl GatewayState {
    pub fn new(
        config: GatewayConfig,
        cache: GuardedCache,
        fetcher: GuardedFetcher,
        dispatcher: GuardedDispatcher,
    ) -> Self {
        let server_name = config.server_name.clone();
        Self {
            config,
            start_time: Instant::now(),
            cache,
            fetcher,
            dispatcher,
            server_name,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Tool definitions for a credential, populated through the cache.
    pub async fn tools_for(
        &self,
        credential: &Credential,
    ) -> Result<Arc<Vec<ToolDefinition>>, UpstreamError> {
        self.cache
            .get_or_populate(credential, || {
                load_tools(
                    self.fetcher.as_ref(),
                    credential,
                    &self.config.upstream_base,
                )
            })
            .await
    }
}

impl FromRef<GatewayState> for GuardedCache {
    fn from_ref(input: &GatewayState) -> Self {
        input.cache.clone()
    }
}

impl FromRef<GatewayState> for GatewayConfig {
    fn from_ref(input: &GatewayState) -> Self {
        input.config.clone()
    }
}
