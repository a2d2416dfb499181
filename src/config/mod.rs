mod file_config;

pub use file_config::{FileConfig, RetryConfig};

use std::time::Duration;

use anyhow::{bail, Result};

/// Default upstream catalog base URL.
pub const DEFAULT_UPSTREAM_BASE: &str = "https://superiorapis-creator.cteam.com.tw";

/// Default path of the plugin list endpoint on the upstream.
pub const DEFAULT_PLUGINS_LIST_PATH: &str = "/manager/module/plugins/list_v3";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub port: u16,
    pub upstream_base: Option<String>,
    pub plugins_list_path: Option<String>,
    pub cache_ttl_sec: u64,
    pub request_timeout_sec: u64,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            upstream_base: None,
            plugins_list_path: None,
            cache_ttl_sec: 3600,
            request_timeout_sec: 30,
            retry_max_attempts: 3,
            retry_base_delay_ms: 250,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub port: u16,
    pub upstream_base: String,
    pub plugins_list_path: String,
    pub cache_ttl_sec: u64,
    pub request_timeout_sec: u64,
    pub server_name: String,
    pub retry: RetrySettings,
}

#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl GatewayConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let port = file.port.unwrap_or(cli.port);

        let upstream_base = file
            .upstream_base
            .or_else(|| cli.upstream_base.clone())
            .unwrap_or_else(|| DEFAULT_UPSTREAM_BASE.to_string());
        if !upstream_base.starts_with("http://") && !upstream_base.starts_with("https://") {
            bail!("upstream_base must be an http(s) URL: {}", upstream_base);
        }

        let plugins_list_path = file
            .plugins_list_path
            .or_else(|| cli.plugins_list_path.clone())
            .unwrap_or_else(|| DEFAULT_PLUGINS_LIST_PATH.to_string());

        let cache_ttl_sec = file.cache_ttl_sec.unwrap_or(cli.cache_ttl_sec);
        if cache_ttl_sec == 0 {
            bail!("cache_ttl_sec must be greater than zero");
        }

        let request_timeout_sec = file.request_timeout_sec.unwrap_or(cli.request_timeout_sec);
        if request_timeout_sec == 0 {
            bail!("request_timeout_sec must be greater than zero");
        }

        let server_name = file
            .server_name
            .unwrap_or_else(|| "plugin-mcp-gateway".to_string());

        let retry_file = file.retry.unwrap_or_default();
        let retry = RetrySettings {
            max_attempts: retry_file.max_attempts.unwrap_or(cli.retry_max_attempts),
            base_delay_ms: retry_file.base_delay_ms.unwrap_or(cli.retry_base_delay_ms),
        };

        Ok(Self {
            port,
            upstream_base,
            plugins_list_path,
            cache_ttl_sec,
            request_timeout_sec,
            server_name,
            retry,
        })
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_sec)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_sec)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry.base_delay_ms)
    }
}
