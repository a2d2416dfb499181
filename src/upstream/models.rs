//! Wire models for the upstream plugin list response.
//!
//! The list endpoint returns `{plugins: [{plugin: {...}}]}` where each plugin
//! carries its OpenAPI document inline under `interface`. Everything beyond
//! the envelope is kept as raw JSON; the translator decides what is usable.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::translate::OpenApiOperation;

/// One upstream plugin as seen by the rest of the gateway.
#[derive(Debug, Clone)]
pub struct PluginCatalogEntry {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Raw OpenAPI document, when the list response embeds it.
    pub document: Option<Value>,
}

/// Top-level plugin list response.
#[derive(Debug, Deserialize)]
pub struct PluginListResponse {
    #[serde(default)]
    pub plugins: Vec<PluginListItem>,
}

#[derive(Debug, Deserialize)]
pub struct PluginListItem {
    #[serde(default)]
    pub plugin: Option<RawPlugin>,
}

#[derive(Debug, Deserialize)]
pub struct RawPlugin {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name_for_model: Option<String>,
    #[serde(default)]
    pub description_for_model: Option<String>,
    #[serde(default)]
    pub interface: Option<Value>,
}

impl PluginListResponse {
    /// Flatten the response envelope into catalog entries, dropping items
    /// with no plugin payload.
    pub fn into_entries(self) -> Vec<PluginCatalogEntry> {
        self.plugins
            .into_iter()
            .filter_map(|item| item.plugin)
            .filter_map(|plugin| {
                let name = plugin
                    .name_for_model
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string());
                let id = plugin.id.unwrap_or_else(|| name.clone());
                if id.is_empty() {
                    warn!("Dropping plugin list entry with empty id");
                    return None;
                }
                Some(PluginCatalogEntry {
                    id,
                    name,
                    description: plugin.description_for_model.unwrap_or_default(),
                    document: plugin.interface,
                })
            })
            .collect()
    }
}

/// Walk a raw OpenAPI document and lift every verb+path pair into an
/// [`OpenApiOperation`].
///
/// Paths or methods that are not objects are skipped with a warning; they
/// cannot carry an operation and must not fail the rest of the document.
pub fn extract_operations(
    plugin_name: &str,
    plugin_description: &str,
    document: &Value,
) -> Vec<OpenApiOperation> {
    let Some(paths) = document.get("paths").and_then(Value::as_object) else {
        warn!("Plugin '{}' document has no usable 'paths' object", plugin_name);
        return Vec::new();
    };

    let mut operations = Vec::new();
    for (path, methods) in paths {
        let Some(methods) = methods.as_object() else {
            warn!("Plugin '{}' path '{}' is not an object, skipping", plugin_name, path);
            continue;
        };
        for (verb, spec) in methods {
            let spec_obj = spec.as_object();
            operations.push(OpenApiOperation {
                plugin: plugin_name.to_string(),
                verb: verb.clone(),
                path: path.clone(),
                operation_id: spec_obj
                    .and_then(|s| s.get("operationId"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                summary: spec_obj
                    .and_then(|s| s.get("summary"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .or_else(|| {
                        if plugin_description.is_empty() {
                            None
                        } else {
                            Some(plugin_description.to_string())
                        }
                    }),
                description: spec_obj
                    .and_then(|s| s.get("description"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                parameters: spec_obj.and_then(|s| s.get("parameters")).cloned(),
                request_body: spec_obj.and_then(|s| s.get("requestBody")).cloned(),
            });
        }
    }
    operations
}
