//! OpenAPI operation to MCP tool schema translation.
//!
//! This is a pure transformation: no I/O, no state. Each OpenAPI verb+path
//! pair becomes one [`ToolDefinition`] carrying both the client-facing input
//! schema and the metadata needed to reverse the translation at dispatch time.
//!
//! Verb classes:
//! - GET and DELETE are *parameter-style*: the `parameters` array of the
//!   operation is advertised as-is.
//! - POST, PUT and PATCH are *body-style*: the JSON schema embedded at
//!   `requestBody.content["application/json"].schema` is advertised, and its
//!   properties become body-located parameters for dispatch.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

/// HTTP verbs the translator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Delete,
    Post,
    Put,
    Patch,
}

impl Verb {
    /// Parse a verb from its OpenAPI method key. Case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Some(Verb::Get),
            "delete" => Some(Verb::Delete),
            "post" => Some(Verb::Post),
            "put" => Some(Verb::Put),
            "patch" => Some(Verb::Patch),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Delete => "DELETE",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
        }
    }

    fn as_lower(&self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::Delete => "delete",
            Verb::Post => "post",
            Verb::Put => "put",
            Verb::Patch => "patch",
        }
    }

    /// POST/PUT/PATCH carry their arguments in a JSON body.
    pub fn is_body_style(&self) -> bool {
        matches!(self, Verb::Post | Verb::Put | Verb::Patch)
    }
}

/// One HTTP verb+path pair lifted from a plugin's OpenAPI document.
///
/// The `parameters` and `request_body` fields are kept as raw JSON; parsing
/// them is the translator's job so that a malformed operation only fails
/// itself, never the batch.
#[derive(Debug, Clone)]
pub struct OpenApiOperation {
    /// Plugin the operation belongs to, for logging and descriptions.
    pub plugin: String,
    /// Raw method key from the document, e.g. "get" or "POST".
    pub verb: String,
    /// Path template, e.g. `/news/popular` or `/widgets/{id}`.
    pub path: String,
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    /// Raw OpenAPI `parameters` array, if any.
    pub parameters: Option<Value>,
    /// Raw OpenAPI `requestBody` object, if any.
    pub request_body: Option<Value>,
}

/// Where an argument is placed when the tool call is reversed into an HTTP
/// request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Query,
    Path,
    Header,
    Body,
}

/// Value schema advertised for a single parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ValueSchema {
    fn opaque_string() -> Self {
        Self {
            schema_type: "string".to_string(),
            description: None,
        }
    }
}

/// One parameter of a tool, with the location it maps back to.
///
/// Serializes in the OpenAPI parameter shape so clients that introspect the
/// raw schema see the original structure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "in")]
    pub location: ParamLocation,
    pub required: bool,
    pub schema: ValueSchema,
}

/// Input schema advertised to MCP clients. The shape mirrors the verb class
/// rather than flattening both into one generic form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolInputSchema {
    Parameters {
        summary: String,
        parameters: Vec<ParameterSpec>,
    },
    Body {
        summary: String,
        #[serde(rename = "requestBody", skip_serializing_if = "Option::is_none")]
        request_body: Option<Value>,
    },
}

/// Metadata needed to rebuild the origin HTTP request from call arguments.
#[derive(Debug, Clone)]
pub struct DispatchMeta {
    pub verb: Verb,
    /// Absolute URL template, `{name}` placeholders for path parameters.
    pub url_template: String,
    /// Ordered parameters with their recorded locations.
    pub params: Vec<ParameterSpec>,
}

/// The externally visible MCP tool plus its internal dispatch metadata.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: ToolInputSchema,
    pub dispatch: DispatchMeta,
}

/// Errors translating a single operation. These fail only the operation they
/// occur in; the rest of the catalog is still served.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TranslateError {
    #[error("unsupported verb '{verb}' for {path}")]
    UnsupportedVerb { verb: String, path: String },

    #[error("malformed schema for {path}: {reason}")]
    MalformedSchema { path: String, reason: String },
}

/// Translate one OpenAPI operation into a tool definition.
///
/// Total and side-effect-free: the same operation always yields the same
/// tool name and schema. `base_url` is prepended to the operation path to
/// form the dispatch URL template.
pub fn translate(op: &OpenApiOperation, base_url: &str) -> Result<ToolDefinition, TranslateError> {
    let verb = Verb::parse(&op.verb).ok_or_else(|| TranslateError::UnsupportedVerb {
        verb: op.verb.clone(),
        path: op.path.clone(),
    })?;

    let summary = op.summary.clone().unwrap_or_default();
    let description = op
        .summary
        .clone()
        .or_else(|| op.description.clone())
        .unwrap_or_default();

    let (input_schema, params) = if verb.is_body_style() {
        translate_body_style(op, summary)?
    } else {
        translate_parameter_style(op, summary)?
    };

    let url_template = format!("{}{}", base_url.trim_end_matches('/'), op.path);

    Ok(ToolDefinition {
        name: derive_tool_name(verb, op),
        description,
        input_schema,
        dispatch: DispatchMeta {
            verb,
            url_template,
            params,
        },
    })
}

/// Translate a whole catalog worth of operations, skipping the ones that fail.
///
/// Collisions on the derived tool name are resolved last-wins in document
/// order; both sides are named in the log so the shadowing is visible.
pub fn translate_all(ops: &[OpenApiOperation], base_url: &str) -> Vec<ToolDefinition> {
    let mut tools: Vec<ToolDefinition> = Vec::with_capacity(ops.len());

    for op in ops {
        let tool = match translate(op, base_url) {
            Ok(tool) => tool,
            Err(e) => {
                warn!("Skipping operation {} {} of plugin '{}': {}", op.verb, op.path, op.plugin, e);
                continue;
            }
        };

        if let Some(existing) = tools.iter_mut().find(|t| t.name == tool.name) {
            warn!(
                "Tool name collision on '{}': {} {} replaces {} {}",
                tool.name,
                tool.dispatch.verb.as_str(),
                op.path,
                existing.dispatch.verb.as_str(),
                existing.dispatch.url_template
            );
            *existing = tool;
        } else {
            tools.push(tool);
        }
    }

    tools
}

/// Derive the tool name: `{verb}_{slug}` where the slug comes from the
/// operation id when present, otherwise from the path.
fn derive_tool_name(verb: Verb, op: &OpenApiOperation) -> String {
    let slug = match &op.operation_id {
        Some(id) if !id.trim().is_empty() => slugify(id),
        _ => slugify(&op.path),
    };
    format!("{}_{}", verb.as_lower(), slug)
}

/// Lowercase, non-alphanumerics collapsed to single underscores.
fn slugify(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_sep = true;
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

fn translate_parameter_style(
    op: &OpenApiOperation,
    summary: String,
) -> Result<(ToolInputSchema, Vec<ParameterSpec>), TranslateError> {
    let mut params = Vec::new();

    match &op.parameters {
        None | Some(Value::Null) => {}
        Some(Value::Array(entries)) => {
            for entry in entries {
                params.push(parse_parameter_entry(op, entry)?);
            }
        }
        Some(other) => {
            return Err(TranslateError::MalformedSchema {
                path: op.path.clone(),
                reason: format!("'parameters' is not an array (got {})", json_type_name(other)),
            });
        }
    }

    let schema = ToolInputSchema::Parameters {
        summary,
        parameters: params.clone(),
    };
    Ok((schema, params))
}

fn parse_parameter_entry(
    op: &OpenApiOperation,
    entry: &Value,
) -> Result<ParameterSpec, TranslateError> {
    let obj = entry.as_object().ok_or_else(|| TranslateError::MalformedSchema {
        path: op.path.clone(),
        reason: "parameter entry is not an object".to_string(),
    })?;

    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| TranslateError::MalformedSchema {
            path: op.path.clone(),
            reason: "parameter entry has no 'name'".to_string(),
        })?
        .to_string();

    // Missing `in` defaults to query; an explicit but unknown location is a
    // schema error for this operation only.
    let location = match obj.get("in").and_then(Value::as_str) {
        None => ParamLocation::Query,
        Some("query") => ParamLocation::Query,
        Some("path") => ParamLocation::Path,
        Some("header") => ParamLocation::Header,
        Some(other) => {
            return Err(TranslateError::MalformedSchema {
                path: op.path.clone(),
                reason: format!("parameter '{}' has unsupported location '{}'", name, other),
            });
        }
    };

    let description = obj
        .get("description")
        .and_then(Value::as_str)
        .map(str::to_string);

    // Missing schema falls back to an opaque string rather than failing.
    let schema = match obj.get("schema") {
        Some(Value::Object(s)) => ValueSchema {
            schema_type: s
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("string")
                .to_string(),
            description: s.get("description").and_then(Value::as_str).map(str::to_string),
        },
        _ => ValueSchema::opaque_string(),
    };

    Ok(ParameterSpec {
        name,
        description,
        location,
        required: obj.get("required").and_then(Value::as_bool).unwrap_or(false),
        schema,
    })
}

fn translate_body_style(
    op: &OpenApiOperation,
    summary: String,
) -> Result<(ToolInputSchema, Vec<ParameterSpec>), TranslateError> {
    let raw_body = match &op.request_body {
        None | Some(Value::Null) => {
            let schema = ToolInputSchema::Body {
                summary,
                request_body: None,
            };
            return Ok((schema, Vec::new()));
        }
        Some(v) => v.clone(),
    };

    let json_schema = raw_body
        .get("content")
        .and_then(|c| c.get("application/json"))
        .and_then(|c| c.get("schema"));

    let mut params = Vec::new();

    if let Some(json_schema) = json_schema {
        let required: Vec<String> = match json_schema.get("required") {
            Some(Value::Array(names)) => names
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };

        match json_schema.get("properties") {
            // Absent properties is a valid empty-bodied call, not an error.
            None | Some(Value::Null) => {}
            Some(Value::Object(props)) => {
                for (name, prop) in props {
                    let prop_obj = prop.as_object();
                    params.push(ParameterSpec {
                        name: name.clone(),
                        description: prop_obj
                            .and_then(|p| p.get("description"))
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        location: ParamLocation::Body,
                        required: required.contains(name),
                        schema: ValueSchema {
                            schema_type: prop_obj
                                .and_then(|p| p.get("type"))
                                .and_then(Value::as_str)
                                .unwrap_or("string")
                                .to_string(),
                            description: None,
                        },
                    });
                }
            }
            Some(other) => {
                return Err(TranslateError::MalformedSchema {
                    path: op.path.clone(),
                    reason: format!(
                        "'properties' is not a mapping (got {})",
                        json_type_name(other)
                    ),
                });
            }
        }
    }

    let schema = ToolInputSchema::Body {
        summary,
        request_body: Some(flatten_enums(raw_body)),
    };
    Ok((schema, params))
}

/// Fold `enum` arrays into the property description and drop them.
///
/// Several MCP clients fail to parse `enum` fields, so the allowed values are
/// surfaced as `... | Enum: a, b, c` text instead. Recurses through
/// `properties` and `items`.
pub fn flatten_enums(schema: Value) -> Value {
    let Value::Object(mut obj) = schema else {
        return schema;
    };

    if let Some(Value::Array(values)) = obj.remove("enum") {
        let rendered = values
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        let description = match obj.get("description").and_then(Value::as_str) {
            Some(existing) if !existing.is_empty() => {
                format!("{} | Enum: {}", existing, rendered)
            }
            _ => format!("Enum: {}", rendered),
        };
        obj.insert("description".to_string(), Value::String(description));
    }

    for key in ["properties", "content", "application/json", "schema"] {
        if let Some(Value::Object(nested)) = obj.get(key) {
            let flattened: Map<String, Value> = nested
                .iter()
                .map(|(k, v)| (k.clone(), flatten_enums(v.clone())))
                .collect();
            obj.insert(key.to_string(), Value::Object(flattened));
        }
    }

    if let Some(items) = obj.remove("items") {
        obj.insert("items".to_string(), flatten_enums(items));
    }

    Value::Object(obj)
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
