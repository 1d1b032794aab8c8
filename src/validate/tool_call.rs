//! Checks for tool calls and their arguments.
//!
//! Failures carry enough structure (tool, field, offending value, suggestions)
//! for a client to fix the call without reading the schema itself.

use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::convert::generic::{Tool, ToolCall};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ToolCallErrorKind {
    #[serde(rename = "validation_error")]
    Validation,
    #[serde(rename = "json_error")]
    Json,
    #[serde(rename = "type_error")]
    Type,
}

impl ToolCallErrorKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation_error",
            Self::Json => "json_error",
            Self::Type => "type_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[error("tool call {}{}: {message}", .kind.as_str(), for_tool(.tool_name))]
pub struct ToolCallError {
    #[serde(rename = "type")]
    pub kind: ToolCallErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tool_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tool_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl ToolCallError {
    pub fn new(kind: ToolCallErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            tool_name: String::new(),
            tool_id: String::new(),
            field: None,
            value: None,
            context: Map::new(),
            suggestions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_tool(mut self, name: &str, id: &str) -> Self {
        self.tool_name = name.to_string();
        self.tool_id = id.to_string();
        self
    }

    #[must_use]
    pub fn with_field(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.field = Some(field.to_string());
        self.value = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn with_suggestions<I, S>(mut self, suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggestions.extend(suggestions.into_iter().map(Into::into));
        self
    }
}

fn for_tool(name: &str) -> String {
    if name.is_empty() {
        String::new()
    } else {
        format!(" for '{name}'")
    }
}

/// Structural checks on a single call, independent of any tool definition.
pub fn validate_tool_call(call: &ToolCall) -> Result<(), ToolCallError> {
    let name = call.function.name.as_str();

    if call.id.is_empty() {
        return Err(
            ToolCallError::new(ToolCallErrorKind::Validation, "tool call id cannot be empty")
                .with_tool(name, ""),
        );
    }
    if call.call_type != "function" {
        return Err(ToolCallError::new(
            ToolCallErrorKind::Validation,
            format!("unsupported tool call type '{}'", call.call_type),
        )
        .with_tool(name, &call.id)
        .with_field("type", call.call_type.as_str())
        .with_suggestions(["Set the tool call type to 'function'"]));
    }
    if name.is_empty() {
        return Err(ToolCallError::new(
            ToolCallErrorKind::Validation,
            "function name cannot be empty",
        )
        .with_tool(name, &call.id));
    }
    if let Err(e) = call.input() {
        return Err(ToolCallError::new(
            ToolCallErrorKind::Json,
            "function arguments are not valid JSON",
        )
        .with_tool(name, &call.id)
        .with_field("arguments", call.function.arguments.as_str())
        .with_context("parse_error", e.to_string())
        .with_suggestions([
            "Ensure the arguments are valid JSON",
            "Check for missing quotes or commas",
        ]));
    }

    Ok(())
}

/// Check a call's arguments against the tool's input schema: required
/// parameters present, declared parameter types respected, and no extras when
/// the schema forbids them.
pub fn validate_tool_call_arguments(call: &ToolCall, tool: &Tool) -> Result<(), ToolCallError> {
    let name = call.function.name.as_str();
    let id = call.id.as_str();

    let empty = Map::new();
    let schema = tool.input_schema.as_object().unwrap_or(&empty);
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let raw = call.function.arguments.trim();
    if raw.is_empty() {
        if required.is_empty() {
            return Ok(());
        }
        return Err(ToolCallError::new(
            ToolCallErrorKind::Validation,
            "tool call has no arguments but the tool requires parameters",
        )
        .with_tool(name, id)
        .with_field("required_parameters", json!(required))
        .with_suggestions(["Provide the required parameters in the function arguments"]));
    }

    let args = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            return Err(ToolCallError::new(
                ToolCallErrorKind::Json,
                "tool call arguments must be a JSON object",
            )
            .with_tool(name, id)
            .with_field("arguments", other)
            .with_suggestions(["Ensure the arguments are valid JSON"]));
        }
        Err(e) => {
            return Err(ToolCallError::new(
                ToolCallErrorKind::Json,
                "invalid JSON in tool call arguments",
            )
            .with_tool(name, id)
            .with_field("arguments", raw)
            .with_context("parse_error", e.to_string())
            .with_suggestions([
                "Ensure the arguments are valid JSON",
                "Check for missing quotes or commas",
            ]));
        }
    };

    for param in &required {
        if !args.contains_key(*param) {
            return Err(ToolCallError::new(
                ToolCallErrorKind::Validation,
                format!("missing required parameter '{param}'"),
            )
            .with_tool(name, id)
            .with_field(param, Value::Null)
            .with_suggestions([format!("Add the '{param}' parameter to the tool call")]));
        }
    }

    let properties = schema.get("properties").and_then(Value::as_object);
    let closed = matches!(schema.get("additionalProperties"), Some(Value::Bool(false)));

    for (param, value) in &args {
        match properties.and_then(|p| p.get(param)) {
            Some(definition) => check_type(param, value, definition)
                .map_err(|e| e.with_tool(name, id))?,
            None if closed => {
                return Err(ToolCallError::new(
                    ToolCallErrorKind::Validation,
                    format!("unexpected parameter '{param}'"),
                )
                .with_tool(name, id)
                .with_field(param, value.clone())
                .with_suggestions(["Remove the unexpected parameter"]));
            }
            None => {}
        }
    }

    Ok(())
}

fn check_type(param: &str, value: &Value, definition: &Value) -> Result<(), ToolCallError> {
    let Some(expected) = definition.get("type").and_then(Value::as_str) else {
        return Ok(());
    };

    let (matches, description) = match expected {
        "string" => (value.is_string(), "a string"),
        "number" => (value.is_number(), "a number"),
        "integer" => (is_whole_number(value), "a whole number"),
        "boolean" => (value.is_boolean(), "true or false"),
        "array" => (value.is_array(), "an array"),
        "object" => (value.is_object(), "an object"),
        "null" => (value.is_null(), "null"),
        _ => return Ok(()),
    };

    if matches {
        return Ok(());
    }

    Err(ToolCallError::new(
        ToolCallErrorKind::Type,
        format!("parameter '{param}' should be of type {expected}"),
    )
    .with_field(param, value.clone())
    .with_context("expected_type", expected)
    .with_suggestions([format!("Ensure the parameter value is {description}")]))
}

fn is_whole_number(value: &Value) -> bool {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => true,
        Value::Number(n) => n.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0),
        _ => false,
    }
}
