//! Structural checks for tool input schemas.
//!
//! Tool schemas are a JSON-Schema subset. The walker rejects shapes no provider
//! would accept and warns about ones it merely finds suspicious. Nesting is
//! bounded: top-level properties sit at level 1, and each `items`,
//! `additionalProperties` schema or nested `properties` adds one.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::convert::generic::Tool;

pub const MAX_SCHEMA_DEPTH: usize = 10;

const VALID_TYPES: &[&str] = &[
    "string", "number", "integer", "boolean", "array", "object", "null",
];

const KNOWN_FORMATS: &[&str] = &[
    "date-time", "date", "time", "email", "hostname", "ipv4", "ipv6", "uri", "uuid",
];

const NUMERIC_KEYWORDS: &[&str] = &[
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "multipleOf",
];

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("tool '{tool}': {path}: {message}")]
pub struct SchemaError {
    pub tool: String,
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaWarning {
    pub path: String,
    pub message: String,
}

/// Check a tool definition, returning any non-fatal warnings.
pub fn validate_tool_schema(tool: &Tool) -> Result<Vec<SchemaWarning>, SchemaError> {
    let mut walker = SchemaWalker {
        tool: &tool.name,
        warnings: Vec::new(),
    };

    if tool.name.trim().is_empty() {
        return Err(walker.error("name", "tool name cannot be empty"));
    }

    let schema = tool
        .input_schema
        .as_object()
        .ok_or_else(|| walker.error("input_schema", "input_schema must be an object"))?;

    match schema.get("type") {
        Some(Value::String(t)) if t == "object" => {}
        Some(other) => {
            return Err(walker.error(
                "input_schema.type",
                format!("top-level schema type must be 'object', got {other}"),
            ))
        }
        None => {
            return Err(walker.error("input_schema.type", "schema must declare a type"));
        }
    }

    walker.object_body("input_schema", schema, 0)?;

    Ok(walker.warnings)
}

struct SchemaWalker<'a> {
    tool: &'a str,
    warnings: Vec<SchemaWarning>,
}

impl SchemaWalker<'_> {
    fn error(&self, path: &str, message: impl Into<String>) -> SchemaError {
        SchemaError {
            tool: self.tool.to_string(),
            path: path.to_string(),
            message: message.into(),
        }
    }

    fn warn(&mut self, path: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(tool = %self.tool, path, "{message}");
        self.warnings.push(SchemaWarning {
            path: path.to_string(),
            message,
        });
    }

    /// `properties`, `required` and `additionalProperties` of an object schema
    /// sitting at `depth`.
    fn object_body(
        &mut self,
        path: &str,
        schema: &Map<String, Value>,
        depth: usize,
    ) -> Result<(), SchemaError> {
        if let Some(properties) = schema.get("properties") {
            let properties = properties.as_object().ok_or_else(|| {
                self.error(&format!("{path}.properties"), "properties must be an object")
            })?;
            for (name, definition) in properties {
                self.property(&format!("{path}.properties.{name}"), definition, depth + 1)?;
            }
        }

        if let Some(required) = schema.get("required") {
            let required = required.as_array().ok_or_else(|| {
                self.error(&format!("{path}.required"), "required must be an array")
            })?;
            for (i, item) in required.iter().enumerate() {
                if !item.is_string() {
                    return Err(self.error(
                        &format!("{path}.required[{i}]"),
                        "required entries must be strings",
                    ));
                }
            }
        }

        match schema.get("additionalProperties") {
            None | Some(Value::Bool(_)) => {}
            Some(additional @ Value::Object(_)) => {
                self.property(&format!("{path}.additionalProperties"), additional, depth + 1)?;
            }
            Some(_) => {
                return Err(self.error(
                    &format!("{path}.additionalProperties"),
                    "additionalProperties must be a boolean or a schema object",
                ))
            }
        }

        Ok(())
    }

    fn property(&mut self, path: &str, definition: &Value, depth: usize) -> Result<(), SchemaError> {
        if depth > MAX_SCHEMA_DEPTH {
            return Err(self.error(
                path,
                format!("schema nesting exceeds maximum depth of {MAX_SCHEMA_DEPTH}"),
            ));
        }

        let definition = definition
            .as_object()
            .ok_or_else(|| self.error(path, "property definition must be an object"))?;

        let types: Vec<&str> = match definition.get("type") {
            None => {
                self.warn(path, "property has no type");
                return Ok(());
            }
            Some(Value::String(t)) if t.is_empty() => {
                self.warn(path, "property has an empty type");
                return Ok(());
            }
            Some(Value::String(t)) => vec![t.as_str()],
            Some(Value::Array(entries)) => {
                let mut types = Vec::with_capacity(entries.len());
                for entry in entries {
                    let t = entry.as_str().ok_or_else(|| {
                        self.error(&format!("{path}.type"), "type array entries must be strings")
                    })?;
                    types.push(t);
                }
                types
            }
            Some(_) => {
                return Err(self.error(
                    &format!("{path}.type"),
                    "type must be a string or an array of strings",
                ))
            }
        };

        for t in types {
            match t {
                "object" => self.object_body(path, definition, depth)?,
                "array" => self.array(path, definition, depth)?,
                "string" => self.string(path, definition)?,
                "number" | "integer" => self.number(path, definition)?,
                "boolean" | "null" => {}
                other => {
                    return Err(self.error(
                        &format!("{path}.type"),
                        format!(
                            "invalid type '{other}', expected one of: {}",
                            VALID_TYPES.join(", ")
                        ),
                    ))
                }
            }
        }

        Ok(())
    }

    fn array(
        &mut self,
        path: &str,
        definition: &Map<String, Value>,
        depth: usize,
    ) -> Result<(), SchemaError> {
        if let Some(items) = definition.get("items") {
            self.property(&format!("{path}.items"), items, depth + 1)?;
        }
        self.non_negative(path, definition, "minItems")?;
        self.non_negative(path, definition, "maxItems")
    }

    fn string(&mut self, path: &str, definition: &Map<String, Value>) -> Result<(), SchemaError> {
        self.non_negative(path, definition, "minLength")?;
        self.non_negative(path, definition, "maxLength")?;

        match definition.get("format") {
            None => {}
            Some(Value::String(format)) => {
                if !KNOWN_FORMATS.contains(&format.as_str()) {
                    self.warn(
                        &format!("{path}.format"),
                        format!("unknown string format '{format}'"),
                    );
                }
            }
            Some(_) => {
                return Err(self.error(&format!("{path}.format"), "format must be a string"));
            }
        }

        if let Some(values) = definition.get("enum") {
            let values = values
                .as_array()
                .ok_or_else(|| self.error(&format!("{path}.enum"), "enum must be an array"))?;
            if values.is_empty() {
                return Err(self.error(&format!("{path}.enum"), "enum cannot be empty"));
            }
            if let Some(i) = values.iter().position(|v| !v.is_string()) {
                return Err(self.error(
                    &format!("{path}.enum[{i}]"),
                    "enum values of a string property must be strings",
                ));
            }
        }

        Ok(())
    }

    fn number(&mut self, path: &str, definition: &Map<String, Value>) -> Result<(), SchemaError> {
        for keyword in NUMERIC_KEYWORDS {
            if let Some(value) = definition.get(*keyword) {
                if !value.is_number() {
                    return Err(self.error(
                        &format!("{path}.{keyword}"),
                        format!("{keyword} must be a number"),
                    ));
                }
            }
        }

        if let Some(step) = definition.get("multipleOf").and_then(Value::as_f64) {
            if step <= 0.0 {
                return Err(self.error(
                    &format!("{path}.multipleOf"),
                    "multipleOf must be greater than zero",
                ));
            }
        }

        Ok(())
    }

    fn non_negative(
        &self,
        path: &str,
        definition: &Map<String, Value>,
        keyword: &str,
    ) -> Result<(), SchemaError> {
        match definition.get(keyword) {
            None => Ok(()),
            Some(Value::Number(n)) if n.as_f64().is_some_and(|v| v >= 0.0) => Ok(()),
            Some(Value::Number(_)) => Err(self.error(
                &format!("{path}.{keyword}"),
                format!("{keyword} cannot be negative"),
            )),
            Some(_) => Err(self.error(
                &format!("{path}.{keyword}"),
                format!("{keyword} must be a number"),
            )),
        }
    }
}
