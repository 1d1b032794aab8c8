//! The provider-neutral intermediate model.
//!
//! Every codec decodes into these types and encodes out of them, so a new
//! provider only needs a mapping to and from this one shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::codec::{decode_json, encode_json};
use super::content::{stringify, Content, ContentBlock};
use crate::error::{PayloadKind, Result};

const PROVIDER: &str = "generic";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Request {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub max_tokens: u64,
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub temperature: f64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: Content,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Response {
    pub id: String,
    #[serde(rename = "type")]
    pub response_type: String,
    pub role: String,
    pub content: Content,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    Any,
    None,
    Tool { name: String },
}

/// An OpenAI-style function call, used wherever a tool use has to travel as
/// a name plus a JSON string of arguments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

fn default_call_type() -> String {
    "function".to_string()
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

fn is_zero_f64(n: &f64) -> bool {
    *n == 0.0
}

impl Request {
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        decode_json(data, PROVIDER, PayloadKind::Request)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        encode_json(self, PROVIDER, PayloadKind::Request)
    }

    /// System prompt, treating an empty string as absent.
    #[must_use]
    pub fn system_text(&self) -> Option<&str> {
        self.system.as_deref().filter(|s| !s.is_empty())
    }

    #[must_use]
    pub fn tool(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// The system prompt followed by a description of `tools`, for targets
    /// that cannot call them.
    #[must_use]
    pub fn system_with_tool_list(&self) -> Option<String> {
        if self.tools.is_empty() {
            return self.system_text().map(str::to_string);
        }
        let descriptions = describe_tools(&self.tools);
        Some(match self.system_text() {
            Some(system) => format!("{system}\n\n{descriptions}"),
            None => descriptions,
        })
    }
}

/// System-prompt listing of tools for targets that cannot call them.
#[must_use]
pub fn describe_tools(tools: &[Tool]) -> String {
    let mut out = String::from("Available tools (for reference only, cannot be called directly):");
    for tool in tools {
        out.push_str("\n- ");
        out.push_str(&tool.name);
        if let Some(description) = tool.description.as_deref().filter(|d| !d.is_empty()) {
            out.push_str(": ");
            out.push_str(description);
        }
        let params: Vec<&str> = tool
            .input_schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|p| p.keys().map(String::as_str).collect())
            .unwrap_or_default();
        if !params.is_empty() {
            out.push_str(&format!(" (parameters: {})", params.join(", ")));
        }
    }
    out
}

impl Response {
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        decode_json(data, PROVIDER, PayloadKind::Response)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        encode_json(self, PROVIDER, PayloadKind::Response)
    }
}

impl Message {
    pub fn new(role: impl Into<String>, content: Content) -> Self {
        Self {
            role: role.into(),
            content,
            name: None,
        }
    }
}

impl Usage {
    #[must_use]
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens.saturating_add(output_tokens),
        }
    }

    /// Usage with a provider-reported total, computed when the provider omits it.
    #[must_use]
    pub fn reported(input_tokens: u64, output_tokens: u64, total_tokens: Option<u64>) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: total_tokens.unwrap_or_else(|| input_tokens.saturating_add(output_tokens)),
        }
    }
}

impl ToolCall {
    pub fn from_tool_use(id: &str, name: &str, input: &Value) -> Result<Self> {
        let arguments = if input.is_null() {
            "{}".to_string()
        } else {
            stringify(input)?
        };
        Ok(Self {
            id: id.to_string(),
            call_type: default_call_type(),
            function: FunctionCall {
                name: name.to_string(),
                arguments,
            },
        })
    }

    /// Arguments parsed as JSON. Empty arguments mean an empty object.
    pub fn input(&self) -> std::result::Result<Value, serde_json::Error> {
        let args = self.function.arguments.trim();
        if args.is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(args)
    }

    #[must_use]
    pub fn into_tool_use(self, input: Value) -> ContentBlock {
        ContentBlock::ToolUse {
            id: self.id,
            name: self.function.name,
            input,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_and_empty_requests_decode() {
        assert_eq!(Request::from_slice(b"null").unwrap(), Request::default());
        assert_eq!(Request::from_slice(b"{}").unwrap(), Request::default());
        assert!(Request::from_slice(b"{not json").is_err());
    }

    #[test]
    fn test_request_serialization_skips_unset_fields() {
        let req = Request {
            model: "m".into(),
            messages: vec![Message::new("user", Content::text("hi"))],
            ..Default::default()
        };
        let value: Value = serde_json::from_slice(&req.to_vec().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"model": "m", "messages": [{"role": "user", "content": "hi"}]})
        );
    }

    #[test]
    fn test_tool_choice_shapes() {
        let choice: ToolChoice = serde_json::from_value(json!({"type": "any"})).unwrap();
        assert_eq!(choice, ToolChoice::Any);
        let choice: ToolChoice =
            serde_json::from_value(json!({"type": "tool", "name": "lookup"})).unwrap();
        assert_eq!(
            choice,
            ToolChoice::Tool {
                name: "lookup".into()
            }
        );
    }

    #[test]
    fn test_tool_call_from_tool_use() {
        let call = ToolCall::from_tool_use("call_1", "lookup", &json!({"q": "x"})).unwrap();
        assert_eq!(call.call_type, "function");
        assert_eq!(call.function.arguments, r#"{"q":"x"}"#);
        assert_eq!(call.input().unwrap(), json!({"q": "x"}));

        let empty = ToolCall::from_tool_use("call_2", "noop", &Value::Null).unwrap();
        assert_eq!(empty.function.arguments, "{}");
    }

    #[test]
    fn test_usage_total_computed_when_missing() {
        assert_eq!(Usage::reported(3, 4, None).total_tokens, 7);
        assert_eq!(Usage::reported(3, 4, Some(10)).total_tokens, 10);
    }

    #[test]
    fn test_usage_total_saturates() {
        assert_eq!(Usage::new(u64::MAX, 1).total_tokens, u64::MAX);
        assert_eq!(Usage::reported(u64::MAX, 5, None).total_tokens, u64::MAX);
    }
}
