//! AWS Bedrock `InvokeModel` codec for Anthropic models.
//!
//! The body is the Anthropic Messages shape minus `model` (it lives in the URL)
//! plus `anthropic_version`. Message content passes through as-is.

use serde::{Deserialize, Serialize};

use super::anthropic_types::SystemContent;
use super::codec::{decode_json, encode_json, Codec};
use super::content::Content;
use super::context::ToolConversionContext;
use super::generic::{Message, Request, Response, Tool, ToolChoice, Usage};
use crate::error::{PayloadKind, Result};
use crate::format::MessageFormat;

const PROVIDER: &str = "AWS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    pub anthropic_version: String,
    /// Applied when a request carries no positive `max_tokens`.
    pub default_max_tokens: u64,
    /// Applied when a response carries no stop reason.
    pub default_stop_reason: String,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            anthropic_version: "bedrock-2023-05-31".to_string(),
            default_max_tokens: 4096,
            default_stop_reason: "stop_sequence".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InvokeModelRequest {
    pub anthropic_version: String,
    pub messages: Vec<AwsMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemContent>,
    pub max_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsMessage {
    pub role: String,
    pub content: Content,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InvokeModelResponse {
    pub id: String,
    pub model: String,
    #[serde(rename = "type")]
    pub response_type: String,
    pub role: String,
    pub content: Content,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequence: Option<String>,
    pub usage: AwsUsage,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct AwsCodec {
    config: AwsConfig,
}

impl AwsCodec {
    #[must_use]
    pub fn new(config: AwsConfig) -> Self {
        Self { config }
    }

    fn stop_reason_or_default(&self, stop_reason: Option<&str>) -> String {
        match stop_reason {
            Some(reason) if !reason.is_empty() => reason.to_string(),
            _ => self.config.default_stop_reason.clone(),
        }
    }
}

impl Codec for AwsCodec {
    fn format(&self) -> MessageFormat {
        MessageFormat::Aws
    }

    fn decode_request(&self, data: &[u8]) -> Result<Request> {
        let wire: InvokeModelRequest = decode_json(data, PROVIDER, PayloadKind::Request)?;

        Ok(Request {
            messages: wire
                .messages
                .into_iter()
                .map(|m| Message::new(m.role, m.content))
                .collect(),
            system: wire.system.map(|s| s.as_text()),
            max_tokens: wire.max_tokens,
            temperature: wire.temperature.unwrap_or(0.0),
            tools: wire.tools.unwrap_or_default(),
            tool_choice: wire.tool_choice,
            ..Default::default()
        })
    }

    fn decode_response(&self, data: &[u8]) -> Result<Response> {
        let wire: InvokeModelResponse = decode_json(data, PROVIDER, PayloadKind::Response)?;

        Ok(Response {
            stop_reason: Some(self.stop_reason_or_default(wire.stop_reason.as_deref())),
            id: wire.id,
            response_type: wire.response_type,
            role: wire.role,
            content: wire.content,
            model: wire.model,
            usage: Some(Usage::new(wire.usage.input_tokens, wire.usage.output_tokens)),
        })
    }

    fn encode_request(&self, req: &Request, ctx: &mut ToolConversionContext) -> Result<Vec<u8>> {
        let max_tokens = if req.max_tokens > 0 {
            req.max_tokens
        } else {
            ctx.record("default_max_tokens", self.config.default_max_tokens);
            self.config.default_max_tokens
        };

        let wire = InvokeModelRequest {
            anthropic_version: self.config.anthropic_version.clone(),
            messages: req
                .messages
                .iter()
                .map(|m| AwsMessage {
                    role: m.role.clone(),
                    content: m.content.clone(),
                })
                .collect(),
            system: req
                .system_text()
                .map(|s| SystemContent::Text(s.to_string())),
            max_tokens,
            temperature: (req.temperature != 0.0).then_some(req.temperature),
            tools: (!req.tools.is_empty()).then(|| req.tools.clone()),
            tool_choice: req.tool_choice.clone(),
        };

        encode_json(&wire, PROVIDER, PayloadKind::Request)
    }

    fn encode_response(
        &self,
        resp: &Response,
        _ctx: &mut ToolConversionContext,
    ) -> Result<Vec<u8>> {
        let usage = resp.usage.unwrap_or_default();
        let wire = InvokeModelResponse {
            id: resp.id.clone(),
            model: resp.model.clone(),
            response_type: resp.response_type.clone(),
            role: resp.role.clone(),
            content: resp.content.clone(),
            stop_reason: Some(self.stop_reason_or_default(resp.stop_reason.as_deref())),
            stop_sequence: None,
            usage: AwsUsage {
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
            },
        };

        encode_json(&wire, PROVIDER, PayloadKind::Response)
    }
}
