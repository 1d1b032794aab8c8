//! Anthropic Messages API codec.
//!
//! The generic model is shaped after this format, so the mapping is mostly
//! field-for-field. The encoder always emits block arrays for content.

use serde_json::Value;

use super::anthropic_types::{Message, MessagesRequest, MessagesResponse, SystemContent, Usage};
use super::codec::{decode_json, encode_json, Codec};
use super::content::{Content, ContentBlock};
use super::context::ToolConversionContext;
use super::generic::{self, Request, Response};
use crate::error::{BridgeError, PayloadKind, Result};
use crate::format::MessageFormat;

const PROVIDER: &str = "Anthropic";

#[derive(Debug, Clone, Copy, Default)]
pub struct AnthropicCodec;

impl AnthropicCodec {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Codec for AnthropicCodec {
    fn format(&self) -> MessageFormat {
        MessageFormat::Anthropic
    }

    fn decode_request(&self, data: &[u8]) -> Result<Request> {
        let wire: MessagesRequest = decode_json(data, PROVIDER, PayloadKind::Request)?;

        Ok(Request {
            model: wire.model,
            messages: wire
                .messages
                .into_iter()
                .map(|m| generic::Message::new(m.role, m.content))
                .collect(),
            system: wire.system.map(|s| s.as_text()),
            max_tokens: wire.max_tokens,
            temperature: wire.temperature.unwrap_or(0.0),
            stream: wire.stream.unwrap_or(false),
            metadata: wire.metadata,
            tools: wire.tools.unwrap_or_default(),
            tool_choice: wire.tool_choice,
        })
    }

    fn decode_response(&self, data: &[u8]) -> Result<Response> {
        let wire: MessagesResponse = decode_json(data, PROVIDER, PayloadKind::Response)?;

        Ok(Response {
            id: wire.id,
            response_type: wire.response_type,
            role: wire.role,
            content: wire.content,
            model: wire.model,
            stop_reason: wire.stop_reason,
            usage: Some(generic::Usage::new(
                wire.usage.input_tokens,
                wire.usage.output_tokens,
            )),
        })
    }

    fn encode_request(&self, req: &Request, ctx: &mut ToolConversionContext) -> Result<Vec<u8>> {
        // Anthropic has no system role inside `messages`; lift those into the system prompt.
        let mut system_parts: Vec<String> = req.system_text().map(str::to_string).into_iter().collect();
        let mut messages = Vec::with_capacity(req.messages.len());

        for (i, msg) in req.messages.iter().enumerate() {
            if msg.role == "system" {
                system_parts.push(msg.content.flatten("\n")?);
                continue;
            }
            if msg.content.has_tool_blocks() {
                ctx.bump("tool_blocks");
            }
            messages.push(Message {
                role: msg.role.clone(),
                content: block_content(&msg.content, &format!("message {i}"))?,
            });
        }

        let wire = MessagesRequest {
            model: req.model.clone(),
            max_tokens: req.max_tokens,
            messages,
            system: (!system_parts.is_empty()).then(|| SystemContent::Text(system_parts.join("\n"))),
            stream: req.stream.then_some(true),
            temperature: (req.temperature != 0.0).then_some(req.temperature),
            tools: (!req.tools.is_empty()).then(|| req.tools.clone()),
            tool_choice: req.tool_choice.clone(),
            metadata: req.metadata.clone(),
        };

        encode_json(&wire, PROVIDER, PayloadKind::Request)
    }

    fn encode_response(
        &self,
        resp: &Response,
        _ctx: &mut ToolConversionContext,
    ) -> Result<Vec<u8>> {
        let usage = resp.usage.unwrap_or_default();
        let wire = MessagesResponse {
            id: resp.id.clone(),
            response_type: non_empty_or(&resp.response_type, "message"),
            role: non_empty_or(&resp.role, "assistant"),
            content: block_content(&resp.content, "response")?,
            model: resp.model.clone(),
            stop_reason: resp.stop_reason.clone(),
            stop_sequence: None,
            usage: Usage {
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
                ..Default::default()
            },
        };

        encode_json(&wire, PROVIDER, PayloadKind::Response)
    }
}

/// Content as an Anthropic block array.
///
/// Strings are wrapped in a single text block. Arrays the normalizer could not
/// classify (images, thinking blocks) are native Anthropic content and pass
/// through untouched.
fn block_content(content: &Content, location: &str) -> Result<Content> {
    match content {
        Content::Text(text) => Ok(Content::Blocks(vec![ContentBlock::text(text.clone())])),
        Content::Blocks(blocks) => Ok(Content::Blocks(blocks.clone())),
        Content::Opaque(value @ Value::Array(_)) => Ok(Content::Opaque(value.clone())),
        Content::Opaque(_) => Err(BridgeError::content_parse(format!(
            "{location}: expected a string or an array of content blocks"
        ))),
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}
