//! Google Gemini `generateContent` codec.
//!
//! Gemini turns are `contents[].parts[].text`. Tool blocks have no native
//! counterpart here and travel as marker text. The system prompt becomes a
//! leading user turn and is not recovered on decode.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::codec::{decode_json, encode_json, Codec};
use super::content::Content;
use super::context::{Capabilities, ToolConversionContext};
use super::generic::{Message, Request, Response, Usage};
use crate::error::{BridgeError, PayloadKind, Result};
use crate::format::MessageFormat;

const PROVIDER: &str = "Google";

/// Gemini joins parts without a separator by default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub text_separator: String,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<GoogleContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleContent {
    pub role: String,
    pub parts: Vec<Part>,
}

/// Only text parts are understood; other part kinds read as empty text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerateContentResponse {
    pub candidates: Vec<Candidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Candidate {
    pub content: GoogleContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safety_ratings: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UsageMetadata {
    pub prompt_token_count: u64,
    pub candidates_token_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_token_count: Option<u64>,
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct GoogleCodec {
    config: GoogleConfig,
}

impl GoogleCodec {
    #[must_use]
    pub fn new(config: GoogleConfig) -> Self {
        Self { config }
    }

    fn flatten_turn(&self, content: &Content, ctx: &mut ToolConversionContext) -> Result<String> {
        if content.has_tool_blocks() {
            ctx.bump("tool_markers");
        }
        content.flatten(&self.config.text_separator)
    }
}

/// Generic role to Gemini role. Gemini has no system or assistant role.
#[must_use]
pub fn google_role(role: &str) -> &str {
    match role {
        "assistant" => "model",
        "system" => "user",
        other => other,
    }
}

/// Gemini role to generic role.
#[must_use]
pub fn generic_role(role: &str) -> &str {
    match role {
        "model" => "assistant",
        other => other,
    }
}

fn joined_text(content: &GoogleContent) -> String {
    content.parts.iter().map(|p| p.text.as_str()).collect()
}

fn stop_reason(finish_reason: &str) -> String {
    match finish_reason {
        "STOP" => "end_turn".to_string(),
        "MAX_TOKENS" => "max_tokens".to_string(),
        other => other.to_lowercase(),
    }
}

fn finish_reason(stop_reason: Option<&str>) -> String {
    match stop_reason {
        Some("max_tokens") => "MAX_TOKENS".to_string(),
        Some("end_turn" | "stop_sequence" | "tool_use") | None => "STOP".to_string(),
        Some(other) => other.to_uppercase(),
    }
}

impl Codec for GoogleCodec {
    fn format(&self) -> MessageFormat {
        MessageFormat::Google
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_tools: false,
            supports_streaming: true,
        }
    }

    fn decode_request(&self, data: &[u8]) -> Result<Request> {
        let wire: GenerateContentRequest = decode_json(data, PROVIDER, PayloadKind::Request)?;
        let generation = wire.generation_config.unwrap_or_default();

        let messages = wire
            .contents
            .iter()
            .map(|turn| {
                let role = match generic_role(&turn.role) {
                    "" => "user",
                    role => role,
                };
                Message::new(role, Content::from_flat_text(joined_text(turn)))
            })
            .collect();

        Ok(Request {
            messages,
            max_tokens: generation.max_output_tokens.unwrap_or(0),
            temperature: generation.temperature.unwrap_or(0.0),
            ..Default::default()
        })
    }

    fn decode_response(&self, data: &[u8]) -> Result<Response> {
        let wire: GenerateContentResponse = decode_json(data, PROVIDER, PayloadKind::Response)?;

        let candidate = wire
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| BridgeError::structural("no candidates in Google response"))?;

        let role = match generic_role(&candidate.content.role) {
            "" => "assistant",
            role => role,
        }
        .to_string();

        Ok(Response {
            id: wire.response_id.unwrap_or_default(),
            response_type: "message".to_string(),
            role,
            content: Content::from_flat_text(joined_text(&candidate.content)),
            model: wire.model_version.unwrap_or_default(),
            stop_reason: candidate.finish_reason.as_deref().map(stop_reason),
            usage: wire.usage_metadata.map(|u| {
                Usage::reported(
                    u.prompt_token_count,
                    u.candidates_token_count,
                    u.total_token_count,
                )
            }),
        })
    }

    fn encode_request(&self, req: &Request, ctx: &mut ToolConversionContext) -> Result<Vec<u8>> {
        let mut contents = Vec::with_capacity(req.messages.len() + 1);

        if !req.tools.is_empty() {
            ctx.record("tool_fallback", true);
        }
        if let Some(system) = req.system_with_tool_list() {
            contents.push(GoogleContent {
                role: "user".to_string(),
                parts: vec![Part { text: system }],
            });
        }

        for msg in &req.messages {
            contents.push(GoogleContent {
                role: google_role(&msg.role).to_string(),
                parts: vec![Part {
                    text: self.flatten_turn(&msg.content, ctx)?,
                }],
            });
        }

        let generation_config = (req.max_tokens > 0 || req.temperature > 0.0).then(|| GenerationConfig {
            temperature: (req.temperature > 0.0).then_some(req.temperature),
            max_output_tokens: (req.max_tokens > 0).then_some(req.max_tokens),
            ..Default::default()
        });

        let wire = GenerateContentRequest {
            contents,
            generation_config,
        };

        encode_json(&wire, PROVIDER, PayloadKind::Request)
    }

    fn encode_response(&self, resp: &Response, ctx: &mut ToolConversionContext) -> Result<Vec<u8>> {
        if matches!(resp.content, Content::Opaque(_)) {
            return Err(BridgeError::content_parse(
                "response: expected a string or an array of content blocks",
            ));
        }

        let role: &str = if resp.role.is_empty() {
            "assistant"
        } else {
            &resp.role
        };

        let wire = GenerateContentResponse {
            candidates: vec![Candidate {
                content: GoogleContent {
                    role: google_role(role).to_string(),
                    parts: vec![Part {
                        text: self.flatten_turn(&resp.content, ctx)?,
                    }],
                },
                finish_reason: Some(finish_reason(resp.stop_reason.as_deref())),
                safety_ratings: None,
            }],
            usage_metadata: resp.usage.map(|u| UsageMetadata {
                prompt_token_count: u.input_tokens,
                candidates_token_count: u.output_tokens,
                total_token_count: Some(u.total_tokens),
            }),
            model_version: (!resp.model.is_empty()).then(|| resp.model.clone()),
            response_id: (!resp.id.is_empty()).then(|| resp.id.clone()),
        };

        encode_json(&wire, PROVIDER, PayloadKind::Response)
    }
}
