//! `OpenAI` Chat Completions codec.
//!
//! Tool use maps onto native `tool_calls` and `tool`-role messages. A single
//! generic user message with tool results expands into several `OpenAI`
//! messages, and consecutive `tool` messages fold back into one user message on
//! decode. With native tools switched off, tool blocks travel as marker text
//! and the tool list is described in the system prompt instead.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::codec::{decode_json, encode_json, Codec};
use super::content::{recover_tool_markers, stringify, tool_marker, tool_result_text, Content, ContentBlock};
use super::context::{Capabilities, ToolConversionContext};
use super::generic::{Message, Request, Response, Tool, ToolCall, ToolChoice, Usage};
use super::openai_types::{
    ChatCompletionRequest, ChatCompletionResponse, ChatFunction, ChatMessage, ChatTool,
    ChatToolChoice, ChatToolChoiceFunction, ChatToolChoiceSpecific, ChatUsage, Choice,
    ChoiceMessage, StreamOptions,
};
use crate::error::{BridgeError, PayloadKind, Result};
use crate::format::MessageFormat;
use crate::validate::tool_call::validate_tool_call;

const PROVIDER: &str = "OpenAI";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// Joins text blocks when flattening to a single string.
    pub text_separator: String,
    /// Emit `tools`/`tool_calls`. When false, tools are described in the system
    /// prompt and tool blocks are inlined as marker text.
    pub native_tools: bool,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            text_separator: " ".to_string(),
            native_tools: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OpenAiCodec {
    config: OpenAiConfig,
}

impl OpenAiCodec {
    #[must_use]
    pub fn new(config: OpenAiConfig) -> Self {
        Self { config }
    }

    fn separator(&self) -> &str {
        &self.config.text_separator
    }

    fn decode_message(&self, msg: ChatMessage) -> Result<Message> {
        let content = msg.content.unwrap_or_default();
        let tool_calls = msg.tool_calls.unwrap_or_default();

        let content = if tool_calls.is_empty() {
            match content {
                Content::Text(text) => Content::from_flat_text(text),
                other => other,
            }
        } else {
            let mut blocks = match content {
                Content::Text(text) if text.is_empty() => Vec::new(),
                Content::Text(text) => {
                    recover_tool_markers(&text).unwrap_or_else(|| vec![ContentBlock::text(text)])
                }
                Content::Blocks(blocks) => blocks,
                Content::Opaque(value) => vec![ContentBlock::text(stringify(&value)?)],
            };
            for call in tool_calls {
                blocks.push(decode_tool_call(call)?);
            }
            Content::Blocks(blocks)
        };

        Ok(Message {
            role: msg.role,
            content,
            name: msg.name,
        })
    }

    fn encode_message(
        &self,
        msg: &Message,
        ctx: &mut ToolConversionContext,
    ) -> Result<Vec<ChatMessage>> {
        let blocks = match &msg.content {
            Content::Blocks(blocks) => blocks,
            Content::Text(_) | Content::Opaque(_) => {
                let mut chat = ChatMessage::text(&msg.role, msg.content.flatten(self.separator())?);
                chat.name = msg.name.clone();
                return Ok(vec![chat]);
            }
        };

        if msg.role == "assistant" {
            self.encode_assistant(blocks, msg.name.clone(), ctx)
        } else {
            self.encode_user(&msg.role, blocks, ctx)
        }
    }

    fn encode_user(
        &self,
        role: &str,
        blocks: &[ContentBlock],
        ctx: &mut ToolConversionContext,
    ) -> Result<Vec<ChatMessage>> {
        let mut messages = Vec::new();
        let mut text_parts: Vec<String> = Vec::new();

        for block in blocks {
            match block {
                ContentBlock::Text { text } => text_parts.push(text.clone()),
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                } => {
                    // Flush any accumulated text as its own message first
                    self.flush_text(role, &mut text_parts, &mut messages);
                    messages.push(ChatMessage {
                        role: "tool".to_string(),
                        content: Some(Content::Text(tool_result_text(
                            content.as_ref(),
                            *is_error == Some(true),
                        )?)),
                        tool_call_id: Some(tool_use_id.clone()),
                        ..Default::default()
                    });
                }
                ContentBlock::ToolUse { .. } => {
                    ctx.bump("tool_markers");
                    text_parts.extend(tool_marker(block)?);
                }
                ContentBlock::Other(value) => text_parts.push(stringify(value)?),
            }
        }

        self.flush_text(role, &mut text_parts, &mut messages);

        // An empty message still has to occupy its turn
        if messages.is_empty() {
            messages.push(ChatMessage::text(role, String::new()));
        }

        Ok(messages)
    }

    fn encode_assistant(
        &self,
        blocks: &[ContentBlock],
        name: Option<String>,
        ctx: &mut ToolConversionContext,
    ) -> Result<Vec<ChatMessage>> {
        let (text, tool_calls) = self.split_tool_calls(blocks, true, ctx)?;

        let content = if text.is_empty() && !tool_calls.is_empty() {
            None
        } else {
            Some(Content::Text(text))
        };

        Ok(vec![ChatMessage {
            role: "assistant".to_string(),
            content,
            tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            tool_call_id: None,
            name,
        }])
    }

    /// Text (with any non-native tool blocks as markers) and the native tool calls.
    fn split_tool_calls(
        &self,
        blocks: &[ContentBlock],
        native_tool_use: bool,
        ctx: &mut ToolConversionContext,
    ) -> Result<(String, Vec<ToolCall>)> {
        let mut text_parts = Vec::new();
        let mut tool_calls = Vec::new();

        for block in blocks {
            match block {
                ContentBlock::Text { text } => text_parts.push(text.clone()),
                ContentBlock::ToolUse { id, name, input } if native_tool_use => {
                    tool_calls.push(ToolCall::from_tool_use(id, name, input)?);
                }
                ContentBlock::Other(value) => text_parts.push(stringify(value)?),
                other => {
                    ctx.bump("tool_markers");
                    text_parts.extend(tool_marker(other)?);
                }
            }
        }

        Ok((text_parts.join(self.separator()), tool_calls))
    }

    fn flush_text(&self, role: &str, parts: &mut Vec<String>, out: &mut Vec<ChatMessage>) {
        if parts.is_empty() {
            return;
        }
        out.push(ChatMessage::text(role, parts.join(self.separator())));
        parts.clear();
    }
}

impl Codec for OpenAiCodec {
    fn format(&self) -> MessageFormat {
        MessageFormat::OpenAi
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_tools: self.config.native_tools,
            supports_streaming: true,
        }
    }

    fn decode_request(&self, data: &[u8]) -> Result<Request> {
        let wire: ChatCompletionRequest = decode_json(data, PROVIDER, PayloadKind::Request)?;

        let mut system = None;
        let mut messages: Vec<Message> = Vec::new();
        let mut previous_was_tool = false;

        for (i, msg) in wire.messages.into_iter().enumerate() {
            let is_tool = msg.role == "tool";
            if msg.role == "system" || msg.role == "developer" {
                // Last one wins
                system = Some(msg.content.unwrap_or_default().flatten(self.separator())?);
            } else if is_tool {
                let block = tool_result_block(i, msg)?;
                match messages.last_mut() {
                    Some(Message {
                        content: Content::Blocks(blocks),
                        ..
                    }) if previous_was_tool => blocks.push(block),
                    _ => messages.push(Message::new("user", Content::Blocks(vec![block]))),
                }
            } else {
                messages.push(self.decode_message(msg)?);
            }
            previous_was_tool = is_tool;
        }

        Ok(Request {
            model: wire.model,
            messages,
            system,
            max_tokens: wire.max_tokens.or(wire.max_completion_tokens).unwrap_or(0),
            temperature: wire.temperature.unwrap_or(0.0),
            stream: wire.stream.unwrap_or(false),
            metadata: wire.user.map(|user| serde_json::json!({ "user_id": user })),
            tools: wire
                .tools
                .unwrap_or_default()
                .into_iter()
                .map(|t| Tool {
                    name: t.function.name,
                    description: t.function.description,
                    input_schema: t.function.parameters,
                })
                .collect(),
            tool_choice: wire.tool_choice.as_ref().and_then(decode_tool_choice),
        })
    }

    fn decode_response(&self, data: &[u8]) -> Result<Response> {
        let wire: ChatCompletionResponse = decode_json(data, PROVIDER, PayloadKind::Response)?;

        let choice = wire
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| BridgeError::structural("no choices in OpenAI response"))?;

        let text = choice.message.content.unwrap_or_default();
        let tool_calls = choice.message.tool_calls.unwrap_or_default();

        let mut content = if tool_calls.is_empty() {
            recover_tool_markers(&text).unwrap_or_else(|| vec![ContentBlock::text(text)])
        } else if text.is_empty() {
            Vec::new()
        } else {
            vec![ContentBlock::text(text)]
        };

        for call in tool_calls {
            content.push(decode_tool_call(call)?);
        }

        let role = if choice.message.role.is_empty() {
            "assistant".to_string()
        } else {
            choice.message.role
        };

        Ok(Response {
            id: wire.id,
            response_type: "message".to_string(),
            role,
            content: Content::Blocks(content),
            model: wire.model,
            stop_reason: choice.finish_reason.as_deref().map(map_finish_reason),
            usage: wire
                .usage
                .map(|u| Usage::reported(u.prompt_tokens, u.completion_tokens, u.total_tokens)),
        })
    }

    fn encode_request(&self, req: &Request, ctx: &mut ToolConversionContext) -> Result<Vec<u8>> {
        let native_tools = ctx.capabilities.supports_tools;
        let mut messages = Vec::new();

        let system = if native_tools {
            req.system_text().map(str::to_string)
        } else {
            if !req.tools.is_empty() {
                ctx.record("tool_fallback", true);
                debug!(tools = req.tools.len(), "Describing tools in system prompt");
            }
            req.system_with_tool_list()
        };
        if let Some(system) = system {
            messages.push(ChatMessage::text("system", system));
        }

        for msg in &req.messages {
            if native_tools {
                messages.extend(self.encode_message(msg, ctx)?);
            } else {
                if msg.content.has_tool_blocks() {
                    ctx.bump("tool_markers");
                }
                let mut chat = ChatMessage::text(&msg.role, msg.content.flatten(self.separator())?);
                chat.name = msg.name.clone();
                messages.push(chat);
            }
        }

        let tools = (native_tools && !req.tools.is_empty())
            .then(|| req.tools.iter().map(chat_tool).collect());
        let tool_choice = if native_tools {
            req.tool_choice.as_ref().map(translate_tool_choice)
        } else {
            None
        };

        let user = req
            .metadata
            .as_ref()
            .and_then(|m| m.get("user_id"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let wire = ChatCompletionRequest {
            model: req.model.clone(),
            messages,
            max_tokens: (req.max_tokens > 0).then_some(req.max_tokens),
            max_completion_tokens: None,
            temperature: (req.temperature != 0.0).then_some(req.temperature),
            stream: req.stream.then_some(true),
            stream_options: req.stream.then_some(StreamOptions {
                include_usage: true,
            }),
            tools,
            tool_choice,
            user,
        };

        encode_json(&wire, PROVIDER, PayloadKind::Request)
    }

    fn encode_response(&self, resp: &Response, ctx: &mut ToolConversionContext) -> Result<Vec<u8>> {
        let (text, tool_calls) = match &resp.content {
            Content::Text(text) => (text.clone(), Vec::new()),
            Content::Blocks(blocks) => {
                self.split_tool_calls(blocks, ctx.capabilities.supports_tools, ctx)?
            }
            Content::Opaque(_) => {
                return Err(BridgeError::content_parse(
                    "response: expected a string or an array of content blocks",
                ))
            }
        };

        let finish_reason = match resp.stop_reason.as_deref() {
            Some(reason) => stop_reason_to_finish_reason(reason),
            None if !tool_calls.is_empty() => "tool_calls".to_string(),
            None => "stop".to_string(),
        };

        let content = if text.is_empty() && !tool_calls.is_empty() {
            None
        } else {
            Some(text)
        };

        let role = if resp.role.is_empty() {
            "assistant".to_string()
        } else {
            resp.role.clone()
        };

        let wire = ChatCompletionResponse {
            id: resp.id.clone(),
            object: "chat.completion".to_string(),
            created: 0,
            model: resp.model.clone(),
            choices: vec![Choice {
                index: 0,
                message: ChoiceMessage {
                    role,
                    content,
                    tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                },
                finish_reason: Some(finish_reason),
            }],
            usage: resp.usage.map(|u| ChatUsage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
                total_tokens: Some(u.total_tokens),
            }),
        };

        encode_json(&wire, PROVIDER, PayloadKind::Response)
    }
}

/// A checked `tool_calls` entry as a `tool_use` block.
fn decode_tool_call(call: ToolCall) -> Result<ContentBlock> {
    validate_tool_call(&call)?;
    let input = call
        .input()
        .map_err(|e| BridgeError::content_parse(format!("tool call arguments: {e}")))?;
    Ok(call.into_tool_use(input))
}

fn tool_result_block(index: usize, msg: ChatMessage) -> Result<ContentBlock> {
    let tool_use_id = msg
        .tool_call_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| BridgeError::structural(format!("tool message {index} has no tool_call_id")))?;

    let text = msg.content.unwrap_or_default().flatten("\n")?;
    let (text, is_error) = match text.strip_prefix("ERROR: ") {
        Some(rest) => (rest.to_string(), Some(true)),
        None => (text, None),
    };

    Ok(ContentBlock::ToolResult {
        tool_use_id,
        content: Some(Value::String(text)),
        is_error,
    })
}

fn chat_tool(tool: &Tool) -> ChatTool {
    ChatTool {
        tool_type: "function".to_string(),
        function: ChatFunction {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.input_schema.clone(),
        },
    }
}

fn translate_tool_choice(tc: &ToolChoice) -> ChatToolChoice {
    match tc {
        ToolChoice::Any => ChatToolChoice::String("required".to_string()),
        ToolChoice::None => ChatToolChoice::String("none".to_string()),
        ToolChoice::Auto => ChatToolChoice::String("auto".to_string()),
        ToolChoice::Tool { name } => ChatToolChoice::Specific(ChatToolChoiceSpecific {
            choice_type: "function".to_string(),
            function: ChatToolChoiceFunction { name: name.clone() },
        }),
    }
}

fn decode_tool_choice(tc: &ChatToolChoice) -> Option<ToolChoice> {
    match tc {
        ChatToolChoice::String(s) => match s.as_str() {
            "required" => Some(ToolChoice::Any),
            "none" => Some(ToolChoice::None),
            "auto" => Some(ToolChoice::Auto),
            _ => None,
        },
        ChatToolChoice::Specific(specific) => Some(ToolChoice::Tool {
            name: specific.function.name.clone(),
        }),
    }
}

/// Map `OpenAI` `finish_reason` to a generic stop reason.
#[must_use]
pub fn map_finish_reason(reason: &str) -> String {
    match reason {
        "stop" => "end_turn".to_string(),
        "length" => "max_tokens".to_string(),
        "tool_calls" | "function_call" => "tool_use".to_string(),
        "content_filter" => "end_turn".to_string(),
        other => other.to_string(),
    }
}

/// Map a generic stop reason back to an `OpenAI` `finish_reason`.
#[must_use]
pub fn stop_reason_to_finish_reason(reason: &str) -> String {
    match reason {
        "end_turn" | "stop_sequence" => "stop".to_string(),
        "max_tokens" => "length".to_string(),
        "tool_use" => "tool_calls".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::content::TOOL_USE_START;
    use serde_json::json;

    fn codec() -> OpenAiCodec {
        OpenAiCodec::new(OpenAiConfig::default())
    }

    fn ctx_for(codec: &OpenAiCodec) -> ToolConversionContext {
        ToolConversionContext::new("OpenAI", codec.capabilities())
    }

    fn decode(body: Value) -> Request {
        codec()
            .decode_request(&serde_json::to_vec(&body).unwrap())
            .unwrap()
    }

    fn encode(codec: &OpenAiCodec, req: &Request) -> Value {
        let mut ctx = ctx_for(codec);
        serde_json::from_slice(&codec.encode_request(req, &mut ctx).unwrap()).unwrap()
    }

    #[test]
    fn test_simple_text_request() {
        let req = decode(json!({
            "model": "gpt-4o",
            "messages": [
                {"role": "system", "content": "You are helpful."},
                {"role": "user", "content": "Hello"}
            ],
            "max_tokens": 256,
            "temperature": 0.7,
            "user": "u-1"
        }));
        assert_eq!(req.system.as_deref(), Some("You are helpful."));
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.messages[0].content, Content::text("Hello"));
        assert_eq!(req.max_tokens, 256);
        assert_eq!(req.metadata, Some(json!({"user_id": "u-1"})));
    }

    #[test]
    fn test_last_system_message_wins() {
        let req = decode(json!({
            "messages": [
                {"role": "system", "content": "first"},
                {"role": "developer", "content": "second"},
                {"role": "user", "content": "hi"}
            ]
        }));
        assert_eq!(req.system.as_deref(), Some("second"));
    }

    #[test]
    fn test_max_completion_tokens_accepted() {
        let req = decode(json!({"messages": [], "max_completion_tokens": 77}));
        assert_eq!(req.max_tokens, 77);
    }

    #[test]
    fn test_text_parts_joined_with_space() {
        let req = Request {
            messages: vec![Message::new(
                "user",
                Content::Blocks(vec![ContentBlock::text("Hello"), ContentBlock::text("world")]),
            )],
            ..Default::default()
        };
        let out = encode(&codec(), &req);
        assert_eq!(out["messages"][0]["content"], "Hello world");
    }

    #[test]
    fn test_opaque_content_stringified() {
        let req = Request {
            messages: vec![Message::new(
                "user",
                Content::Opaque(json!({"some": "object", "data": 123})),
            )],
            ..Default::default()
        };
        let out = encode(&codec(), &req);
        let text = out["messages"][0]["content"].as_str().unwrap();
        assert!(text.contains("some"));
    }

    #[test]
    fn test_tool_result_splits_into_tool_messages() {
        let req = Request {
            messages: vec![Message::new(
                "user",
                Content::Blocks(vec![
                    ContentBlock::ToolResult {
                        tool_use_id: "call_1".into(),
                        content: Some(json!("22C")),
                        is_error: None,
                    },
                    ContentBlock::ToolResult {
                        tool_use_id: "call_2".into(),
                        content: Some(json!("not found")),
                        is_error: Some(true),
                    },
                    ContentBlock::text("Thanks"),
                ]),
            )],
            ..Default::default()
        };
        let out = encode(&codec(), &req);
        let messages = out["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["role"], "tool");
        assert_eq!(messages[0]["tool_call_id"], "call_1");
        assert_eq!(messages[1]["content"], "ERROR: not found");
        assert_eq!(messages[2]["role"], "user");
        assert_eq!(messages[2]["content"], "Thanks");
    }

    #[test]
    fn test_assistant_tool_use_becomes_tool_calls() {
        let req = Request {
            tools: vec![Tool {
                name: "get_weather".into(),
                description: Some("Weather lookup".into()),
                input_schema: json!({"type": "object", "properties": {"city": {"type": "string"}}}),
            }],
            tool_choice: Some(ToolChoice::Any),
            messages: vec![Message::new(
                "assistant",
                Content::Blocks(vec![ContentBlock::ToolUse {
                    id: "call_1".into(),
                    name: "get_weather".into(),
                    input: json!({"city": "Paris"}),
                }]),
            )],
            ..Default::default()
        };
        let out = encode(&codec(), &req);
        let msg = &out["messages"][0];
        assert!(msg.get("content").is_none());
        assert_eq!(msg["tool_calls"][0]["function"]["name"], "get_weather");
        assert_eq!(
            msg["tool_calls"][0]["function"]["arguments"],
            r#"{"city":"Paris"}"#
        );
        assert_eq!(out["tools"][0]["function"]["parameters"]["type"], "object");
        assert_eq!(out["tool_choice"], "required");
    }

    #[test]
    fn test_consecutive_tool_messages_merge() {
        let req = decode(json!({
            "messages": [
                {"role": "user", "content": "weather?"},
                {"role": "assistant", "content": null, "tool_calls": [
                    {"id": "call_1", "type": "function", "function": {"name": "get_weather", "arguments": "{\"city\":\"Paris\"}"}},
                    {"id": "call_2", "type": "function", "function": {"name": "get_weather", "arguments": "{\"city\":\"Rome\"}"}}
                ]},
                {"role": "tool", "tool_call_id": "call_1", "content": "18C"},
                {"role": "tool", "tool_call_id": "call_2", "content": "ERROR: timeout"}
            ]
        }));
        assert_eq!(req.messages.len(), 3);
        let Content::Blocks(blocks) = &req.messages[1].content else {
            panic!("expected blocks");
        };
        assert_eq!(blocks.len(), 2);
        assert!(matches!(&blocks[0], ContentBlock::ToolUse { input, .. } if input["city"] == "Paris"));

        assert_eq!(req.messages[2].role, "user");
        let Content::Blocks(results) = &req.messages[2].content else {
            panic!("expected blocks");
        };
        assert_eq!(results.len(), 2);
        assert!(matches!(
            &results[1],
            ContentBlock::ToolResult { is_error: Some(true), content: Some(c), .. } if c == "timeout"
        ));
    }

    #[test]
    fn test_invalid_tool_call_arguments_rejected() {
        let body = json!({
            "messages": [{"role": "assistant", "tool_calls": [
                {"id": "call_1", "type": "function", "function": {"name": "f", "arguments": "{broken"}}
            ]}]
        });
        let err = codec()
            .decode_request(&serde_json::to_vec(&body).unwrap())
            .unwrap_err();
        assert!(matches!(err, BridgeError::ToolCallValidation(_)));
    }

    #[test]
    fn test_fallback_describes_tools_and_inlines_markers() {
        let codec = OpenAiCodec::new(OpenAiConfig {
            native_tools: false,
            ..Default::default()
        });
        let req = Request {
            system: Some("Be brief.".into()),
            tools: vec![Tool {
                name: "search".into(),
                description: Some("Search the web".into()),
                input_schema: json!({"type": "object", "properties": {"query": {"type": "string"}, "limit": {"type": "integer"}}}),
            }],
            messages: vec![Message::new(
                "assistant",
                Content::Blocks(vec![ContentBlock::ToolUse {
                    id: "t1".into(),
                    name: "search".into(),
                    input: json!({"query": "rust"}),
                }]),
            )],
            ..Default::default()
        };
        let out = encode(&codec, &req);
        assert!(out.get("tools").is_none());
        let system = out["messages"][0]["content"].as_str().unwrap();
        assert!(system.starts_with("Be brief.\n\nAvailable tools"));
        assert!(system.contains("- search: Search the web (parameters: limit, query)"));
        let text = out["messages"][1]["content"].as_str().unwrap();
        assert!(text.contains(TOOL_USE_START));
    }

    #[test]
    fn test_markers_in_text_are_recovered() {
        let marker = tool_marker(&ContentBlock::ToolUse {
            id: "t1".into(),
            name: "search".into(),
            input: json!({"query": "rust"}),
        })
        .unwrap()
        .unwrap();
        let req = decode(json!({"messages": [{"role": "assistant", "content": format!("Searching {marker}")}]}));
        let Content::Blocks(blocks) = &req.messages[0].content else {
            panic!("expected blocks");
        };
        assert_eq!(blocks.len(), 2);
        assert!(blocks[1].is_tool());
    }

    #[test]
    fn test_no_choices_is_structural_error() {
        let err = codec()
            .decode_response(br#"{"id":"test","choices":[]}"#)
            .unwrap_err();
        assert_eq!(err.to_string(), "no choices in OpenAI response");
    }

    #[test]
    fn test_tool_call_response() {
        let body = json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1,
            "model": "gpt-4o",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": null, "tool_calls": [
                    {"id": "call_1", "type": "function", "function": {"name": "get_weather", "arguments": "{\"city\":\"Paris\"}"}}
                ]},
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 8}
        });
        let resp = codec()
            .decode_response(&serde_json::to_vec(&body).unwrap())
            .unwrap();
        assert_eq!(resp.id, "chatcmpl-1");
        assert_eq!(resp.stop_reason.as_deref(), Some("tool_use"));
        assert_eq!(resp.usage.unwrap().total_tokens, 20);
        let Content::Blocks(blocks) = &resp.content else {
            panic!("expected blocks");
        };
        assert_eq!(blocks.len(), 1);
        assert!(matches!(&blocks[0], ContentBlock::ToolUse { name, .. } if name == "get_weather"));
    }

    #[test]
    fn test_malformed_tool_call_in_response_rejected() {
        let body = json!({
            "id": "chatcmpl-2",
            "choices": [{
                "message": {"role": "assistant", "tool_calls": [
                    {"id": "call_1", "type": "function", "function": {"name": "f", "arguments": "{broken"}}
                ]},
                "finish_reason": "tool_calls"
            }]
        });
        let err = codec()
            .decode_response(&serde_json::to_vec(&body).unwrap())
            .unwrap_err();
        assert!(matches!(err, BridgeError::ToolCallValidation(_)));
    }

    #[test]
    fn test_encode_response_defaults() {
        let resp = Response {
            id: "msg_1".into(),
            content: Content::Blocks(vec![ContentBlock::text("Hi")]),
            model: "claude".into(),
            usage: Some(Usage::new(3, 4)),
            ..Default::default()
        };
        let codec = codec();
        let mut ctx = ctx_for(&codec);
        let out: Value =
            serde_json::from_slice(&codec.encode_response(&resp, &mut ctx).unwrap()).unwrap();
        assert_eq!(out["object"], "chat.completion");
        assert_eq!(out["choices"][0]["message"]["role"], "assistant");
        assert_eq!(out["choices"][0]["message"]["content"], "Hi");
        assert_eq!(out["choices"][0]["finish_reason"], "stop");
        assert_eq!(out["usage"]["total_tokens"], 7);
    }

    #[test]
    fn test_finish_reason_mapping() {
        assert_eq!(map_finish_reason("stop"), "end_turn");
        assert_eq!(map_finish_reason("length"), "max_tokens");
        assert_eq!(map_finish_reason("tool_calls"), "tool_use");
        assert_eq!(map_finish_reason("function_call"), "tool_use");
        assert_eq!(map_finish_reason("content_filter"), "end_turn");
        assert_eq!(stop_reason_to_finish_reason("max_tokens"), "length");
        assert_eq!(stop_reason_to_finish_reason("tool_use"), "tool_calls");
    }
}
