//! Whole-request checks on the generic model.

use crate::config::ConverterConfig;
use crate::convert::content::{Content, ContentBlock};
use crate::convert::generic::{Request, ToolCall};
use crate::error::{BridgeError, Result};

use super::schema::{validate_tool_schema, SchemaWarning};
use super::tool_call::validate_tool_call_arguments;

const ROLES: &[&str] = &["user", "assistant", "system"];

/// Validate a decoded request, returning schema warnings worth logging.
///
/// Roles, size limits and tool block identifiers are always checked. With
/// `validate_schemas` set, every tool schema is checked and every `tool_use`
/// naming a declared tool has its input checked against that tool's schema.
pub fn validate_request(req: &Request, config: &ConverterConfig) -> Result<Vec<SchemaWarning>> {
    if let Some(max) = config.max_messages {
        if req.messages.len() > max {
            return Err(BridgeError::invalid_request(format!(
                "too many messages: {} (max {max})",
                req.messages.len()
            )));
        }
    }
    if let Some(max) = config.max_tools {
        if req.tools.len() > max {
            return Err(BridgeError::invalid_request(format!(
                "too many tools: {} (max {max})",
                req.tools.len()
            )));
        }
    }

    check_sizes(req, config)?;

    for (i, msg) in req.messages.iter().enumerate() {
        if !ROLES.contains(&msg.role.as_str()) {
            return Err(BridgeError::invalid_request(format!(
                "message {i}: invalid role '{}'",
                msg.role
            )));
        }
        if let Content::Blocks(blocks) = &msg.content {
            for (j, block) in blocks.iter().enumerate() {
                check_block(block).map_err(|problem| {
                    BridgeError::invalid_request(format!("message {i}, block {j}: {problem}"))
                })?;
            }
        }
    }

    if !config.validate_schemas {
        return Ok(Vec::new());
    }

    let mut warnings = Vec::new();
    for tool in &req.tools {
        warnings.extend(validate_tool_schema(tool)?);
    }

    for msg in &req.messages {
        let Content::Blocks(blocks) = &msg.content else {
            continue;
        };
        for block in blocks {
            if let ContentBlock::ToolUse { id, name, input } = block {
                if let Some(tool) = req.tool(name) {
                    let call = ToolCall::from_tool_use(id, name, input)?;
                    validate_tool_call_arguments(&call, tool)?;
                }
            }
        }
    }

    Ok(warnings)
}

fn check_sizes(req: &Request, config: &ConverterConfig) -> Result<()> {
    if config.max_message_bytes.is_none() && config.max_request_bytes.is_none() {
        return Ok(());
    }

    let mut total: usize = 0;
    for (i, msg) in req.messages.iter().enumerate() {
        let size = serde_json::to_vec(msg)
            .map_err(|e| BridgeError::content_parse(e.to_string()))?
            .len();
        if let Some(max) = config.max_message_bytes {
            if size > max {
                return Err(BridgeError::invalid_request(format!(
                    "message {i}: message too large: {size} bytes (max {max})"
                )));
            }
        }
        total = total.saturating_add(size);
    }

    if let Some(max) = config.max_request_bytes {
        if total > max {
            return Err(BridgeError::invalid_request(format!(
                "request too large: {total} bytes (max {max})"
            )));
        }
    }
    Ok(())
}

fn check_block(block: &ContentBlock) -> std::result::Result<(), &'static str> {
    match block {
        ContentBlock::ToolUse { id, name, .. } => {
            if name.is_empty() {
                return Err("tool_use block requires a name");
            }
            if id.is_empty() {
                return Err("tool_use block requires an id");
            }
        }
        ContentBlock::ToolResult { tool_use_id, .. } if tool_use_id.is_empty() => {
            return Err("tool_result block requires a tool_use_id");
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::generic::{Message, Tool};
    use serde_json::json;

    fn weather_tool() -> Tool {
        Tool {
            name: "get_weather".into(),
            description: None,
            input_schema: json!({
                "type": "object",
                "properties": {"city": {"type": "string"}},
                "required": ["city"]
            }),
        }
    }

    fn tool_use(input: serde_json::Value) -> Message {
        Message::new(
            "assistant",
            Content::Blocks(vec![ContentBlock::ToolUse {
                id: "toolu_1".into(),
                name: "get_weather".into(),
                input,
            }]),
        )
    }

    #[test]
    fn test_valid_request() {
        let req = Request {
            tools: vec![weather_tool()],
            messages: vec![
                Message::new("user", Content::text("weather?")),
                tool_use(json!({"city": "Paris"})),
            ],
            ..Default::default()
        };
        assert!(validate_request(&req, &ConverterConfig::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_invalid_role() {
        let req = Request {
            messages: vec![Message::new("function", Content::text("x"))],
            ..Default::default()
        };
        let err = validate_request(&req, &ConverterConfig::default()).unwrap_err();
        assert!(err.to_string().contains("invalid role 'function'"));
    }

    #[test]
    fn test_tool_blocks_need_identifiers() {
        let req = Request {
            messages: vec![Message::new(
                "user",
                Content::Blocks(vec![ContentBlock::ToolResult {
                    tool_use_id: String::new(),
                    content: None,
                    is_error: None,
                }]),
            )],
            ..Default::default()
        };
        let err = validate_request(&req, &ConverterConfig::default()).unwrap_err();
        assert!(err.to_string().contains("tool_use_id"));
    }

    #[test]
    fn test_limits() {
        let config = ConverterConfig {
            max_messages: Some(1),
            ..Default::default()
        };
        let req = Request {
            messages: vec![
                Message::new("user", Content::text("a")),
                Message::new("user", Content::text("b")),
            ],
            ..Default::default()
        };
        assert!(validate_request(&req, &config).is_err());
    }

    #[test]
    fn test_size_limits() {
        let req = Request {
            messages: vec![
                Message::new("user", Content::text("a".repeat(100))),
                Message::new("assistant", Content::text("b".repeat(100))),
            ],
            ..Default::default()
        };
        assert!(validate_request(&req, &ConverterConfig::default()).is_ok());

        let per_message = ConverterConfig {
            max_message_bytes: Some(50),
            ..Default::default()
        };
        let err = validate_request(&req, &per_message).unwrap_err();
        assert!(err.to_string().contains("message 0: message too large"));

        let whole_request = ConverterConfig {
            max_message_bytes: Some(200),
            max_request_bytes: Some(150),
            ..Default::default()
        };
        let err = validate_request(&req, &whole_request).unwrap_err();
        assert!(err.to_string().contains("request too large"));
    }

    #[test]
    fn test_tool_use_checked_against_schema() {
        let req = Request {
            tools: vec![weather_tool()],
            messages: vec![tool_use(json!({"city": 42}))],
            ..Default::default()
        };
        let err = validate_request(&req, &ConverterConfig::default()).unwrap_err();
        assert!(matches!(err, BridgeError::ToolCallValidation(_)));

        let relaxed = ConverterConfig {
            validate_schemas: false,
            ..Default::default()
        };
        assert!(validate_request(&req, &relaxed).is_ok());
    }

    #[test]
    fn test_bad_schema_rejected() {
        let mut tool = weather_tool();
        tool.input_schema = json!({"type": "array"});
        let req = Request {
            tools: vec![tool],
            ..Default::default()
        };
        let err = validate_request(&req, &ConverterConfig::default()).unwrap_err();
        assert!(matches!(err, BridgeError::SchemaValidation(_)));
    }
}
