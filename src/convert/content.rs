//! Message content normalization.
//!
//! Content arrives as a bare string, an array of typed blocks, or whatever other
//! JSON a source happens to send. The shape is settled once at decode time into
//! [`Content`], and codecs match on that instead of re-probing raw JSON.
//!
//! Formats without native tool support carry tool blocks inline as marker text:
//! `__TOOL_USE_START__{json}__TOOL_USE_END__` and the `TOOL_RESULT` pair. Decoders
//! recover those markers back into typed blocks.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{BridgeError, Result};

pub const TOOL_USE_START: &str = "__TOOL_USE_START__";
pub const TOOL_USE_END: &str = "__TOOL_USE_END__";
pub const TOOL_RESULT_START: &str = "__TOOL_RESULT_START__";
pub const TOOL_RESULT_END: &str = "__TOOL_RESULT_END__";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Blocks(Vec<ContentBlock>),
    /// Any other JSON. Flattening renders it as compact JSON text, which is lossy.
    Opaque(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
    /// A block this crate has no model for (`image`, `thinking`, ...), kept verbatim.
    #[serde(untagged)]
    Other(Value),
}

impl Default for Content {
    fn default() -> Self {
        Content::Text(String::new())
    }
}

impl<'de> Deserialize<'de> for Content {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Content::from_value(value))
    }
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Content::Text(text.into())
    }

    /// Classify raw JSON. Null becomes empty text. Arrays are read block by
    /// block; unknown entries are kept as [`ContentBlock::Other`] next to the
    /// typed ones, and an array with no typed block at all stays opaque.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Content::Text(String::new()),
            Value::String(s) => Content::Text(s),
            Value::Array(items) => {
                let blocks: Vec<ContentBlock> = items.iter().map(ContentBlock::from_value).collect();
                if blocks.iter().all(ContentBlock::is_other) {
                    Content::Opaque(Value::Array(items))
                } else {
                    Content::Blocks(blocks)
                }
            }
            other => Content::Opaque(other),
        }
    }

    /// Plain text that may carry tool markers.
    #[must_use]
    pub fn from_flat_text(text: String) -> Self {
        match recover_tool_markers(&text) {
            Some(blocks) => Content::Blocks(blocks),
            None => Content::Text(text),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Content::Text(s) => s.is_empty(),
            Content::Blocks(blocks) => blocks.is_empty(),
            Content::Opaque(v) => v.is_null(),
        }
    }

    #[must_use]
    pub fn has_tool_blocks(&self) -> bool {
        match self {
            Content::Blocks(blocks) => blocks.iter().any(ContentBlock::is_tool),
            _ => false,
        }
    }

    /// Render as a single string: text blocks verbatim, tool blocks as markers,
    /// joined with `separator`.
    pub fn flatten(&self, separator: &str) -> Result<String> {
        match self {
            Content::Text(s) => Ok(s.clone()),
            Content::Blocks(blocks) => {
                let mut parts = Vec::with_capacity(blocks.len());
                for block in blocks {
                    match block {
                        ContentBlock::Text { text } => parts.push(text.clone()),
                        ContentBlock::Other(value) => parts.push(stringify(value)?),
                        other => {
                            if let Some(marker) = tool_marker(other)? {
                                parts.push(marker);
                            }
                        }
                    }
                }
                Ok(parts.join(separator))
            }
            Content::Opaque(value) => {
                tracing::debug!("Flattening non-standard content to JSON text");
                stringify(value)
            }
        }
    }
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    /// Read one array entry, falling back to [`ContentBlock::Other`].
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        ContentBlock::deserialize(value).unwrap_or_else(|_| ContentBlock::Other(value.clone()))
    }

    #[must_use]
    pub fn is_tool(&self) -> bool {
        matches!(self, ContentBlock::ToolUse { .. } | ContentBlock::ToolResult { .. })
    }

    #[must_use]
    pub fn is_other(&self) -> bool {
        matches!(self, ContentBlock::Other(_))
    }
}

/// Text of all `text` blocks joined with `separator`; tool blocks are skipped.
#[must_use]
pub fn join_text(blocks: &[ContentBlock], separator: &str) -> String {
    blocks
        .iter()
        .filter_map(|b| match b {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(separator)
}

/// Compact JSON text of an arbitrary value.
pub fn stringify(value: &Value) -> Result<String> {
    serde_json::to_string(value).map_err(|e| BridgeError::content_parse(e.to_string()))
}

/// Marker text for a tool block, `None` for plain text.
pub fn tool_marker(block: &ContentBlock) -> Result<Option<String>> {
    let (start, end) = match block {
        ContentBlock::Text { .. } | ContentBlock::Other(_) => return Ok(None),
        ContentBlock::ToolUse { .. } => (TOOL_USE_START, TOOL_USE_END),
        ContentBlock::ToolResult { .. } => (TOOL_RESULT_START, TOOL_RESULT_END),
    };
    let payload =
        serde_json::to_string(block).map_err(|e| BridgeError::content_parse(e.to_string()))?;
    Ok(Some(format!("{start}{payload}{end}")))
}

/// Split text carrying tool markers back into typed blocks.
///
/// Returns `None` when no well-formed marker is present. Whitespace-only text
/// between markers is dropped. A marker whose payload does not parse stays in
/// the surrounding text.
#[must_use]
pub fn recover_tool_markers(text: &str) -> Option<Vec<ContentBlock>> {
    if !text.contains(TOOL_USE_START) && !text.contains(TOOL_RESULT_START) {
        return None;
    }

    let mut blocks = Vec::new();
    let mut recovered = false;
    let mut rest = text;

    loop {
        let next = [(TOOL_USE_START, TOOL_USE_END), (TOOL_RESULT_START, TOOL_RESULT_END)]
            .into_iter()
            .filter_map(|(open, close)| rest.find(open).map(|at| (at, open, close)))
            .min_by_key(|(at, _, _)| *at);
        let Some((at, open, close)) = next else {
            break;
        };
        let payload_start = at + open.len();
        let Some(len) = rest[payload_start..].find(close) else {
            break;
        };
        let marker_end = payload_start + len + close.len();

        match parse_marker_payload(&rest[payload_start..payload_start + len], open) {
            Some(block) => {
                push_text(&mut blocks, &rest[..at]);
                blocks.push(block);
                recovered = true;
            }
            None => push_text(&mut blocks, &rest[..marker_end]),
        }
        rest = &rest[marker_end..];
    }

    if !recovered {
        return None;
    }
    push_text(&mut blocks, rest);
    Some(blocks)
}

fn parse_marker_payload(payload: &str, open: &str) -> Option<ContentBlock> {
    let block = serde_json::from_str::<ContentBlock>(payload).ok()?;
    let matches_marker = match &block {
        ContentBlock::ToolUse { .. } => open == TOOL_USE_START,
        ContentBlock::ToolResult { .. } => open == TOOL_RESULT_START,
        ContentBlock::Text { .. } | ContentBlock::Other(_) => false,
    };
    matches_marker.then_some(block)
}

fn push_text(blocks: &mut Vec<ContentBlock>, segment: &str) {
    if segment.trim().is_empty() {
        return;
    }
    if let Some(ContentBlock::Text { text }) = blocks.last_mut() {
        text.push_str(segment);
        return;
    }
    blocks.push(ContentBlock::text(segment));
}

/// String form of a tool result body.
///
/// Text blocks are joined with newlines and errors get an `ERROR: ` prefix.
pub fn tool_result_text(content: Option<&Value>, is_error: bool) -> Result<String> {
    let text = match content {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(value) if value.is_array() => match Content::from_value(value.clone()) {
            Content::Blocks(blocks)
                if blocks.iter().all(|b| matches!(b, ContentBlock::Text { .. })) =>
            {
                join_text(&blocks, "\n")
            }
            _ => stringify(value)?,
        },
        Some(other) => stringify(other)?,
    };

    if is_error {
        Ok(format!("ERROR: {text}"))
    } else if text.is_empty() {
        Ok("(no content)".to_string())
    } else {
        Ok(text)
    }
}
