//! Error types for the conversion engine.

use std::fmt;

use thiserror::Error;

use crate::format::MessageFormat;
use crate::validate::schema::SchemaError;
use crate::validate::tool_call::ToolCallError;

/// Whether a payload is a request or a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Request,
    Response,
}

impl PayloadKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Response => "response",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which end of a conversion a format was named for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatSide {
    Source,
    Target,
}

impl fmt::Display for FormatSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Target => f.write_str("target"),
        }
    }
}

/// Dispatcher phase an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Decode,
    Validate,
    Encode,
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BridgeError {
    #[error("failed to unmarshal {provider} {kind}: {source}")]
    Unmarshal {
        provider: &'static str,
        kind: PayloadKind,
        source: serde_json::Error,
    },

    #[error("failed to marshal {provider} {kind}: {source}")]
    Marshal {
        provider: &'static str,
        kind: PayloadKind,
        source: serde_json::Error,
    },

    /// The payload parsed but lacks a part every conversion needs.
    #[error("{message}")]
    Structural { message: String },

    #[error("failed to parse content: {message}")]
    ContentParse { message: String },

    #[error("schema validation failed: {0}")]
    SchemaValidation(#[from] SchemaError),

    #[error("{0}")]
    ToolCallValidation(Box<ToolCallError>),

    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("unsupported {side} format: {format}")]
    UnsupportedFormat { side: FormatSide, format: String },

    #[error("failed to convert to generic format from {format}: {source}")]
    SourceDecode {
        format: MessageFormat,
        source: Box<BridgeError>,
    },

    #[error("request validation failed: {source}")]
    Validation { source: Box<BridgeError> },

    #[error("failed to convert from generic format to {format}: {source}")]
    TargetEncode {
        format: MessageFormat,
        source: Box<BridgeError>,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl BridgeError {
    pub fn structural(msg: impl Into<String>) -> Self {
        Self::Structural {
            message: msg.into(),
        }
    }

    pub fn content_parse(msg: impl Into<String>) -> Self {
        Self::ContentParse {
            message: msg.into(),
        }
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(side: FormatSide, format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            side,
            format: format.into(),
        }
    }

    pub fn source_decode(format: MessageFormat, err: BridgeError) -> Self {
        Self::SourceDecode {
            format,
            source: Box::new(err),
        }
    }

    pub fn validation(err: BridgeError) -> Self {
        Self::Validation {
            source: Box::new(err),
        }
    }

    pub fn target_encode(format: MessageFormat, err: BridgeError) -> Self {
        Self::TargetEncode {
            format,
            source: Box::new(err),
        }
    }

    /// The dispatcher phase this error was wrapped in, if any.
    #[must_use]
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::SourceDecode { .. } => Some(Phase::Decode),
            Self::Validation { .. } => Some(Phase::Validate),
            Self::TargetEncode { .. } => Some(Phase::Encode),
            _ => None,
        }
    }

    /// The innermost error, with phase wrappers peeled off.
    #[must_use]
    pub fn root_cause(&self) -> &BridgeError {
        match self {
            Self::SourceDecode { source, .. }
            | Self::Validation { source }
            | Self::TargetEncode { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// True when the caller sent something unconvertible, as opposed to a local fault.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self.root_cause(),
            Self::Config { .. } | Self::Io(_) | Self::Toml(_) | Self::Marshal { .. }
        )
    }
}

impl From<ToolCallError> for BridgeError {
    fn from(err: ToolCallError) -> Self {
        Self::ToolCallValidation(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
