//! Wire formats known to the converter.
//!
//! Each format has a canonical lowercase name plus a few aliases so callers can
//! say `gemini` or `bedrock` instead of the provider's company name.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageFormat {
    Anthropic,
    OpenAi,
    Google,
    Aws,
    /// The intermediate model itself, readable and writable without a codec.
    Generic,
}

#[derive(Debug, Clone)]
pub struct FormatInfo {
    pub format: MessageFormat,
    pub name: &'static str,
    pub provider: &'static str,
    pub aliases: &'static [&'static str],
    pub description: &'static str,
}

const FORMATS: &[FormatInfo] = &[
    FormatInfo {
        format: MessageFormat::Anthropic,
        name: "anthropic",
        provider: "Anthropic",
        aliases: &["claude"],
        description: "Anthropic Messages API",
    },
    FormatInfo {
        format: MessageFormat::OpenAi,
        name: "openai",
        provider: "OpenAI",
        aliases: &["chat-completions"],
        description: "OpenAI Chat Completions API",
    },
    FormatInfo {
        format: MessageFormat::Google,
        name: "google",
        provider: "Google",
        aliases: &["gemini"],
        description: "Google Gemini generateContent API",
    },
    FormatInfo {
        format: MessageFormat::Aws,
        name: "aws",
        provider: "AWS",
        aliases: &["bedrock"],
        description: "AWS Bedrock InvokeModel body for Anthropic models",
    },
    FormatInfo {
        format: MessageFormat::Generic,
        name: "generic",
        provider: "generic",
        aliases: &[],
        description: "Provider-neutral intermediate model",
    },
];

impl MessageFormat {
    /// Case-insensitive lookup by canonical name or alias.
    #[must_use]
    pub fn from_name(name: &str) -> Option<MessageFormat> {
        let name = name.trim().to_lowercase();
        FORMATS
            .iter()
            .find(|f| f.name == name || f.aliases.contains(&name.as_str()))
            .map(|f| f.format)
    }

    #[must_use]
    pub fn all() -> &'static [FormatInfo] {
        FORMATS
    }

    #[must_use]
    pub fn info(&self) -> &'static FormatInfo {
        match FORMATS.iter().find(|f| f.format == *self) {
            Some(info) => info,
            None => &FORMATS[FORMATS.len() - 1],
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        self.info().name
    }

    /// Provider name as it appears in error messages ("OpenAI", "AWS", ...).
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.info().provider
    }
}

impl fmt::Display for MessageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
