//! Per-conversion bookkeeping handed to encoders.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// What a target format can express natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub supports_tools: bool,
    pub supports_streaming: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            supports_tools: true,
            supports_streaming: true,
        }
    }
}

/// Created fresh for every conversion and never shared between them.
#[derive(Debug, Clone, Serialize)]
pub struct ToolConversionContext {
    pub request_id: String,
    pub provider_name: String,
    pub capabilities: Capabilities,
    pub start_time: DateTime<Utc>,
    pub metadata: Map<String, Value>,
}

impl ToolConversionContext {
    pub fn new(provider_name: impl Into<String>, capabilities: Capabilities) -> Self {
        Self {
            request_id: format!("req_{}", uuid::Uuid::new_v4().to_string().replace('-', "")),
            provider_name: provider_name.into(),
            capabilities,
            start_time: Utc::now(),
            metadata: Map::new(),
        }
    }

    pub fn record(&mut self, key: &str, value: impl Into<Value>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    /// Increment a counter in the metadata map.
    pub fn bump(&mut self, key: &str) {
        let next = self
            .metadata
            .get(key)
            .and_then(Value::as_u64)
            .unwrap_or(0)
            + 1;
        self.metadata.insert(key.to_string(), Value::from(next));
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.start_time).num_milliseconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_unique() {
        let a = ToolConversionContext::new("OpenAI", Capabilities::default());
        let b = ToolConversionContext::new("OpenAI", Capabilities::default());
        assert!(a.request_id.starts_with("req_"));
        assert_ne!(a.request_id, b.request_id);
        assert!(a.elapsed_ms() >= 0);
    }

    #[test]
    fn test_bump_counts() {
        let mut ctx = ToolConversionContext::new("Google", Capabilities::default());
        ctx.bump("tool_markers");
        ctx.bump("tool_markers");
        ctx.record("fallback", true);
        assert_eq!(ctx.metadata["tool_markers"], 2);
        assert_eq!(ctx.metadata["fallback"], true);
    }
}
