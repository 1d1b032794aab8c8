//! Routes a payload from one format to another through the generic model.
//!
//! A conversion runs three phases: decode with the source codec, validate the
//! generic request, encode with the target codec. Errors from each phase are
//! wrapped so the caller can tell where a conversion failed. `generic` is
//! accepted on either side without a registered codec.

use std::collections::HashMap;

use futures::stream::{Stream, StreamExt};
use tracing::{debug, info, info_span};

use super::anthropic::AnthropicCodec;
use super::aws::AwsCodec;
use super::codec::Codec;
use super::context::{Capabilities, ToolConversionContext};
use super::generic::{Request, Response};
use super::google::GoogleCodec;
use super::openai::OpenAiCodec;
use super::streaming::SseEvent;
use crate::config::ConverterConfig;
use crate::error::{BridgeError, FormatSide, Result};
use crate::format::MessageFormat;
use crate::validate::validate_request;

pub struct Converter {
    codecs: HashMap<MessageFormat, Box<dyn Codec>>,
    config: ConverterConfig,
}

/// One side of a conversion: a registered codec or the generic model itself.
#[derive(Clone, Copy)]
enum Endpoint<'a> {
    Generic,
    Codec(&'a dyn Codec),
}

impl Endpoint<'_> {
    fn capabilities(&self) -> Capabilities {
        match self {
            Endpoint::Generic => Capabilities::default(),
            Endpoint::Codec(codec) => codec.capabilities(),
        }
    }

    fn decode_request(&self, data: &[u8]) -> Result<Request> {
        match self {
            Endpoint::Generic => Request::from_slice(data),
            Endpoint::Codec(codec) => codec.decode_request(data),
        }
    }

    fn decode_response(&self, data: &[u8]) -> Result<Response> {
        match self {
            Endpoint::Generic => Response::from_slice(data),
            Endpoint::Codec(codec) => codec.decode_response(data),
        }
    }

    fn encode_request(&self, req: &Request, ctx: &mut ToolConversionContext) -> Result<Vec<u8>> {
        match self {
            Endpoint::Generic => req.to_vec(),
            Endpoint::Codec(codec) => codec.encode_request(req, ctx),
        }
    }

    fn encode_response(&self, resp: &Response, ctx: &mut ToolConversionContext) -> Result<Vec<u8>> {
        match self {
            Endpoint::Generic => resp.to_vec(),
            Endpoint::Codec(codec) => codec.encode_response(resp, ctx),
        }
    }
}

impl Converter {
    /// A converter with all built-in codecs registered.
    #[must_use]
    pub fn new(config: ConverterConfig) -> Self {
        let mut converter = Self::empty(config);
        converter.register(Box::new(AnthropicCodec::new()));
        converter.register(Box::new(OpenAiCodec::new(converter.config.openai.clone())));
        converter.register(Box::new(GoogleCodec::new(converter.config.google.clone())));
        converter.register(Box::new(AwsCodec::new(converter.config.aws.clone())));
        converter
    }

    /// A converter with no codecs; only generic-to-generic works until codecs are registered.
    #[must_use]
    pub fn empty(config: ConverterConfig) -> Self {
        Self {
            codecs: HashMap::new(),
            config,
        }
    }

    /// Register a codec under its own format, returning the one it replaced.
    pub fn register(&mut self, codec: Box<dyn Codec>) -> Option<Box<dyn Codec>> {
        self.codecs.insert(codec.format(), codec)
    }

    #[must_use]
    pub fn codec(&self, format: MessageFormat) -> Option<&dyn Codec> {
        self.codecs.get(&format).map(|codec| &**codec)
    }

    /// Formats usable on either side of a conversion, sorted.
    #[must_use]
    pub fn formats(&self) -> Vec<MessageFormat> {
        let mut formats: Vec<MessageFormat> = self.codecs.keys().copied().collect();
        if !formats.contains(&MessageFormat::Generic) {
            formats.push(MessageFormat::Generic);
        }
        formats.sort();
        formats
    }

    #[must_use]
    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    fn endpoint(&self, format: MessageFormat, side: FormatSide) -> Result<Endpoint<'_>> {
        match self.codecs.get(&format) {
            Some(codec) => Ok(Endpoint::Codec(&**codec)),
            None if format == MessageFormat::Generic => Ok(Endpoint::Generic),
            None => Err(BridgeError::unsupported(side, format.as_str())),
        }
    }

    pub fn convert_request(
        &self,
        data: &[u8],
        from: MessageFormat,
        to: MessageFormat,
    ) -> Result<Vec<u8>> {
        if from == to {
            return Ok(data.to_vec());
        }

        let source = self.endpoint(from, FormatSide::Source)?;
        let target = self.endpoint(to, FormatSide::Target)?;
        let mut ctx = ToolConversionContext::new(to.provider_name(), target.capabilities());

        let span = info_span!("convert_request", request_id = %ctx.request_id, %from, %to);
        let _guard = span.enter();

        let request = source
            .decode_request(data)
            .map_err(|e| BridgeError::source_decode(from, e))?;

        let warnings = validate_request(&request, &self.config).map_err(BridgeError::validation)?;

        let out = target
            .encode_request(&request, &mut ctx)
            .map_err(|e| BridgeError::target_encode(to, e))?;

        info!(
            messages = request.messages.len(),
            tools = request.tools.len(),
            schema_warnings = warnings.len(),
            elapsed_ms = ctx.elapsed_ms(),
            "Converted request"
        );
        if !ctx.metadata.is_empty() {
            debug!(metadata = %serde_json::Value::Object(ctx.metadata.clone()), "Conversion details");
        }

        Ok(out)
    }

    pub fn convert_response(
        &self,
        data: &[u8],
        from: MessageFormat,
        to: MessageFormat,
    ) -> Result<Vec<u8>> {
        if from == to {
            return Ok(data.to_vec());
        }

        let source = self.endpoint(from, FormatSide::Source)?;
        let target = self.endpoint(to, FormatSide::Target)?;
        let mut ctx = ToolConversionContext::new(to.provider_name(), target.capabilities());

        let span = info_span!("convert_response", request_id = %ctx.request_id, %from, %to);
        let _guard = span.enter();

        let response = source
            .decode_response(data)
            .map_err(|e| BridgeError::source_decode(from, e))?;

        let out = target
            .encode_response(&response, &mut ctx)
            .map_err(|e| BridgeError::target_encode(to, e))?;

        info!(
            stop_reason = response.stop_reason.as_deref().unwrap_or(""),
            elapsed_ms = ctx.elapsed_ms(),
            "Converted response"
        );

        Ok(out)
    }

    /// Translate one streamed event. Built-in codecs pass events through unchanged.
    pub fn convert_stream_event(
        &self,
        event: SseEvent,
        from: MessageFormat,
        to: MessageFormat,
    ) -> Result<SseEvent> {
        if from == to {
            return Ok(event);
        }

        let source = self.endpoint(from, FormatSide::Source)?;
        self.endpoint(to, FormatSide::Target)?;

        match source {
            Endpoint::Generic => Ok(event),
            Endpoint::Codec(codec) => codec.transform_stream_event(event, to),
        }
    }

    /// Lazily translate a stream of events.
    pub fn convert_event_stream<'a, S>(
        &'a self,
        events: S,
        from: MessageFormat,
        to: MessageFormat,
    ) -> impl Stream<Item = Result<SseEvent>> + 'a
    where
        S: Stream<Item = SseEvent> + 'a,
    {
        events.map(move |event| self.convert_stream_event(event, from, to))
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(ConverterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Phase;
    use serde_json::{json, Value};

    fn converter() -> Converter {
        Converter::default()
    }

    fn to_value(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }

    #[test]
    fn test_identity_returns_input_unchanged() {
        let input = br#"{"not": "even validated"#;
        for format in [MessageFormat::OpenAi, MessageFormat::Google] {
            assert_eq!(
                converter().convert_request(input, format, format).unwrap(),
                input.to_vec()
            );
            assert_eq!(
                converter().convert_response(input, format, format).unwrap(),
                input.to_vec()
            );
        }
    }

    #[test]
    fn test_unsupported_formats() {
        let empty = Converter::empty(ConverterConfig::default());
        let err = empty
            .convert_request(b"{}", MessageFormat::OpenAi, MessageFormat::Anthropic)
            .unwrap_err();
        assert_eq!(err.to_string(), "unsupported source format: openai");

        let err = empty
            .convert_request(b"{}", MessageFormat::Generic, MessageFormat::Anthropic)
            .unwrap_err();
        assert_eq!(err.to_string(), "unsupported target format: anthropic");
    }

    #[test]
    fn test_generic_endpoints_need_no_codec() {
        let empty = Converter::empty(ConverterConfig::default());
        let out = converter()
            .convert_request(
                br#"{"model":"gpt-4o","messages":[{"role":"user","content":"Hi"}]}"#,
                MessageFormat::OpenAi,
                MessageFormat::Generic,
            )
            .unwrap();
        assert_eq!(to_value(&out)["messages"][0]["content"], "Hi");
        assert!(empty
            .convert_request(&out, MessageFormat::Generic, MessageFormat::Generic)
            .is_ok());
    }

    #[test]
    fn test_openai_to_anthropic_request() {
        let input = json!({
            "model": "gpt-4o",
            "messages": [
                {"role": "system", "content": "Be terse."},
                {"role": "user", "content": "Hello"}
            ],
            "max_tokens": 100
        });
        let out = converter()
            .convert_request(
                &serde_json::to_vec(&input).unwrap(),
                MessageFormat::OpenAi,
                MessageFormat::Anthropic,
            )
            .unwrap();
        let out = to_value(&out);
        assert_eq!(out["system"], "Be terse.");
        assert_eq!(out["max_tokens"], 100);
        assert_eq!(
            out["messages"][0]["content"],
            json!([{"type": "text", "text": "Hello"}])
        );
    }

    #[test]
    fn test_decode_errors_are_wrapped() {
        let err = converter()
            .convert_request(b"{bad", MessageFormat::OpenAi, MessageFormat::Anthropic)
            .unwrap_err();
        assert_eq!(err.phase(), Some(Phase::Decode));
        let message = err.to_string();
        assert!(message.contains("failed to convert to generic format"));
        assert!(message.contains("failed to unmarshal OpenAI request"));
    }

    #[test]
    fn test_structural_error_in_response() {
        let err = converter()
            .convert_response(
                br#"{"candidates": []}"#,
                MessageFormat::Google,
                MessageFormat::OpenAi,
            )
            .unwrap_err();
        assert!(err.to_string().contains("no candidates in Google response"));
    }

    #[test]
    fn test_validation_phase() {
        let input = json!({
            "model": "claude",
            "max_tokens": 10,
            "messages": [{"role": "user", "content": "hi"}],
            "tools": [{"name": "bad", "input_schema": {"type": "string"}}]
        });
        let err = converter()
            .convert_request(
                &serde_json::to_vec(&input).unwrap(),
                MessageFormat::Anthropic,
                MessageFormat::OpenAi,
            )
            .unwrap_err();
        assert_eq!(err.phase(), Some(Phase::Validate));
        assert!(matches!(err.root_cause(), BridgeError::SchemaValidation(_)));
    }

    #[test]
    fn test_encode_errors_are_wrapped() {
        let input = json!({"messages": [{"role": "user", "content": {"odd": true}}]});
        let err = converter()
            .convert_request(
                &serde_json::to_vec(&input).unwrap(),
                MessageFormat::Generic,
                MessageFormat::Anthropic,
            )
            .unwrap_err();
        assert_eq!(err.phase(), Some(Phase::Encode));
        assert!(err.to_string().contains("failed to parse content"));
    }

    #[test]
    fn test_register_replaces_codec() {
        let mut converter = Converter::empty(ConverterConfig::default());
        assert!(converter.register(Box::new(AnthropicCodec::new())).is_none());
        assert!(converter.register(Box::new(AnthropicCodec::new())).is_some());
        assert_eq!(
            converter.formats(),
            vec![MessageFormat::Anthropic, MessageFormat::Generic]
        );
    }

    #[test]
    fn test_stream_events_pass_through() {
        let event = SseEvent::new("message_start", r#"{"type":"message_start"}"#);
        let out = converter()
            .convert_stream_event(event.clone(), MessageFormat::Anthropic, MessageFormat::OpenAi)
            .unwrap();
        assert_eq!(out, event);

        let empty = Converter::empty(ConverterConfig::default());
        assert!(empty
            .convert_stream_event(event, MessageFormat::Google, MessageFormat::OpenAi)
            .is_err());
    }

    #[test]
    fn test_event_stream_is_lazy_map() {
        let converter = converter();
        let events = futures::stream::iter(vec![
            SseEvent::new("a", "1"),
            SseEvent::new("b", "2"),
        ]);
        let out: Vec<_> = tokio_test::block_on(
            converter
                .convert_event_stream(events, MessageFormat::OpenAi, MessageFormat::Anthropic)
                .collect(),
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].as_ref().unwrap().data, "2");
    }
}
