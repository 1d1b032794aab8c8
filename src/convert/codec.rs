//! The codec trait every provider format implements.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::context::{Capabilities, ToolConversionContext};
use super::generic::{Request, Response};
use super::streaming::SseEvent;
use crate::error::{BridgeError, PayloadKind, Result};
use crate::format::MessageFormat;

/// Translates one provider's wire format to and from the generic model.
///
/// Implementors provide the typed `decode_*`/`encode_*` methods; the byte-level
/// [`to_generic`](Codec::to_generic) and [`from_generic`](Codec::from_generic)
/// come for free.
pub trait Codec: Send + Sync {
    fn format(&self) -> MessageFormat;

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    fn decode_request(&self, data: &[u8]) -> Result<Request>;

    fn decode_response(&self, data: &[u8]) -> Result<Response>;

    fn encode_request(&self, req: &Request, ctx: &mut ToolConversionContext) -> Result<Vec<u8>>;

    fn encode_response(&self, resp: &Response, ctx: &mut ToolConversionContext)
        -> Result<Vec<u8>>;

    /// Provider bytes to generic JSON bytes.
    fn to_generic(&self, data: &[u8], is_request: bool) -> Result<Vec<u8>> {
        if is_request {
            self.decode_request(data)?.to_vec()
        } else {
            self.decode_response(data)?.to_vec()
        }
    }

    /// Generic JSON bytes to provider bytes.
    fn from_generic(&self, data: &[u8], is_request: bool) -> Result<Vec<u8>> {
        let mut ctx =
            ToolConversionContext::new(self.format().provider_name(), self.capabilities());
        if is_request {
            self.encode_request(&Request::from_slice(data)?, &mut ctx)
        } else {
            self.encode_response(&Response::from_slice(data)?, &mut ctx)
        }
    }

    /// Rewrite one streamed event for `target`. The default hands it back unchanged.
    fn transform_stream_event(&self, event: SseEvent, _target: MessageFormat) -> Result<SseEvent> {
        Ok(event)
    }
}

/// Parse a provider payload. `null` yields the type's default.
pub(crate) fn decode_json<T>(data: &[u8], provider: &'static str, kind: PayloadKind) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    serde_json::from_slice::<Option<T>>(data)
        .map(Option::unwrap_or_default)
        .map_err(|source| BridgeError::Unmarshal {
            provider,
            kind,
            source,
        })
}

pub(crate) fn encode_json<T: Serialize>(
    value: &T,
    provider: &'static str,
    kind: PayloadKind,
) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|source| BridgeError::Marshal {
        provider,
        kind,
        source,
    })
}
