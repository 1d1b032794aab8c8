//! Server-sent events as seen by the conversion layer.
//!
//! Stream translation is a pass-through for every built-in codec: events are
//! handed back unchanged. Codecs that learn to rewrite event payloads override
//! [`Codec::transform_stream_event`](super::codec::Codec::transform_stream_event).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SseEvent {
    #[serde(default)]
    pub event: String,
    pub data: String,
}

impl SseEvent {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }

    /// Why this event cannot be written as an SSE frame, if it cannot.
    ///
    /// Event names may not contain line breaks; data may contain `\n` (it is
    /// split over several `data:` lines) but not `\r`.
    #[must_use]
    pub fn framing_problem(&self) -> Option<&'static str> {
        if self.event.contains(['\n', '\r']) {
            Some("event name contains a line break")
        } else if self.data.contains('\r') {
            Some("event data contains a carriage return")
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framing_problems() {
        assert_eq!(SseEvent::new("message_start", "{\n}").framing_problem(), None);
        assert!(SseEvent::new("a\nb", "x").framing_problem().is_some());
        assert!(SseEvent::new("a\rb", "x").framing_problem().is_some());
        assert!(SseEvent::new("ping", "x\r\ny").framing_problem().is_some());
    }
}
