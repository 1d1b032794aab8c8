//! Conversion between provider wire formats.
//!
//! Every format is decoded into the [`generic`] model and encoded back out of it.
//! Codecs are pure: no I/O, and the only clock or randomness lives in the
//! per-conversion [`ToolConversionContext`] built by the [`Converter`].

pub mod anthropic;
pub mod anthropic_types;
pub mod aws;
pub mod codec;
pub mod content;
pub mod context;
pub mod dispatcher;
pub mod generic;
pub mod google;
pub mod openai;
pub mod openai_types;
pub mod streaming;

pub use codec::Codec;
pub use content::{Content, ContentBlock};
pub use context::{Capabilities, ToolConversionContext};
pub use dispatcher::Converter;
pub use generic::{Message, Request, Response, Tool, ToolCall, ToolChoice, Usage};
pub use streaming::SseEvent;
