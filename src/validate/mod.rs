//! Validation run before conversion: tool schemas, tool-call arguments and the
//! overall request shape.

pub mod request;
pub mod schema;
pub mod tool_call;

pub use request::validate_request;
pub use schema::{validate_tool_schema, SchemaError, SchemaWarning, MAX_SCHEMA_DEPTH};
pub use tool_call::{validate_tool_call, validate_tool_call_arguments, ToolCallError, ToolCallErrorKind};
