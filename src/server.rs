use crate::config::BridgeConfig;
use crate::convert::anthropic_types::ErrorResponse;
use crate::convert::generic::{Tool, ToolCall};
use crate::convert::{Converter, SseEvent};
use crate::error::{BridgeError, FormatSide};
use crate::format::MessageFormat;
use crate::validate::{validate_tool_call, validate_tool_call_arguments, validate_tool_schema};

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub struct AppState {
    pub config: BridgeConfig,
    pub converter: Converter,
}

impl AppState {
    #[must_use]
    pub fn new(config: BridgeConfig) -> Self {
        let converter = Converter::new(config.converter.clone());
        Self { config, converter }
    }
}

#[derive(Debug, Deserialize)]
pub struct ConvertParams {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Deserialize)]
pub struct ToolCallCheck {
    pub tool_call: ToolCall,
    pub tool: Tool,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/v1/convert/request", post(handle_convert_request))
        .route("/v1/convert/response", post(handle_convert_response))
        .route("/v1/convert/stream", post(handle_convert_stream))
        .route("/v1/validate/tool", post(handle_validate_tool))
        .route("/v1/validate/tool-call", post(handle_validate_tool_call))
        .route("/v1/formats", get(handle_formats))
        .route("/health", get(handle_health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn parse_formats(params: &ConvertParams) -> Result<(MessageFormat, MessageFormat), BridgeError> {
    let from = MessageFormat::from_name(&params.from)
        .ok_or_else(|| BridgeError::unsupported(FormatSide::Source, &params.from))?;
    let to = MessageFormat::from_name(&params.to)
        .ok_or_else(|| BridgeError::unsupported(FormatSide::Target, &params.to))?;
    Ok((from, to))
}

fn error_response(err: &BridgeError) -> Response {
    if err.is_client_error() {
        tracing::warn!("Conversion rejected: {}", err);
        let body = ErrorResponse::invalid_request(err.to_string());
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    } else {
        tracing::error!("Conversion failed: {}", err);
        let body = ErrorResponse::api_error(err.to_string());
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

fn json_bytes(body: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

async fn handle_convert_request(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ConvertParams>,
    body: Bytes,
) -> Response {
    let result = parse_formats(&params)
        .and_then(|(from, to)| state.converter.convert_request(&body, from, to));

    match result {
        Ok(out) => json_bytes(out),
        Err(e) => error_response(&e),
    }
}

async fn handle_convert_response(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ConvertParams>,
    body: Bytes,
) -> Response {
    let result = parse_formats(&params)
        .and_then(|(from, to)| state.converter.convert_response(&body, from, to));

    match result {
        Ok(out) => json_bytes(out),
        Err(e) => error_response(&e),
    }
}

/// Takes a JSON array of `{event, data}` objects and replays them as SSE after
/// conversion.
async fn handle_convert_stream(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ConvertParams>,
    body: Bytes,
) -> Response {
    let (from, to) = match parse_formats(&params) {
        Ok(formats) => formats,
        Err(e) => return error_response(&e),
    };

    let events: Vec<SseEvent> = match serde_json::from_slice(&body) {
        Ok(events) => events,
        Err(e) => {
            let err = ErrorResponse::invalid_request(format!("Invalid event list: {}", e));
            return (StatusCode::BAD_REQUEST, Json(err)).into_response();
        }
    };

    if let Some((i, problem)) = events
        .iter()
        .enumerate()
        .find_map(|(i, event)| event.framing_problem().map(|p| (i, p)))
    {
        let err = ErrorResponse::invalid_request(format!("Invalid event {}: {}", i, problem));
        return (StatusCode::BAD_REQUEST, Json(err)).into_response();
    }

    // Convert eagerly so the stream does not borrow the shared state.
    let converted: Vec<_> = state
        .converter
        .convert_event_stream(stream::iter(events), from, to)
        .collect()
        .await;

    let event_stream = stream::iter(converted).map(|result| -> Result<Event, Infallible> {
        let message = match result {
            Ok(sse_event) => match sse_event.framing_problem() {
                None => return Ok(Event::default().event(sse_event.event).data(sse_event.data)),
                Some(problem) => format!("Converted event cannot be sent: {}", problem),
            },
            Err(e) => e.to_string(),
        };
        Ok(Event::default()
            .event("error")
            .data(json!(ErrorResponse::invalid_request(message)).to_string()))
    });

    Sse::new(event_stream).into_response()
}

async fn handle_validate_tool(body: Bytes) -> Response {
    let tool: Tool = match serde_json::from_slice(&body) {
        Ok(t) => t,
        Err(e) => {
            let err = ErrorResponse::invalid_request(format!("Invalid tool definition: {}", e));
            return (StatusCode::BAD_REQUEST, Json(err)).into_response();
        }
    };

    match validate_tool_schema(&tool) {
        Ok(warnings) => Json(json!({ "valid": true, "warnings": warnings })).into_response(),
        Err(e) => {
            let err = ErrorResponse::invalid_request(BridgeError::from(e).to_string());
            (StatusCode::BAD_REQUEST, Json(err)).into_response()
        }
    }
}

async fn handle_validate_tool_call(body: Bytes) -> Response {
    let check: ToolCallCheck = match serde_json::from_slice(&body) {
        Ok(c) => c,
        Err(e) => {
            let err = ErrorResponse::invalid_request(format!("Invalid request body: {}", e));
            return (StatusCode::BAD_REQUEST, Json(err)).into_response();
        }
    };

    let result = validate_tool_call(&check.tool_call)
        .and_then(|()| validate_tool_call_arguments(&check.tool_call, &check.tool));

    match result {
        Ok(()) => Json(json!({ "valid": true })).into_response(),
        Err(e) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "valid": false, "error": e })),
        )
            .into_response(),
    }
}

async fn handle_formats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let formats: Vec<_> = state
        .converter
        .formats()
        .into_iter()
        .map(|format| {
            let info = format.info();
            let capabilities = state
                .converter
                .codec(format)
                .map(|codec| codec.capabilities())
                .unwrap_or_default();
            json!({
                "name": info.name,
                "aliases": info.aliases,
                "description": info.description,
                "capabilities": capabilities,
            })
        })
        .collect();

    Json(json!({ "formats": formats }))
}

async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "validate_schemas": state.config.converter.validate_schemas,
    }))
}
