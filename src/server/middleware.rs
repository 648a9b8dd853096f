// HTTP middleware
// Author: kelexine (https://github.com/kelexine)

use crate::models::ResponseEnvelope;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use std::any::Any;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

/// Create request ID layers for the application
pub fn request_id_layers() -> (SetRequestIdLayer<MakeRequestUuid>, PropagateRequestIdLayer) {
    (
        SetRequestIdLayer::x_request_id(MakeRequestUuid),
        PropagateRequestIdLayer::x_request_id(),
    )
}

/// Turns a handler panic into a 500 envelope instead of a dropped connection.
pub fn catch_panic_layer() -> CatchPanicLayer<fn(Box<dyn Any + Send + 'static>) -> Response> {
    CatchPanicLayer::custom(panic_response as fn(Box<dyn Any + Send + 'static>) -> Response)
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!("Handler panicked: {}", crate::utils::logging::sanitize(detail));

    let envelope: ResponseEnvelope<Value> =
        ResponseEnvelope::failure("Internal server error", 500);
    (StatusCode::INTERNAL_SERVER_ERROR, Json(envelope)).into_response()
}

/// Rewrites error responses produced outside the handlers (body limit,
/// method mismatch, extractor rejections) into envelopes. Responses that are
/// already JSON pass through untouched.
pub async fn envelope_plain_errors(response: Response) -> Response {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    if is_json {
        return response;
    }

    let message = match status {
        StatusCode::PAYLOAD_TOO_LARGE => "Request body too large",
        StatusCode::METHOD_NOT_ALLOWED => "Method not allowed",
        _ => status.canonical_reason().unwrap_or("Request failed"),
    };
    tracing::debug!("Wrapping plain {} response in an envelope", status);

    let allow = response.headers().get(header::ALLOW).cloned();
    let envelope: ResponseEnvelope<Value> = ResponseEnvelope::failure(message, status.as_u16());
    let mut rewritten = (status, Json(envelope)).into_response();
    if let Some(allow) = allow {
        rewritten.headers_mut().insert(header::ALLOW, allow);
    }
    rewritten
}
