// HTTP request handlers
// Author: kelexine (https://github.com/kelexine)

use super::routes::AppState;
use crate::error::{GatewayError, Result};
use crate::gateway::{BinaryPayload, Forwarded, RouteId};
use crate::models::ResponseEnvelope;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, warn};

type QueryPairs = Query<Vec<(String, String)>>;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub checks: HashMap<String, HealthCheck>,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: String,
    pub message: String,
}

/// Liveness report. Does not call the backend.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut checks = HashMap::new();

    checks.insert(
        "backend".to_string(),
        HealthCheck {
            status: "ok".to_string(),
            message: format!("Backend base: {}", state.gateway.backend_url()),
        },
    );
    checks.insert(
        "configuration".to_string(),
        HealthCheck {
            status: "ok".to_string(),
            message: format!(
                "Session cookie: {}, {} routes",
                state.config.auth.cookie_name,
                crate::gateway::routes().len()
            ),
        },
    );

    Json(HealthResponse {
        status: HealthStatus::Healthy,
        checks,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

pub async fn metrics_handler() -> impl IntoResponse {
    (
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; version=0.0.4"),
        )],
        crate::metrics::gather_metrics(),
    )
}

/// Any path outside the route table.
pub async fn not_found_handler() -> Response {
    let envelope: ResponseEnvelope<Value> = ResponseEnvelope::failure("Route not found", 404);
    (StatusCode::NOT_FOUND, Json(envelope)).into_response()
}

/// Renders a gateway result as an envelope, keeping the backend's status.
fn respond<T: Serialize>(route: RouteId, started: Instant, result: Result<Forwarded<T>>) -> Response {
    let spec = route.spec();
    let mut response = match result {
        Ok(forwarded) => match serde_json::to_value(forwarded.data) {
            Ok(data) => {
                let status = StatusCode::from_u16(forwarded.status).unwrap_or(StatusCode::OK);
                (status, Json(ResponseEnvelope::from_value(data))).into_response()
            }
            Err(e) => failure(
                spec.name,
                GatewayError::Internal(format!("Failed to serialize response: {}", e)),
            ),
        },
        Err(err) => failure(spec.name, err),
    };

    if spec.no_store() {
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    }

    crate::metrics::record_gateway_request(
        spec.name,
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );
    response
}

fn failure(route: &str, err: GatewayError) -> Response {
    match &err {
        GatewayError::Validation(_) | GatewayError::Auth(_) => {
            debug!("Rejected {} locally: {}", route, err)
        }
        GatewayError::Upstream { status, message } => {
            warn!("Backend rejected {} with {}: {}", route, status, message)
        }
        // Transport failures are already logged with their detail by the client
        _ => {}
    }
    err.into_response()
}

fn binary_response(payload: BinaryPayload) -> Response {
    let content_type = HeaderValue::from_str(&payload.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(crate::gateway::DEFAULT_BINARY_CONTENT_TYPE));
    let disposition = HeaderValue::from_str(&payload.content_disposition())
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        payload.bytes,
    )
        .into_response()
}

pub async fn active_ads_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): QueryPairs,
) -> Response {
    let started = Instant::now();
    let result = state.gateway.active_ads(&state.session(&jar), query).await;
    respond(RouteId::ActiveAds, started, result)
}

pub async fn chat_handler(State(state): State<AppState>, jar: CookieJar, body: Bytes) -> Response {
    let started = Instant::now();
    let result = state.gateway.chat(&state.session(&jar), &body).await;
    respond(RouteId::Chat, started, result)
}

pub async fn contact_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    let result = state.gateway.contact(&state.session(&jar), &body).await;
    respond(RouteId::Contact, started, result)
}

pub async fn user_notifications_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): QueryPairs,
) -> Response {
    let started = Instant::now();
    let result = state
        .gateway
        .user_notifications(&state.session(&jar), query)
        .await;
    respond(RouteId::UserNotifications, started, result)
}

pub async fn mark_notification_read_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(notification_id): Path<String>,
) -> Response {
    let started = Instant::now();
    let result = state
        .gateway
        .mark_notification_read(&state.session(&jar), &notification_id)
        .await;
    respond(RouteId::MarkNotificationRead, started, result)
}

pub async fn create_payment_order_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    let result = state
        .gateway
        .create_payment_order(&state.session(&jar), &body)
        .await;
    respond(RouteId::CreatePaymentOrder, started, result)
}

pub async fn payment_history_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): QueryPairs,
) -> Response {
    let started = Instant::now();
    let result = state
        .gateway
        .payment_history(&state.session(&jar), query)
        .await;
    respond(RouteId::PaymentHistory, started, result)
}

pub async fn invoice_download_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(payment_id): Path<String>,
) -> Response {
    let started = Instant::now();
    let route = RouteId::InvoiceDownload.spec();
    let response = match state
        .gateway
        .download_invoice(&state.session(&jar), &payment_id)
        .await
    {
        Ok(payload) => {
            debug!("Streaming invoice {} ({} bytes)", payload.filename, payload.bytes.len());
            binary_response(payload)
        }
        Err(err) => failure(route.name, err),
    };

    crate::metrics::record_gateway_request(
        route.name,
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );
    response
}

pub async fn verify_payment_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    let result = state
        .gateway
        .verify_payment(&state.session(&jar), &body)
        .await;
    respond(RouteId::VerifyPayment, started, result)
}

pub async fn activate_purchased_plan_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(purchased_plan_id): Path<String>,
) -> Response {
    let started = Instant::now();
    let result = state
        .gateway
        .activate_purchased_plan(&state.session(&jar), &purchased_plan_id)
        .await;
    respond(RouteId::ActivatePurchasedPlan, started, result)
}

pub async fn purchased_plans_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): QueryPairs,
) -> Response {
    let started = Instant::now();
    let result = state
        .gateway
        .purchased_plans(&state.session(&jar), query)
        .await;
    respond(RouteId::PurchasedPlans, started, result)
}

pub async fn active_subscription_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Response {
    let started = Instant::now();
    let result = state
        .gateway
        .active_subscription(&state.session(&jar))
        .await;
    respond(RouteId::ActiveSubscription, started, result)
}

pub async fn website_data_handler(State(state): State<AppState>, jar: CookieJar) -> Response {
    let started = Instant::now();
    let result = state.gateway.website_data(&state.session(&jar)).await;
    respond(RouteId::WebsiteData, started, result)
}
