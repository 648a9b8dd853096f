//! The three forwarding modes and backend response normalization.
//!
//! - **Single**: one call, JSON in, JSON out. Backend statuses are preserved on
//!   both the success and the failure path.
//! - **Binary**: one call whose body is opaque bytes (invoice PDFs).
//! - **Fan-out**: several concurrent calls, each allowed to fail on its own;
//!   the aggregate is always success-shaped.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use super::client::{BackendClient, BackendResponse};
use super::request::{RequestEnvelope, RequestEnvelopeBuilder};
use super::route::RouteId;
use crate::auth::SessionContext;
use crate::config::BackendConfig;
use crate::error::{GatewayError, Result};
use bytes::Bytes;
use futures::future::join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BINARY_CONTENT_TYPE: &str = "application/pdf";
pub const BINARY_FALLBACK_MESSAGE: &str = "Failed to download invoice";

/// A successful backend answer with its original status code.
#[derive(Debug, Clone, PartialEq)]
pub struct Forwarded<T> {
    pub status: u16,
    pub data: T,
}

/// A downloadable file.
#[derive(Debug, Clone)]
pub struct BinaryPayload {
    pub bytes: Bytes,
    pub content_type: String,
    pub filename: String,
}

impl BinaryPayload {
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.filename)
    }
}

/// Result of one fan-out constituent. `status` is `None` when the backend was
/// never reached.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceOutcome {
    pub source: &'static str,
    pub status: Option<u16>,
    pub ok: bool,
    pub items: Vec<Value>,
}

/// Forwards requests to the backend.
///
/// Cheap to clone; shares one pooled client across requests.
#[derive(Clone)]
pub struct ProxyGateway {
    client: Arc<BackendClient>,
    timeouts: Arc<HashMap<RouteId, Duration>>,
}

impl ProxyGateway {
    pub fn new(client: BackendClient) -> Self {
        Self {
            client: Arc::new(client),
            timeouts: Arc::new(HashMap::new()),
        }
    }

    /// Builds the pooled client and applies `route_timeouts`.
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        let mut timeouts = HashMap::new();
        for (name, seconds) in &config.route_timeouts {
            match RouteId::from_name(name) {
                Some(route) => {
                    timeouts.insert(route, Duration::from_secs(*seconds));
                }
                None => warn!("Ignoring timeout for unknown route {:?}", name),
            }
        }
        Ok(Self::new(BackendClient::new(config)?).with_route_timeouts(timeouts))
    }

    pub fn with_route_timeouts(mut self, timeouts: HashMap<RouteId, Duration>) -> Self {
        self.timeouts = Arc::new(timeouts);
        self
    }

    /// Starts a request for `route` carrying the session and the route's
    /// configured timeout, if any.
    pub fn request(&self, route: RouteId, session: &SessionContext) -> RequestEnvelopeBuilder {
        RequestEnvelope::builder(route)
            .session(session)
            .timeout(self.timeouts.get(&route).copied())
    }

    pub fn backend_url(&self) -> &str {
        self.client.base_url()
    }

    /// Single forward. Runs the Auth Gate first.
    pub async fn forward(&self, request: &RequestEnvelope) -> Result<Forwarded<Value>> {
        request.authorize().into_result()?;

        let response = self.client.execute(request).await?;
        if !response.status.is_success() {
            return Err(upstream_error(&response));
        }

        Ok(Forwarded {
            status: response.status.as_u16(),
            data: success_payload(&response.body)?,
        })
    }

    /// Binary forward. The file is named from the last 8 characters of
    /// `identifier`.
    pub async fn forward_binary(
        &self,
        request: &RequestEnvelope,
        identifier: &str,
    ) -> Result<BinaryPayload> {
        request.authorize().into_result()?;

        let response = self.client.execute(request).await?;
        if !response.status.is_success() {
            let message = extract_error_message(&response.body)
                .unwrap_or_else(|| BINARY_FALLBACK_MESSAGE.to_string());
            return Err(GatewayError::Upstream {
                status: response.status.as_u16(),
                message,
            });
        }

        Ok(BinaryPayload {
            content_type: response
                .content_type
                .unwrap_or_else(|| DEFAULT_BINARY_CONTENT_TYPE.to_string()),
            filename: invoice_filename(identifier),
            bytes: response.body,
        })
    }

    /// Fan-out forward. Every source listed on the route is called
    /// concurrently; a failed source degrades to an empty list.
    pub async fn fan_out(&self, request: &RequestEnvelope) -> Result<Vec<SourceOutcome>> {
        request.authorize().into_result()?;

        let route = request.route();
        let calls = route.sources.iter().map(|source| async move {
            let label = format!("{}:{}", route.name, source.name);
            let result = self
                .client
                .send(
                    &label,
                    request.method().clone(),
                    source.backend_path,
                    request.query(),
                    None,
                    request.credential(),
                    request.timeout(),
                )
                .await;
            settle_source(source.name, result)
        });

        let outcomes = join_all(calls).await;
        for outcome in outcomes.iter().filter(|o| !o.ok) {
            warn!(
                "Fan-out source {} of {} failed (status: {:?}); serving empty list",
                outcome.source, route.name, outcome.status
            );
            crate::metrics::record_fan_out_failure(route.name, outcome.source);
        }
        Ok(outcomes)
    }
}

fn settle_source(source: &'static str, result: Result<BackendResponse>) -> SourceOutcome {
    let failed = |status| SourceOutcome {
        source,
        status,
        ok: false,
        items: Vec::new(),
    };

    let response = match result {
        Ok(response) => response,
        Err(e) => {
            debug!("Fan-out source {} unreachable: {:?}", source, e);
            return failed(None);
        }
    };

    let status = response.status.as_u16();
    if !response.status.is_success() {
        return failed(Some(status));
    }

    match success_payload(&response.body) {
        Ok(payload) => SourceOutcome {
            source,
            status: Some(status),
            ok: true,
            items: extract_list(payload, source),
        },
        Err(_) => failed(Some(status)),
    }
}

/// Turns a failed backend answer into an `Upstream` error, keeping its status.
pub(crate) fn upstream_error(response: &BackendResponse) -> GatewayError {
    let status = response.status.as_u16();
    let message = extract_error_message(&response.body)
        .unwrap_or_else(|| format!("Request failed with status {}", status));
    GatewayError::Upstream { status, message }
}

/// Pulls a human-readable message out of a backend error body.
///
/// Understands `{ error: { message } }`, `{ error: "..." }` and
/// `{ message: "..." }`. Anything else, including non-JSON bytes, is `None`.
pub fn extract_error_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let message = match value.get("error") {
        Some(Value::Object(err)) => err.get("message").and_then(Value::as_str),
        Some(Value::String(msg)) => Some(msg.as_str()),
        _ => None,
    }
    .or_else(|| value.get("message").and_then(Value::as_str))?;

    let message = message.trim();
    (!message.is_empty()).then(|| message.to_string())
}

/// Parses a successful backend body. A backend that already speaks the
/// envelope has its inner `data` unwrapped so responses are never nested.
pub fn success_payload(body: &[u8]) -> Result<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| GatewayError::transport(format!("backend response unparsable: {}", e)))?;

    match value {
        Value::Object(mut map)
            if map.get("success") == Some(&Value::Bool(true)) && map.contains_key("data") =>
        {
            Ok(map.remove("data").unwrap_or(Value::Null))
        }
        other => Ok(other),
    }
}

/// Finds the list inside a fan-out payload: a bare array, `{ data: [...] }`
/// or `{ <source>: [...] }`.
pub fn extract_list(payload: Value, source: &str) -> Vec<Value> {
    match payload {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove(source).or_else(|| map.remove("data")) {
            Some(Value::Array(items)) => items,
            Some(Value::Object(mut inner)) => match inner.remove(source) {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// `invoice-<last 8 chars>.pdf`
pub fn invoice_filename(identifier: &str) -> String {
    let count = identifier.chars().count();
    let tail: String = identifier.chars().skip(count.saturating_sub(8)).collect();
    format!("invoice-{}.pdf", tail)
}
