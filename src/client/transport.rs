// HTTP transport from the client process to the gateway
// Author: kelexine (https://github.com/kelexine)

use crate::auth::SessionContext;
use crate::error::{GatewayError, Result};
use crate::gateway::RouteId;
use crate::models::ResponseEnvelope;
use reqwest::{header, Client};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Calls the gateway's `/api` routes and unwraps their envelopes.
///
/// Cheap to clone. The session cookie is attached per call from the
/// [`SessionContext`] passed in, never stored here.
#[derive(Clone)]
pub struct GatewayTransport {
    http_client: Client,
    base_url: Arc<str>,
    cookie_name: Arc<str>,
}

impl GatewayTransport {
    pub fn new(base_url: &str, cookie_name: &str, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .use_rustls_tls()
            .build()
            .map_err(|e| GatewayError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            cookie_name: Arc::from(cookie_name),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Calls one route and returns the envelope's `data`.
    ///
    /// A failure envelope becomes `Upstream` with the envelope's message and
    /// status code, whichever side produced it.
    pub async fn call(
        &self,
        route: RouteId,
        id: Option<&str>,
        query: &[(String, String)],
        body: Option<&Value>,
        session: &SessionContext,
    ) -> Result<Value> {
        let spec = route.spec();
        let url = format!("{}{}", self.base_url, spec.inbound_path_for(id));
        debug!("Client calling {} {}", spec.method, url);

        let mut builder = self
            .http_client
            .request(spec.method.clone(), &url)
            .header(header::ACCEPT, "application/json");
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }
        if let Some(credential) = session.credential() {
            builder = builder.header(
                header::COOKIE,
                format!("{}={}", self.cookie_name, credential.expose()),
            );
        }

        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        decode_envelope(status.as_u16(), &bytes)
    }
}

/// Unwraps a gateway envelope. `status` is only used when the body is not an
/// envelope at all.
pub(crate) fn decode_envelope(status: u16, body: &[u8]) -> Result<Value> {
    if body.is_empty() && (200..300).contains(&status) {
        return Ok(Value::Null);
    }

    let envelope: ResponseEnvelope<Value> = serde_json::from_slice(body).map_err(|e| {
        GatewayError::transport(format!(
            "gateway answered {} with a non-envelope body: {}",
            status, e
        ))
    })?;

    match envelope.into_result() {
        Ok(data) => Ok(data.unwrap_or(Value::Null)),
        Err(error) => Err(GatewayError::Upstream {
            status: error.status_code,
            message: error.message,
        }),
    }
}
