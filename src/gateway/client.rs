// Backend API client
// Author: kelexine (https://github.com/kelexine)

use super::request::RequestEnvelope;
use crate::auth::Credential;
use crate::config::BackendConfig;
use crate::error::{GatewayError, Result};
use bytes::Bytes;
use reqwest::{header, Client, Method, StatusCode};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Raw backend answer, before normalization.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Pooled HTTP client for the backend API.
///
/// Holds no per-request state: the credential arrives with each request and is
/// only used to build that request's `Authorization` header.
pub struct BackendClient {
    http_client: Client,
    base_url: String,
    default_timeout: Duration,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let http_client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .tcp_nodelay(true)
            .use_rustls_tls()
            .build()
            .map_err(|e| GatewayError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        debug!("Created backend HTTP client for {}", config.base_url);

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            default_timeout: Duration::from_secs(config.timeout_seconds),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends the request described by the envelope.
    pub async fn execute(&self, request: &RequestEnvelope) -> Result<BackendResponse> {
        self.send(
            request.route().name,
            request.method().clone(),
            request.path(),
            request.query(),
            request.body(),
            request.credential(),
            request.timeout(),
        )
        .await
    }

    /// Sends one call and reads the full body.
    ///
    /// Any status is returned as `Ok`; only transport failures (refused
    /// connection, timeout, truncated body) become `Err`.
    #[allow(clippy::too_many_arguments)]
    pub async fn send(
        &self,
        label: &str,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
        credential: Option<&Credential>,
        timeout: Option<Duration>,
    ) -> Result<BackendResponse> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Calling backend {} {}", method, url);

        let start = Instant::now();
        let mut builder = self
            .http_client
            .request(method, &url)
            .timeout(timeout.unwrap_or(self.default_timeout))
            .header(header::ACCEPT, "application/json");

        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }
        if let Some(credential) = credential {
            builder = builder.header(header::AUTHORIZATION, credential.bearer());
        }

        let outcome = async {
            let response = builder.send().await?;
            let status = response.status();
            let content_type = response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>(BackendResponse {
                status,
                content_type,
                body,
            })
        }
        .await;

        let elapsed = start.elapsed().as_secs_f64();
        match outcome {
            Ok(response) => {
                crate::metrics::record_backend_call(label, response.status.as_u16(), elapsed);
                debug!(
                    "Backend {} answered {} in {:.3}s ({} bytes)",
                    label,
                    response.status,
                    elapsed,
                    response.body.len()
                );
                Ok(response)
            }
            Err(e) => {
                crate::metrics::record_backend_call(label, 0, elapsed);
                let err = GatewayError::from(e);
                if let GatewayError::Transport { detail } = &err {
                    error!(
                        "Backend call {} to {} failed: {}",
                        label,
                        url,
                        crate::utils::logging::sanitize(detail)
                    );
                }
                Err(err)
            }
        }
    }
}
